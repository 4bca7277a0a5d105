use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// The type of one field in a [`MessageSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Timestamp,
    List(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    /// Reference to another message type, named by its type tag.
    Message(&'static str),
}

impl FieldType {
    /// Type tags of messages this field type reaches directly or through
    /// `list`/`map` nesting. Used for cycle detection at schema registration.
    fn message_refs(&self, out: &mut Vec<&'static str>) {
        match self {
            FieldType::Message(tag) => out.push(tag),
            FieldType::List(elem) => elem.message_refs(out),
            FieldType::Map(key, value) => {
                key.message_refs(out);
                value.message_refs(out);
            }
            _ => {}
        }
    }
}

/// One field of a [`MessageSchema`]: a stable numeric id, a name opaque to
/// the codec, and a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: u32,
    pub name: &'static str,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub const fn new(id: u32, name: &'static str, field_type: FieldType) -> Self {
        Self {
            id,
            name,
            field_type,
        }
    }
}

/// Errors constructing or registering a [`MessageSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Field ids were not exactly `1..=N` for `N` fields.
    SparseOrDuplicateIds { type_tag: &'static str },
    /// Registering this schema would create a cycle through nested message
    /// references.
    CyclicReference { type_tag: &'static str },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::SparseOrDuplicateIds { type_tag } => {
                write!(f, "{type_tag}: field ids must be dense, 1..=N with no gaps or duplicates")
            }
            SchemaError::CyclicReference { type_tag } => {
                write!(f, "{type_tag}: registering this schema would create a cycle of nested message references")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// The ordered field list of one message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSchema {
    pub type_tag: &'static str,
    pub fields: Vec<FieldDescriptor>,
}

impl MessageSchema {
    /// Build a schema, validating that field ids are dense (`1..=N`, no gaps
    /// or duplicates). Does not check for cyclic nested-message references;
    /// use [`SchemaRegistry::register`] for that.
    pub fn new(type_tag: &'static str, fields: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let mut ids: Vec<u32> = fields.iter().map(|f| f.id).collect();
        ids.sort_unstable();
        let dense = ids.iter().enumerate().all(|(i, &id)| id as usize == i + 1);
        if !dense {
            return Err(SchemaError::SparseOrDuplicateIds { type_tag });
        }
        Ok(Self { type_tag, fields })
    }

    /// Number of fields declared.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// `ceil(field_count / 32)`, the presence mask's word count.
    pub fn word_count(&self) -> usize {
        self.field_count().div_ceil(32)
    }
}

/// Process-wide registry of [`MessageSchema`]s, keyed by type tag.
///
/// Built once during process init from generated registration calls and
/// treated as immutable thereafter; readers need no synchronization beyond
/// the lock guarding the initial build. Rejects any registration that would
/// introduce a cycle through nested message references, per the codec's
/// default cycle policy.
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<&'static str, Arc<MessageSchema>>>,
}

impl SchemaRegistry {
    fn new() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static SchemaRegistry {
        static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SchemaRegistry::new)
    }

    /// Register `schema`, rejecting it if doing so would create a cycle of
    /// nested message references reachable from `schema` back to itself.
    /// Registering the same tag twice with an identical schema is a no-op.
    pub fn register(&self, schema: MessageSchema) -> Result<Arc<MessageSchema>, SchemaError> {
        let mut schemas = self.schemas.write();

        if let Some(existing) = schemas.get(schema.type_tag) {
            if **existing == schema {
                return Ok(existing.clone());
            }
        }

        if Self::introduces_cycle(&schemas, &schema) {
            return Err(SchemaError::CyclicReference {
                type_tag: schema.type_tag,
            });
        }

        let schema = Arc::new(schema);
        schemas.insert(schema.type_tag, schema.clone());
        tracing::debug!(type_tag = schema.type_tag, fields = schema.field_count(), "schema registered");
        Ok(schema)
    }

    pub fn lookup(&self, type_tag: &str) -> Option<Arc<MessageSchema>> {
        self.schemas.read().get(type_tag).cloned()
    }

    fn introduces_cycle(
        schemas: &HashMap<&'static str, Arc<MessageSchema>>,
        new_schema: &MessageSchema,
    ) -> bool {
        let mut refs = Vec::new();
        for field in &new_schema.fields {
            field.field_type.message_refs(&mut refs);
        }

        let mut stack = refs;
        let mut visited: HashSet<&'static str> = HashSet::new();
        while let Some(tag) = stack.pop() {
            if tag == new_schema.type_tag {
                return true;
            }
            if !visited.insert(tag) {
                continue;
            }
            if let Some(schema) = schemas.get(tag) {
                for field in &schema.fields {
                    field.field_type.message_refs(&mut stack);
                }
            }
        }
        false
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_field(id: u32, name: &'static str) -> FieldDescriptor {
        FieldDescriptor::new(id, name, FieldType::I32)
    }

    #[test]
    fn dense_ids_accepted() {
        let schema = MessageSchema::new(
            "bitrpc.test.Dense",
            vec![scalar_field(1, "a"), scalar_field(2, "b"), scalar_field(3, "c")],
        )
        .unwrap();
        assert_eq!(schema.field_count(), 3);
        assert_eq!(schema.word_count(), 1);
    }

    #[test]
    fn sparse_ids_rejected() {
        let err = MessageSchema::new(
            "bitrpc.test.Sparse",
            vec![scalar_field(1, "a"), scalar_field(3, "c")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::SparseOrDuplicateIds {
                type_tag: "bitrpc.test.Sparse"
            }
        );
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = MessageSchema::new(
            "bitrpc.test.Dup",
            vec![scalar_field(1, "a"), scalar_field(1, "b")],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::SparseOrDuplicateIds { .. }));
    }

    #[test]
    fn forty_one_fields_need_two_words() {
        let fields: Vec<_> = (1..=41).map(|i| scalar_field(i, "f")).collect();
        let schema = MessageSchema::new("bitrpc.test.Forty1", fields).unwrap();
        assert_eq!(schema.word_count(), 2);
    }

    #[test]
    fn self_reference_is_rejected_as_cyclic() {
        let registry = SchemaRegistry::new();
        let schema = MessageSchema::new(
            "bitrpc.test.SelfRef",
            vec![FieldDescriptor::new(1, "child", FieldType::Message("bitrpc.test.SelfRef"))],
        )
        .unwrap();
        let err = registry.register(schema).unwrap_err();
        assert_eq!(
            err,
            SchemaError::CyclicReference {
                type_tag: "bitrpc.test.SelfRef"
            }
        );
    }

    #[test]
    fn mutual_cycle_through_two_schemas_is_rejected() {
        let registry = SchemaRegistry::new();
        let a = MessageSchema::new(
            "bitrpc.test.A",
            vec![FieldDescriptor::new(1, "b", FieldType::Message("bitrpc.test.B"))],
        )
        .unwrap();
        registry.register(a).unwrap();

        let b = MessageSchema::new(
            "bitrpc.test.B",
            vec![FieldDescriptor::new(1, "a", FieldType::Message("bitrpc.test.A"))],
        )
        .unwrap();
        let err = registry.register(b).unwrap_err();
        assert_eq!(err, SchemaError::CyclicReference { type_tag: "bitrpc.test.B" });
    }

    #[test]
    fn acyclic_nesting_through_list_is_accepted() {
        let registry = SchemaRegistry::new();
        let leaf = MessageSchema::new("bitrpc.test.Leaf", vec![scalar_field(1, "x")]).unwrap();
        registry.register(leaf).unwrap();

        let parent = MessageSchema::new(
            "bitrpc.test.Parent",
            vec![FieldDescriptor::new(
                1,
                "leaves",
                FieldType::List(Box::new(FieldType::Message("bitrpc.test.Leaf"))),
            )],
        )
        .unwrap();
        registry.register(parent).unwrap();
    }

    #[test]
    fn re_registering_identical_schema_is_a_no_op() {
        let registry = SchemaRegistry::new();
        let schema = MessageSchema::new("bitrpc.test.Idem", vec![scalar_field(1, "a")]).unwrap();
        registry.register(schema.clone()).unwrap();
        registry.register(schema).unwrap();
    }
}
