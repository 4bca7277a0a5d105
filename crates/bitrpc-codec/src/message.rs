use std::marker::PhantomData;

use bitrpc_mask::{BitMask, BitMaskPool};
use bitrpc_registry::{fnv1a_32, TypeHandler};
use bitrpc_wire::{StreamReader, StreamWriter};

use crate::error::CodecError;
use crate::schema::{FieldDescriptor, MessageSchema};

/// Generated code implements this trait once per message type.
///
/// The three methods a generator must emit — [`Self::field_descriptors`],
/// [`Self::compute_presence`], [`Self::write_present`], [`Self::read_present`]
/// — are the only type-specific parts; [`Self::encode`]/[`Self::decode`] and
/// friends implement the shared write/read algorithm (§4.4) once, here, atop
/// them. Dispatch stays static: nothing in this trait looks up a handler by
/// tag at runtime.
pub trait Message: Sized {
    /// Canonical, language-neutral name used as this type's registry tag.
    const TYPE_TAG: &'static str;
    /// Number of fields in this message's schema.
    const FIELD_COUNT: usize;

    /// The schema's field list, in ascending id order.
    fn field_descriptors() -> &'static [FieldDescriptor];

    /// Set bit `id - 1` in `mask` for every field whose current value is
    /// non-default. Must not write anything to a stream.
    fn compute_presence(&self, mask: &mut BitMask);

    /// For each field in ascending id order whose bit is set in `mask`,
    /// write that field's value.
    fn write_present(&self, mask: &BitMask, writer: &mut StreamWriter);

    /// Construct an instance with every field at its type default, then for
    /// each field in ascending id order whose bit is set in `mask`, read and
    /// assign that field's value.
    fn read_present(mask: &BitMask, reader: &mut StreamReader) -> Result<Self, CodecError>;

    /// `ceil(FIELD_COUNT / 32)`, the presence mask's word count.
    fn word_count() -> usize {
        Self::FIELD_COUNT.div_ceil(32)
    }

    /// This type's schema, for introspection and registration. Not consulted
    /// by [`Self::encode`]/[`Self::decode`], which operate on the static
    /// `FIELD_COUNT`/`compute_presence`/`write_present`/`read_present`
    /// directly.
    fn schema() -> MessageSchema {
        MessageSchema::new(Self::TYPE_TAG, Self::field_descriptors().to_vec())
            .expect("a Message impl's own field_descriptors must be dense")
    }

    /// Whether every field is at its type default (the mask would be all
    /// zero bits).
    fn is_default(&self) -> bool {
        let mut mask = BitMaskPool::global().acquire(Self::word_count());
        self.compute_presence(&mut mask);
        mask.is_empty()
    }

    /// Acquire a mask, compute presence, write the mask, then the present
    /// fields. The mask is released (via `PooledMask`'s `Drop`) regardless
    /// of how this function returns.
    fn encode_into(&self, writer: &mut StreamWriter) {
        let mut mask = BitMaskPool::global().acquire(Self::word_count());
        self.compute_presence(&mut mask);
        mask.write(writer);
        self.write_present(&mask, writer);
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = StreamWriter::new();
        self.encode_into(&mut writer);
        writer.into_bytes()
    }

    /// Acquire a mask, read it, reject any bit set beyond `FIELD_COUNT` as
    /// [`CodecError::UnknownField`], then read present fields. The mask is
    /// released regardless of how this function returns.
    fn decode_from(reader: &mut StreamReader) -> Result<Self, CodecError> {
        let mut mask = BitMaskPool::global().acquire(Self::word_count());
        mask.read(reader)?;
        if let Some(bit) = mask.first_unknown_bit(Self::FIELD_COUNT) {
            return Err(CodecError::UnknownField { field_id: bit + 1 });
        }
        Self::read_present(&mask, reader)
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = StreamReader::new(bytes);
        Self::decode_from(&mut reader)
    }
}

/// Adapts any [`Message`] type to [`TypeHandler`], so a message can appear as
/// a nested field, a `list<M>` element, or a `map<K,M>` value.
pub struct MessageHandler<M>(PhantomData<fn() -> M>);

impl<M> MessageHandler<M> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<M> Default for MessageHandler<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for MessageHandler<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for MessageHandler<M> {}

impl<M: Message> TypeHandler for MessageHandler<M> {
    type Value = M;
    type Error = CodecError;

    fn is_default(&self, value: &Self::Value) -> bool {
        value.is_default()
    }

    fn write(&self, value: &Self::Value, writer: &mut StreamWriter) {
        value.encode_into(writer);
    }

    fn read(&self, reader: &mut StreamReader) -> Result<Self::Value, CodecError> {
        M::decode_from(reader)
    }

    fn type_hash(&self) -> u32 {
        fnv1a_32(M::TYPE_TAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitrpc_registry::{BoolHandler, I32Handler, ListHandler, StringHandler};
    use std::sync::OnceLock;

    use crate::schema::FieldType;

    /// Scenario 1: `(i32 a=1, string b=2, bool c=3)`.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct ScalarMsg {
        a: i32,
        b: String,
        c: bool,
    }

    impl Message for ScalarMsg {
        const TYPE_TAG: &'static str = "bitrpc.test.ScalarMsg";
        const FIELD_COUNT: usize = 3;

        fn field_descriptors() -> &'static [FieldDescriptor] {
            static FIELDS: OnceLock<Vec<FieldDescriptor>> = OnceLock::new();
            FIELDS.get_or_init(|| {
                vec![
                    FieldDescriptor::new(1, "a", FieldType::I32),
                    FieldDescriptor::new(2, "b", FieldType::String),
                    FieldDescriptor::new(3, "c", FieldType::Bool),
                ]
            })
        }

        fn compute_presence(&self, mask: &mut BitMask) {
            mask.set(0, !I32Handler.is_default(&self.a));
            mask.set(1, !StringHandler.is_default(&self.b));
            mask.set(2, !BoolHandler.is_default(&self.c));
        }

        fn write_present(&self, mask: &BitMask, writer: &mut StreamWriter) {
            if mask.get(0) {
                I32Handler.write(&self.a, writer);
            }
            if mask.get(1) {
                StringHandler.write(&self.b, writer);
            }
            if mask.get(2) {
                BoolHandler.write(&self.c, writer);
            }
        }

        fn read_present(mask: &BitMask, reader: &mut StreamReader) -> Result<Self, CodecError> {
            let mut value = Self::default();
            if mask.get(0) {
                value.a = I32Handler.read(reader)?;
            }
            if mask.get(1) {
                value.b = StringHandler.read(reader)?;
            }
            if mask.get(2) {
                value.c = BoolHandler.read(reader)?;
            }
            Ok(value)
        }
    }

    #[test]
    fn scalar_all_default_is_one_zero_mask_word() {
        let msg = ScalarMsg::default();
        let bytes = msg.encode();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert_eq!(ScalarMsg::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn scalar_round_trip_with_values() {
        let msg = ScalarMsg {
            a: 42,
            b: "hi".to_string(),
            c: true,
        };
        let bytes = msg.encode();
        assert_eq!(ScalarMsg::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn boolean_presence_vs_value_true() {
        let msg = ScalarMsg {
            a: 0,
            b: String::new(),
            c: true,
        };
        let bytes = msg.encode();
        // mask word with bit 2 set (0x00000004), then one byte 0x01.
        assert_eq!(bytes, vec![0x04, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn boolean_presence_vs_value_false() {
        let msg = ScalarMsg {
            a: 0,
            b: String::new(),
            c: false,
        };
        let bytes = msg.encode();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
    }

    /// Scenario 2: 40 string fields, only field1 and field10 set.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct ComplexMessage {
        fields: [String; 40],
    }

    impl Message for ComplexMessage {
        const TYPE_TAG: &'static str = "bitrpc.test.ComplexMessage";
        const FIELD_COUNT: usize = 40;

        fn field_descriptors() -> &'static [FieldDescriptor] {
            static FIELDS: OnceLock<Vec<FieldDescriptor>> = OnceLock::new();
            FIELDS.get_or_init(|| {
                (1..=40)
                    .map(|id| {
                        let name: &'static str =
                            Box::leak(format!("field{id}").into_boxed_str());
                        FieldDescriptor::new(id, name, FieldType::String)
                    })
                    .collect()
            })
        }

        fn compute_presence(&self, mask: &mut BitMask) {
            for (i, field) in self.fields.iter().enumerate() {
                mask.set(i, !StringHandler.is_default(field));
            }
        }

        fn write_present(&self, mask: &BitMask, writer: &mut StreamWriter) {
            for (i, field) in self.fields.iter().enumerate() {
                if mask.get(i) {
                    StringHandler.write(field, writer);
                }
            }
        }

        fn read_present(mask: &BitMask, reader: &mut StreamReader) -> Result<Self, CodecError> {
            let mut value = Self::default();
            for i in 0..40 {
                if mask.get(i) {
                    value.fields[i] = StringHandler.read(reader)?;
                }
            }
            Ok(value)
        }
    }

    #[test]
    fn sparse_strings_mask_and_round_trip() {
        let mut msg = ComplexMessage::default();
        msg.fields[0] = "First".to_string();
        msg.fields[9] = "Tenth".to_string();

        let bytes = msg.encode();
        assert_eq!(&bytes[0..8], &[0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let round_tripped = ComplexMessage::decode(&bytes).unwrap();
        assert_eq!(round_tripped, msg);
        assert_eq!(round_tripped.fields[1], "");
        assert_eq!(round_tripped.fields[39], "");
    }

    #[test]
    fn unknown_field_bit_is_rejected() {
        // A valid 2-word mask but with a bit set past field 40 (bit 40, the
        // 41st bit), simulating a peer on a newer schema.
        let mut writer = StreamWriter::new();
        writer.write_u32(0);
        writer.write_u32(1 << 8); // global bit 40 -> field id 41, past FIELD_COUNT of 40.
        let bytes = writer.into_bytes();
        let err = ComplexMessage::decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::UnknownField { field_id: 41 }));
    }

    /// Scenario 3: nested messages and lists.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct User {
        name: String,
        age: i32,
    }

    impl Message for User {
        const TYPE_TAG: &'static str = "bitrpc.test.User";
        const FIELD_COUNT: usize = 2;

        fn field_descriptors() -> &'static [FieldDescriptor] {
            static FIELDS: OnceLock<Vec<FieldDescriptor>> = OnceLock::new();
            FIELDS.get_or_init(|| {
                vec![
                    FieldDescriptor::new(1, "name", FieldType::String),
                    FieldDescriptor::new(2, "age", FieldType::I32),
                ]
            })
        }

        fn compute_presence(&self, mask: &mut BitMask) {
            mask.set(0, !StringHandler.is_default(&self.name));
            mask.set(1, !I32Handler.is_default(&self.age));
        }

        fn write_present(&self, mask: &BitMask, writer: &mut StreamWriter) {
            if mask.get(0) {
                StringHandler.write(&self.name, writer);
            }
            if mask.get(1) {
                I32Handler.write(&self.age, writer);
            }
        }

        fn read_present(mask: &BitMask, reader: &mut StreamReader) -> Result<Self, CodecError> {
            let mut value = Self::default();
            if mask.get(0) {
                value.name = StringHandler.read(reader)?;
            }
            if mask.get(1) {
                value.age = I32Handler.read(reader)?;
            }
            Ok(value)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct Group {
        name: String,
        members: Vec<User>,
    }

    impl Message for Group {
        const TYPE_TAG: &'static str = "bitrpc.test.Group";
        const FIELD_COUNT: usize = 2;

        fn field_descriptors() -> &'static [FieldDescriptor] {
            static FIELDS: OnceLock<Vec<FieldDescriptor>> = OnceLock::new();
            FIELDS.get_or_init(|| {
                vec![
                    FieldDescriptor::new(1, "name", FieldType::String),
                    FieldDescriptor::new(
                        2,
                        "members",
                        FieldType::List(Box::new(FieldType::Message(User::TYPE_TAG))),
                    ),
                ]
            })
        }

        fn compute_presence(&self, mask: &mut BitMask) {
            let members = ListHandler::new(MessageHandler::<User>::new());
            mask.set(0, !StringHandler.is_default(&self.name));
            mask.set(1, !members.is_default(&self.members));
        }

        fn write_present(&self, mask: &BitMask, writer: &mut StreamWriter) {
            let members = ListHandler::new(MessageHandler::<User>::new());
            if mask.get(0) {
                StringHandler.write(&self.name, writer);
            }
            if mask.get(1) {
                members.write(&self.members, writer);
            }
        }

        fn read_present(mask: &BitMask, reader: &mut StreamReader) -> Result<Self, CodecError> {
            let members = ListHandler::new(MessageHandler::<User>::new());
            let mut value = Self::default();
            if mask.get(0) {
                value.name = StringHandler.read(reader)?;
            }
            if mask.get(1) {
                value.members = members.read(reader)?;
            }
            Ok(value)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct Organization {
        name: String,
        departments: Vec<String>,
        groups: Vec<Group>,
        leader: User,
    }

    impl Message for Organization {
        const TYPE_TAG: &'static str = "bitrpc.test.Organization";
        const FIELD_COUNT: usize = 4;

        fn field_descriptors() -> &'static [FieldDescriptor] {
            static FIELDS: OnceLock<Vec<FieldDescriptor>> = OnceLock::new();
            FIELDS.get_or_init(|| {
                vec![
                    FieldDescriptor::new(1, "name", FieldType::String),
                    FieldDescriptor::new(
                        2,
                        "departments",
                        FieldType::List(Box::new(FieldType::String)),
                    ),
                    FieldDescriptor::new(
                        3,
                        "groups",
                        FieldType::List(Box::new(FieldType::Message(Group::TYPE_TAG))),
                    ),
                    FieldDescriptor::new(4, "leader", FieldType::Message(User::TYPE_TAG)),
                ]
            })
        }

        fn compute_presence(&self, mask: &mut BitMask) {
            let departments = ListHandler::new(StringHandler);
            let groups = ListHandler::new(MessageHandler::<Group>::new());
            let leader = MessageHandler::<User>::new();
            mask.set(0, !StringHandler.is_default(&self.name));
            mask.set(1, !departments.is_default(&self.departments));
            mask.set(2, !groups.is_default(&self.groups));
            mask.set(3, !leader.is_default(&self.leader));
        }

        fn write_present(&self, mask: &BitMask, writer: &mut StreamWriter) {
            let departments = ListHandler::new(StringHandler);
            let groups = ListHandler::new(MessageHandler::<Group>::new());
            let leader = MessageHandler::<User>::new();
            if mask.get(0) {
                StringHandler.write(&self.name, writer);
            }
            if mask.get(1) {
                departments.write(&self.departments, writer);
            }
            if mask.get(2) {
                groups.write(&self.groups, writer);
            }
            if mask.get(3) {
                leader.write(&self.leader, writer);
            }
        }

        fn read_present(mask: &BitMask, reader: &mut StreamReader) -> Result<Self, CodecError> {
            let departments = ListHandler::new(StringHandler);
            let groups = ListHandler::new(MessageHandler::<Group>::new());
            let leader = MessageHandler::<User>::new();
            let mut value = Self::default();
            if mask.get(0) {
                value.name = StringHandler.read(reader)?;
            }
            if mask.get(1) {
                value.departments = departments.read(reader)?;
            }
            if mask.get(2) {
                value.groups = groups.read(reader)?;
            }
            if mask.get(3) {
                value.leader = leader.read(reader)?;
            }
            Ok(value)
        }
    }

    #[test]
    fn nested_messages_and_lists_round_trip() {
        let org = Organization {
            name: "Tech Corp".to_string(),
            departments: vec![
                "Engineering".to_string(),
                "Marketing".to_string(),
                "Sales".to_string(),
            ],
            groups: vec![Group {
                name: "Developers".to_string(),
                members: vec![
                    User {
                        name: "Alice".to_string(),
                        age: 30,
                    },
                    User {
                        name: "Bob".to_string(),
                        age: 25,
                    },
                ],
            }],
            leader: User {
                name: "Charlie".to_string(),
                age: 35,
            },
        };

        let bytes = org.encode();
        let round_tripped = Organization::decode(&bytes).unwrap();
        assert_eq!(round_tripped, org);
        assert_eq!(round_tripped.groups[0].members.len(), 2);
        assert_eq!(round_tripped.groups[0].members[1].name, "Bob");
    }

    #[test]
    fn unset_nested_message_field_stays_default() {
        let org = Organization {
            name: "Solo Corp".to_string(),
            ..Default::default()
        };
        let bytes = org.encode();
        let round_tripped = Organization::decode(&bytes).unwrap();
        assert_eq!(round_tripped.leader, User::default());
        assert!(round_tripped.groups.is_empty());
    }

    #[test]
    fn encoding_the_same_value_twice_is_byte_identical() {
        let msg = ScalarMsg {
            a: 7,
            b: "stable".to_string(),
            c: true,
        };
        assert_eq!(msg.encode(), msg.encode());
    }
}
