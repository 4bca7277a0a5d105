use std::collections::HashMap;
use std::fmt;

/// Maximum service name length, mirrored from the introspection registry's
/// string-table discipline: names are opaque but bounded so a malformed
/// peer can't wedge a reader with an unbounded allocation.
pub const MAX_SERVICE_NAME_LEN: usize = 256;
pub const MAX_METHOD_NAME_LEN: usize = 128;

/// Errors building or looking up a [`ServiceRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRegistryError {
    ServiceNameTooLong,
    MethodNameTooLong,
    EmptyServiceName,
    EmptyMethodName,
    DuplicateService { name: String },
    DuplicateMethodId { service: String, method_id: u32 },
}

impl fmt::Display for ServiceRegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRegistryError::ServiceNameTooLong => {
                write!(f, "service name exceeds {MAX_SERVICE_NAME_LEN} bytes")
            }
            ServiceRegistryError::MethodNameTooLong => {
                write!(f, "method name exceeds {MAX_METHOD_NAME_LEN} bytes")
            }
            ServiceRegistryError::EmptyServiceName => write!(f, "service name cannot be empty"),
            ServiceRegistryError::EmptyMethodName => write!(f, "method name cannot be empty"),
            ServiceRegistryError::DuplicateService { name } => {
                write!(f, "service {name:?} is already registered")
            }
            ServiceRegistryError::DuplicateMethodId { service, method_id } => {
                write!(f, "method id {method_id} is already registered on service {service:?}")
            }
        }
    }
}

impl std::error::Error for ServiceRegistryError {}

/// One method within a [`ServiceInfo`]: its name, its stable `method_id`,
/// and the type tags of its request/response messages (for tooling to
/// cross-reference against the message schema registry — never consulted
/// by the dispatch path itself, which is keyed on `method_id` alone).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    pub method_id: u32,
    pub request_type_tag: &'static str,
    pub response_type_tag: &'static str,
}

/// One registered service: a name and its methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub methods: Vec<MethodInfo>,
}

/// In-memory, read-back-able registry of service/method metadata for
/// introspection and debugging tooling.
///
/// This is separate from [`crate::router::Router`]: the router is the
/// dispatch path (method id -> handler), built for speed; this registry is
/// metadata about what's registered, built for humans and tools to read.
/// Nothing on the RPC call path consults it.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceInfo>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Register a service under `name`. Fails if `name` is empty, too long,
    /// or already registered.
    pub fn add_service(&mut self, name: impl Into<String>) -> Result<(), ServiceRegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ServiceRegistryError::EmptyServiceName);
        }
        if name.len() > MAX_SERVICE_NAME_LEN {
            return Err(ServiceRegistryError::ServiceNameTooLong);
        }
        if self.services.contains_key(&name) {
            return Err(ServiceRegistryError::DuplicateService { name });
        }
        self.services.insert(
            name.clone(),
            ServiceInfo {
                name,
                methods: Vec::new(),
            },
        );
        Ok(())
    }

    /// Register a method on a previously-added service. Fails if the
    /// service is unknown, the method name is empty or too long, or
    /// `method_id` is already registered on that service.
    pub fn add_method(
        &mut self,
        service: &str,
        name: impl Into<String>,
        method_id: u32,
        request_type_tag: &'static str,
        response_type_tag: &'static str,
    ) -> Result<(), ServiceRegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ServiceRegistryError::EmptyMethodName);
        }
        if name.len() > MAX_METHOD_NAME_LEN {
            return Err(ServiceRegistryError::MethodNameTooLong);
        }

        let info = self
            .services
            .get_mut(service)
            .unwrap_or_else(|| panic!("add_method called for unregistered service {service:?}"));

        if info.methods.iter().any(|m| m.method_id == method_id) {
            return Err(ServiceRegistryError::DuplicateMethodId {
                service: service.to_string(),
                method_id,
            });
        }

        info.methods.push(MethodInfo {
            name,
            method_id,
            request_type_tag,
            response_type_tag,
        });
        tracing::debug!(service, method_id, "method registered for introspection");
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceInfo> {
        self.services.get(name)
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceInfo> {
        self.services.values()
    }

    pub fn method(&self, service: &str, method_id: u32) -> Option<&MethodInfo> {
        self.services
            .get(service)?
            .methods
            .iter()
            .find(|m| m.method_id == method_id)
    }
}
