//! Local versus delegated index allocation.
//!
//! An agent running as a subagent is not authoritative for the tables it
//! populates: every registration, release and removal goes to the master
//! agent instead of the local registry. Which of the two applies is decided
//! once, when the `IndexAllocator` is built.

use crate::index::{IndexRegistry, IndexRequest, IndexType, IndexValue, RegistryError, SessionId};
use crate::oid::Oid;
use log::{debug, warn};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Transport to an authoritative registry
pub trait DelegationGateway: fmt::Debug {
    fn register(
        &mut self,
        prefix: &Oid,
        request: IndexRequest,
        owner: SessionId,
    ) -> Result<IndexValue, RegistryError>;

    fn release(&mut self, prefix: &Oid, value: &IndexValue) -> Result<(), RegistryError>;

    fn remove(
        &mut self,
        prefix: &Oid,
        value: &IndexValue,
        owner: Option<SessionId>,
    ) -> Result<(), RegistryError>;

    /// Session teardown on the remote side. Most masters clean up closed
    /// sessions on their own, so the default does nothing.
    fn release_session(&mut self, _owner: SessionId) -> Result<usize, RegistryError> {
        Ok(0)
    }

    /// Short description of the remote end, for reports
    fn describe(&self) -> String;
}

/// Index allocation front end used by the agent
#[derive(Debug)]
pub enum IndexAllocator {
    /// This agent owns the registry
    Local(IndexRegistry),
    /// Requests are forwarded to a master agent
    Delegated(Box<dyn DelegationGateway>),
}

impl Default for IndexAllocator {
    fn default() -> Self {
        IndexAllocator::local()
    }
}

impl IndexAllocator {
    pub fn local() -> Self {
        IndexAllocator::Local(IndexRegistry::new())
    }

    pub fn delegated<G: DelegationGateway + 'static>(gateway: G) -> Self {
        IndexAllocator::Delegated(Box::new(gateway))
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self, IndexAllocator::Delegated(_))
    }

    /// The local registry, when this agent is authoritative
    pub fn registry(&self) -> Option<&IndexRegistry> {
        match self {
            IndexAllocator::Local(registry) => Some(registry),
            IndexAllocator::Delegated(_) => None,
        }
    }

    pub fn register(
        &mut self,
        prefix: &Oid,
        request: IndexRequest,
        owner: SessionId,
    ) -> Result<IndexValue, RegistryError> {
        match self {
            IndexAllocator::Local(registry) => registry.register(prefix, request, owner),
            IndexAllocator::Delegated(gateway) => {
                debug!(
                    "Forwarding index registration under {} to {}",
                    prefix,
                    gateway.describe()
                );
                gateway.register(prefix, request, owner)
            }
        }
    }

    /// Register an integer index; `None` asks for any free value
    pub fn register_integer(
        &mut self,
        prefix: &Oid,
        value: Option<i64>,
        owner: SessionId,
    ) -> Result<i64, RegistryError> {
        let request = match value {
            Some(value) => IndexRequest::Exact(IndexValue::Integer(value)),
            None => IndexRequest::Any(IndexType::Integer),
        };
        let allocated = self.register(prefix, request, owner)?;
        allocated
            .as_integer()
            .ok_or_else(|| unexpected_type(prefix, IndexType::Integer, &allocated))
    }

    /// Register a string index; `None` asks for any free value
    pub fn register_string(
        &mut self,
        prefix: &Oid,
        value: Option<&str>,
        owner: SessionId,
    ) -> Result<String, RegistryError> {
        let request = match value {
            Some(text) => IndexRequest::Exact(IndexValue::string(text)),
            None => IndexRequest::Any(IndexType::OctetString),
        };
        let allocated = self.register(prefix, request, owner)?;
        allocated
            .as_bytes()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .ok_or_else(|| unexpected_type(prefix, IndexType::OctetString, &allocated))
    }

    /// Register an OID index; `None` asks for any free value
    pub fn register_oid(
        &mut self,
        prefix: &Oid,
        value: Option<&[u32]>,
        owner: SessionId,
    ) -> Result<Vec<u32>, RegistryError> {
        let request = match value {
            Some(subids) => IndexRequest::Exact(IndexValue::ObjectId(subids.to_vec())),
            None => IndexRequest::Any(IndexType::ObjectId),
        };
        let allocated = self.register(prefix, request, owner)?;
        allocated
            .as_subids()
            .map(|subids| subids.to_vec())
            .ok_or_else(|| unexpected_type(prefix, IndexType::ObjectId, &allocated))
    }

    pub fn release(&mut self, prefix: &Oid, value: &IndexValue) -> Result<(), RegistryError> {
        match self {
            IndexAllocator::Local(registry) => registry.release(prefix, value),
            IndexAllocator::Delegated(gateway) => gateway.release(prefix, value),
        }
    }

    pub fn remove(
        &mut self,
        prefix: &Oid,
        value: &IndexValue,
        owner: Option<SessionId>,
    ) -> Result<(), RegistryError> {
        match self {
            IndexAllocator::Local(registry) => registry.remove(prefix, value, owner),
            IndexAllocator::Delegated(gateway) => gateway.remove(prefix, value, owner),
        }
    }

    /// Free everything held by a closing session
    pub fn release_all(&mut self, owner: SessionId) -> usize {
        match self {
            IndexAllocator::Local(registry) => registry.release_all(owner),
            IndexAllocator::Delegated(gateway) => match gateway.release_session(owner) {
                Ok(released) => released,
                Err(e) => {
                    warn!(
                        "Failed to release indexes of {} via {}: {}",
                        owner,
                        gateway.describe(),
                        e
                    );
                    0
                }
            },
        }
    }

    pub fn dump(&self) -> String {
        match self {
            IndexAllocator::Local(registry) => registry.dump(),
            IndexAllocator::Delegated(gateway) => {
                format!("Index allocations are delegated to {}\n", gateway.describe())
            }
        }
    }

    /// Drop all local state
    pub fn shutdown(&mut self) {
        if let IndexAllocator::Local(registry) = self {
            registry.clear();
        }
    }
}

fn unexpected_type(prefix: &Oid, expected: IndexType, allocated: &IndexValue) -> RegistryError {
    RegistryError::WrongType {
        prefix: prefix.clone(),
        registered: allocated.index_type(),
        requested: expected,
    }
}

/// Gateway to a registry shared within the process.
///
/// Every call holds the registry lock for the whole operation, so callers on
/// different threads are serialized against each other.
#[derive(Debug, Clone)]
pub struct SharedRegistryGateway {
    master: Arc<Mutex<IndexRegistry>>,
    name: String,
}

impl SharedRegistryGateway {
    pub fn new(master: Arc<Mutex<IndexRegistry>>, name: impl Into<String>) -> Self {
        SharedRegistryGateway {
            master,
            name: name.into(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexRegistry>, RegistryError> {
        self.master.lock().map_err(|_| {
            RegistryError::GatewayUnavailable(format!("{} registry lock is poisoned", self.name))
        })
    }
}

impl DelegationGateway for SharedRegistryGateway {
    fn register(
        &mut self,
        prefix: &Oid,
        request: IndexRequest,
        owner: SessionId,
    ) -> Result<IndexValue, RegistryError> {
        self.lock()?.register(prefix, request, owner)
    }

    fn release(&mut self, prefix: &Oid, value: &IndexValue) -> Result<(), RegistryError> {
        self.lock()?.release(prefix, value)
    }

    fn remove(
        &mut self,
        prefix: &Oid,
        value: &IndexValue,
        owner: Option<SessionId>,
    ) -> Result<(), RegistryError> {
        self.lock()?.remove(prefix, value, owner)
    }

    fn release_session(&mut self, owner: SessionId) -> Result<usize, RegistryError> {
        Ok(self.lock()?.release_all(owner))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
