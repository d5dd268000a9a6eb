//! # Agent Index - index allocation registry for SNMP agent tables
//!
//! Rows of a conceptual SNMP table are addressed by appending an index value
//! to the table's OID prefix. Several producers (local MIB modules and
//! AgentX subagents) may populate the same table over the agent's lifetime,
//! so index values have to be handed out centrally. This library is that
//! central registry.
//!
//! ## Key Features
//!
//! - **Typed indexes**: INTEGER, OCTET STRING and OBJECT IDENTIFIER values,
//!   one type per table prefix
//! - **Exact, any or new**: ask for a specific value, any unused one, or one
//!   never handed out before
//! - **Holes**: released values stay reserved and are handed out again
//!   before new values are generated
//! - **Session cleanup**: everything a closing session held is released in
//!   one call
//! - **Delegation**: subagents forward all requests to their master
//!
//! ## Architecture
//!
//! - `oid`: OID type, dotted notation and comparison
//! - `index`: the registry, index value types and value generation
//! - `delegation`: local or delegated allocation front end
//! - `config`: scenario configuration types and validation
//! - `config_loader`: scenario file loading
//! - `scenario`: replay of scripted registry operations
//!
//! ## Example Usage
//!
//! ```rust
//! use agent_index::index::{IndexRegistry, IndexRequest, IndexType, IndexValue, SessionId};
//! use agent_index::oid::Oid;
//!
//! let mut registry = IndexRegistry::new();
//! let if_table: Oid = "1.3.6.1.2.1.2.2".parse()?;
//!
//! let first = registry.register(&if_table, IndexRequest::Any(IndexType::Integer), SessionId(1))?;
//! assert_eq!(first, IndexValue::Integer(1));
//!
//! registry.release(&if_table, &first)?;
//! let again = registry.register(&if_table, IndexRequest::Any(IndexType::Integer), SessionId(2))?;
//! assert_eq!(again, first);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Concurrency
//!
//! The registry has no internal locking. Hosts with more than one caller
//! wrap it in a single lock covering whole operations, as
//! `delegation::SharedRegistryGateway` does.
//!
//! ## Error Handling
//!
//! Registry operations return `index::RegistryError`. Scenario loading and
//! replay use `color_eyre` for error reporting with context.

pub mod config;
pub mod config_loader;
pub mod delegation;
pub mod index;
pub mod oid;
pub mod scenario;

pub use delegation::{DelegationGateway, IndexAllocator, SharedRegistryGateway};
pub use index::{IndexRegistry, IndexRequest, IndexType, IndexValue, RegistryError, SessionId};
pub use oid::Oid;
