//! Stratus Core
//!
//! Provider interface, resource and schema model, and the polling and
//! locking primitives shared by provider implementations.

pub mod differ;
pub mod mutexkv;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod waiter;
