//! Data carried between the HTTP layer, the services and the object store.
//!
//! Nothing here is persisted by this service; every record is derived from
//! the remote bucket for the duration of one request.

pub mod album;
pub mod migration;
pub mod object;
