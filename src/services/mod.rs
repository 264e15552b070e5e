//! Request-independent business logic behind the HTTP handlers.

pub mod album_service;
pub mod migration;
