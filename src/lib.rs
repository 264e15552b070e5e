//! Photo album web service backed by S3-compatible object storage.
//!
//! Lists albums (folder prefixes) and photos under a fixed root, uploads new
//! photos, and moves every object under a folder to another storage class.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
