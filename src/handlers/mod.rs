pub mod album_handlers;
pub mod health_handlers;
