//! HTTP surface for stratod: REST CRUD over the hierarchy/quota/VM tables
//! plus the WebSocket-framed agent channel.

pub mod rest;
pub mod tls;

pub use rest::router::create_router;
pub use rest::state::AppState;
