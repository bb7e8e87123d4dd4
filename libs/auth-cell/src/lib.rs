// libs/auth-cell/src/lib.rs
//! Authentication cell: proxies the external user directory and issues the
//! session tokens the other cells validate.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use router::auth_routes;
pub use services::AuthServiceClient;
