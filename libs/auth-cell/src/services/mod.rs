// libs/auth-cell/src/services/mod.rs
pub mod directory;

pub use directory::AuthServiceClient;
