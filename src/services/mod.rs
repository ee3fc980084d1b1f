// src/services/mod.rs
//
// Authentication building blocks used by the auth handlers

pub mod cookies;
pub mod identity;
pub mod password;
pub mod providers;
pub mod tokens;

pub use identity::SqliteIdentityStore;
pub use tokens::SystemClock;
