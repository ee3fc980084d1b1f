//! # Auth Module
//!
//! HTTP surface of the login system:
//! - OAuth start and callback for Kakao and Naver
//! - Email/password signup and login
//! - Session lookup and logout

pub mod extractors;
pub mod flow;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod validators;


pub use routes::auth_routes;
