pub mod auth;
pub mod backend;
pub mod client;
pub mod error;
pub mod home;
pub mod middleware;
pub mod oauth;

pub use backend::Backend;
pub use client::ApiClient;
pub use error::ApiError;
