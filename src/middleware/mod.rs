pub mod auth;

pub use auth::BearerAuthentication;
