pub mod auth;
pub mod health;

pub use auth::auth_config;
pub use health::health_config;
