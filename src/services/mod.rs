pub mod challenge_store;
pub mod rate_limiter;
pub mod signup_service;

pub use challenge_store::*;
pub use rate_limiter::*;
pub use signup_service::*;
