//! The query/submission HTTP API (spec component C10): credential gate,
//! rate limiting, response envelope, and REST handlers over the admission
//! controller and durable store, grounded on `at-bridge/http_api`.

pub mod auth;
pub mod envelope;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod types;

pub use auth::AuthedCredential;
pub use envelope::ApiError;
pub use routes::build_router;
pub use state::ApiState;
