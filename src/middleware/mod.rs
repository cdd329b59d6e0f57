// Request pipeline middleware: access-token validation and CORS.

pub mod auth;
pub mod auth_middleware;
pub mod cors;

pub use auth::AuthenticatedUser;
pub use auth_middleware::{auth_middleware, optional_auth_middleware, OptionalUser};
pub use cors::dynamic_cors_middleware;
