pub mod dtos;
pub mod handlers;
pub mod jwt;
pub mod middleware;

pub use jwt::JwtService;
pub use middleware::{AuthError, AuthenticatedUser, SESSION_COOKIE};
