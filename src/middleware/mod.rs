pub mod rate_limit;

pub use rate_limit::{RateLimit, rate_limit_middleware};
