pub mod backoff;
pub mod errors;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod repository;
pub mod runner;
pub mod worker;

pub use backoff::*;
pub use errors::*;
pub use handler::*;
pub use handlers::*;
pub use registry::*;
pub use repository::*;
pub use runner::*;
pub use worker::*;
