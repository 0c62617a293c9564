pub mod process_url;

pub use process_url::{PROCESS_URL, ProcessUrlHandler, ProcessUrlPayload};
