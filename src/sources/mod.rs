pub mod runner;
pub mod validation;

pub use runner::{RunAllOutcome, RunSourceOutcome, SOURCE_NOT_FOUND, SourceRunner};
pub use validation::{SourceInputError, is_valid_source_url, new_source, parse_kind};
