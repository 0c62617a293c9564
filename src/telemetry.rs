use tracing_subscriber::{EnvFilter, fmt};

pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Install the global subscriber. `RUST_LOG` picks the filter (default
/// `info`) and `LOG_FORMAT=json` switches to one JSON object per line.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}
