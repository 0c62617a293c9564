use rand::Rng;
use std::time::Duration;

/// Exponential backoff with ±30% jitter, capped at `max`.
pub fn calculate_backoff_delay(failures: u32, base: Duration, max: Duration) -> Duration {
    // Cap the exponent to prevent overflow
    let capped = failures.min(10);

    let exponential = base.saturating_mul(2_u32.saturating_pow(capped)).min(max);

    let jitter_factor = rand::thread_rng().gen_range(0.7..1.3);
    exponential.mul_f64(jitter_factor)
}
