//! Payout multiplier model.
//!
//! Pure, total, deterministic: the same function runs on the client for
//! display and on the settlement backend for pricing, and the two must
//! agree bit-for-bit. Only correctly-rounded IEEE 754 operations are
//! used; `x^1.5` is computed as `x * sqrt(x)` because `powf` carries no
//! rounding guarantee across platforms.

use tapgrid_core::Price;

/// Lower multiplier bound (x100 encoding: 100 = 1.00x).
pub const MIN_MULTIPLIER: u32 = 100;
/// Upper multiplier bound (x100 encoding: 2000 = 20.00x).
pub const MAX_MULTIPLIER: u32 = 2000;

/// Minimum effective duration in seconds.
const MIN_DURATION_S: f64 = 10.0;
/// Volatility scale of the square-root-of-time expected move.
const VOLATILITY_SCALE: f64 = 0.005;
/// Difficulty floor for targets inside the expected move.
const MIN_DIFFICULTY: f64 = 0.1;

/// Payout multiplier (x100) for reaching `target` from `entry` within
/// the given window.
///
/// `percent_distance / (0.005 * sqrt(duration_s))` measures how many
/// expected moves away the target sits; payout grows superlinearly with
/// that difficulty and is clamped to `[100, 2000]`.
#[must_use]
pub fn payout_multiplier(
    entry: Price,
    target: Price,
    entry_time_ms: u64,
    target_time_ms: u64,
) -> u32 {
    let entry_f = entry.to_f64();
    if entry_f == 0.0 {
        return MAX_MULTIPLIER;
    }

    let percent_distance = ((target - entry).to_f64() / entry_f).abs() * 100.0;

    let duration_s =
        ((target_time_ms.saturating_sub(entry_time_ms)) as f64 / 1000.0).max(MIN_DURATION_S);
    let expected_move = VOLATILITY_SCALE * duration_s.sqrt();

    let difficulty = (percent_distance / expected_move).max(MIN_DIFFICULTY);
    let raw = 100.0 + difficulty * difficulty.sqrt() * 10.0;

    raw.clamp(MIN_MULTIPLIER as f64, MAX_MULTIPLIER as f64)
        .round() as u32
}
