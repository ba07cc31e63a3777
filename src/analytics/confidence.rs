//! Rate confidence scoring.
//!
//! Half of the score comes from the number of lots physically checked
//! (saturating at 10), half from how the price was verified:
//!
//! ```text
//! score = round(lots / 10 * 50 + weight / 10 * 50)
//! ```

use crate::market::models::VerificationLevel;

/// Lots beyond this count add no further confidence.
pub const MAX_LOTS: u32 = 10;

/// Score a submitted price on a 0–100 scale.
pub fn score(level: VerificationLevel, lots_checked: u32) -> u8 {
    let lots = lots_checked.min(MAX_LOTS);
    // Both terms reduce to multiples of 5, so the result is already integral.
    let total = lots * 5 + level.weight() * 5;
    total.min(100) as u8
}
