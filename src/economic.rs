//! Amount arithmetic: canonical denominations, size penalty and formatting

use crate::error::{ConsensusError, Result};

/// DecomposeAmount: ℕ → ℕ*
///
/// Splits an amount into its nonzero decimal digits, each scaled by its power
/// of ten, ordered from the lowest denomination to the highest.
///
/// Example: 1_204 → [4, 200, 1_000]
pub fn decompose_amount(amount: u64) -> Vec<u64> {
    let mut chunks = Vec::new();
    let mut rest = amount;
    let mut order: u64 = 1;
    while rest > 0 {
        let digit = rest % 10;
        if digit != 0 {
            chunks.push(digit * order);
        }
        rest /= 10;
        if rest > 0 {
            order *= 10;
        }
    }
    chunks
}

/// Whether `amount = d × 10^k` with `d ∈ [1, 9]`
pub fn is_canonical_amount(amount: u64) -> bool {
    if amount == 0 {
        return false;
    }
    let mut rest = amount;
    while rest % 10 == 0 {
        rest /= 10;
    }
    rest < 10
}

/// Split an amount into canonical denominations, capped at `max_outputs`
///
/// While the cap is exceeded the two smallest denominations are merged.
/// A cap of zero is a configuration error.
pub fn decompose_amount_capped(amount: u64, max_outputs: usize) -> Result<Vec<u64>> {
    if max_outputs == 0 {
        return Err(ConsensusError::Configuration(
            "output cap must allow at least one output".to_string(),
        ));
    }
    let mut chunks = decompose_amount(amount);
    while chunks.len() > max_outputs {
        let smallest = chunks.remove(0);
        chunks[0] += smallest;
    }
    Ok(chunks)
}

/// GetPenalizedAmount: ℕ × ℕ × ℕ → ℕ
///
/// Formula: amount × (2M − S) × S / M², where M is the median size and S the
/// current block size. No penalty while S ≤ M, nothing left once S ≥ 2M.
pub fn get_penalized_amount(amount: u64, median_size: u64, current_block_size: u64) -> u64 {
    if amount == 0 || current_block_size <= median_size {
        return amount;
    }
    if current_block_size >= median_size.saturating_mul(2) {
        return 0;
    }

    let m = u128::from(median_size);
    let s = u128::from(current_block_size);
    let factor = s * (2 * m - s);
    let penalized = match u128::from(amount).checked_mul(factor) {
        Some(product) => product / m / m,
        // sizes beyond 2^32 bytes: divide first, loses sub-unit precision only
        None => u128::from(amount) * (factor / m) / m,
    };
    penalized as u64
}

/// Truncates the lowest `digits` decimal digits of an amount
pub fn cut_low_digits(amount: u64, digits: u32) -> u64 {
    match 10u64.checked_pow(digits) {
        Some(divisor) => amount / divisor * divisor,
        None => 0,
    }
}

/// Formats atomic units as a decimal coin amount: 1_500_000 → "1.500000"
pub fn format_amount(amount: u64, decimal_places: u8) -> String {
    if decimal_places == 0 {
        return amount.to_string();
    }
    let digits = format!("{:0>width$}", amount, width = decimal_places as usize + 1);
    let split = digits.len() - decimal_places as usize;
    format!("{}.{}", &digits[..split], &digits[split..])
}

/// Parses a decimal coin amount into atomic units
///
/// Returns None on malformed input, more fraction digits than `decimal_places`,
/// or overflow.
pub fn parse_amount(text: &str, decimal_places: u8) -> Option<u64> {
    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimal_places as usize {
        return None;
    }

    let mut digits = String::with_capacity(whole.len() + decimal_places as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    for _ in fraction.len()..decimal_places as usize {
        digits.push('0');
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // DECOMPOSITION
    // ============================================================================

    #[test]
    fn test_decompose_amount() {
        assert_eq!(decompose_amount(0), Vec::<u64>::new());
        assert_eq!(decompose_amount(7), vec![7]);
        assert_eq!(decompose_amount(1_204), vec![4, 200, 1_000]);
        assert_eq!(decompose_amount(5_000_000), vec![5_000_000]);
        assert_eq!(decompose_amount(u64::MAX).iter().sum::<u64>(), u64::MAX);
    }

    #[test]
    fn test_decomposition_is_canonical() {
        for amount in [1u64, 19, 1_001, 987_654_321, u64::MAX] {
            assert!(decompose_amount(amount).into_iter().all(is_canonical_amount));
        }
    }

    #[test]
    fn test_is_canonical_amount() {
        assert!(is_canonical_amount(1));
        assert!(is_canonical_amount(9_000));
        assert!(!is_canonical_amount(0));
        assert!(!is_canonical_amount(11));
        assert!(!is_canonical_amount(1_200));
    }

    #[test]
    fn test_decompose_amount_capped_merges_smallest() {
        assert_eq!(decompose_amount_capped(1_234, 10).unwrap(), vec![4, 30, 200, 1_000]);
        assert_eq!(decompose_amount_capped(1_234, 2).unwrap(), vec![234, 1_000]);
        assert_eq!(decompose_amount_capped(1_234, 1).unwrap(), vec![1_234]);
        assert!(matches!(
            decompose_amount_capped(1_234, 0),
            Err(ConsensusError::Configuration(_))
        ));
        assert!(matches!(decompose_amount_capped(0, 0), Err(ConsensusError::Configuration(_))));
    }

    // ============================================================================
    // PENALTY
    // ============================================================================

    #[test]
    fn test_penalty_free_below_median() {
        assert_eq!(get_penalized_amount(1_000, 100, 50), 1_000);
        assert_eq!(get_penalized_amount(1_000, 100, 100), 1_000);
    }

    #[test]
    fn test_penalty_curve() {
        // S = 1.5M → 1 − 0.25
        assert_eq!(get_penalized_amount(1_000, 100, 150), 750);
        assert_eq!(get_penalized_amount(1_000, 100, 200), 0);
        assert_eq!(get_penalized_amount(0, 100, 150), 0);
    }

    #[test]
    fn test_cut_low_digits() {
        assert_eq!(cut_low_digits(123_456, 0), 123_456);
        assert_eq!(cut_low_digits(123_456, 2), 123_400);
        assert_eq!(cut_low_digits(123_456, 30), 0);
    }

    // ============================================================================
    // FORMATTING
    // ============================================================================

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000, 6), "1.500000");
        assert_eq!(format_amount(42, 6), "0.000042");
        assert_eq!(format_amount(42, 0), "42");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.5", 6), Some(1_500_000));
        assert_eq!(parse_amount("0.000042", 6), Some(42));
        assert_eq!(parse_amount("12", 6), Some(12_000_000));
        assert_eq!(parse_amount(".5", 6), Some(500_000));
        assert_eq!(parse_amount("1.0000001", 6), None);
        assert_eq!(parse_amount("1.10000000", 6), Some(1_100_000));
        assert_eq!(parse_amount("abc", 6), None);
        assert_eq!(parse_amount("", 6), None);
        assert_eq!(parse_amount("99999999999999999999", 6), None);
    }
}
