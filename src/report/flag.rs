//! Abnormality flag derivation.

use crate::models::enums::ResultFlag;
use crate::models::TestOrder;

/// Flag a value against a reference range.
///
/// `None` when there is no value or no range (`min = max = 0`).
pub fn compute_flag(value: Option<f64>, ref_min: f64, ref_max: f64) -> Option<ResultFlag> {
    let value = value?;
    if ref_min == 0.0 && ref_max == 0.0 {
        return None;
    }
    if value < ref_min {
        Some(ResultFlag::Low)
    } else if value > ref_max {
        Some(ResultFlag::High)
    } else {
        Some(ResultFlag::Normal)
    }
}

/// Flag a value against the range frozen on a test order.
pub fn flag_for_order(order: &TestOrder, value: Option<f64>) -> Option<ResultFlag> {
    compute_flag(value, order.ref_min, order.ref_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_min_is_low() {
        assert_eq!(compute_flag(Some(3.9), 4.0, 11.0), Some(ResultFlag::Low));
    }

    #[test]
    fn above_max_is_high() {
        assert_eq!(compute_flag(Some(12.0), 4.0, 11.0), Some(ResultFlag::High));
    }

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(compute_flag(Some(4.0), 4.0, 11.0), Some(ResultFlag::Normal));
        assert_eq!(compute_flag(Some(11.0), 4.0, 11.0), Some(ResultFlag::Normal));
        assert_eq!(compute_flag(Some(7.5), 4.0, 11.0), Some(ResultFlag::Normal));
    }

    #[test]
    fn unset_range_has_no_flag() {
        assert_eq!(compute_flag(Some(-5.0), 0.0, 0.0), None);
        assert_eq!(compute_flag(Some(0.0), 0.0, 0.0), None);
        assert_eq!(compute_flag(Some(1e9), 0.0, 0.0), None);
    }

    #[test]
    fn missing_value_has_no_flag() {
        assert_eq!(compute_flag(None, 4.0, 11.0), None);
    }

    #[test]
    fn range_starting_at_zero_still_flags() {
        assert_eq!(compute_flag(Some(250.0), 0.0, 200.0), Some(ResultFlag::High));
        assert_eq!(compute_flag(Some(0.0), 0.0, 200.0), Some(ResultFlag::Normal));
    }

    #[test]
    fn deterministic_over_a_sweep() {
        for i in -20..40 {
            let v = i as f64 * 0.5;
            let expected = if v < 4.0 {
                ResultFlag::Low
            } else if v > 11.0 {
                ResultFlag::High
            } else {
                ResultFlag::Normal
            };
            assert_eq!(compute_flag(Some(v), 4.0, 11.0), Some(expected));
            assert_eq!(compute_flag(Some(v), 4.0, 11.0), compute_flag(Some(v), 4.0, 11.0));
        }
    }
}
