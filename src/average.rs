//! Division that reports missing data instead of failing

/// Average `total / count`, or `None` when there is nothing to average over.
///
/// A missing average is not a zero: `None` propagates into the output row as
/// an empty cell.
pub fn safe_average(total: f64, count: usize) -> Option<f64> {
    if count == 0 {
        return None;
    }
    Some(total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_count_is_none() {
        for total in [0.0, 1.0, 17.0, 1_000_000.0, -4.0] {
            assert_eq!(safe_average(total, 0), None);
        }
    }

    #[test]
    fn test_zero_total_with_positive_count_is_zero() {
        for count in [1, 2, 50] {
            assert_eq!(safe_average(0.0, count), Some(0.0));
        }
    }

    #[test]
    fn test_real_valued_quotient() {
        assert_eq!(safe_average(1.0, 4), Some(0.25));
        assert_eq!(safe_average(7.0, 2), Some(3.5));
        assert_eq!(safe_average(-60.0, 2), Some(-30.0));
    }
}
