//! Small numeric helpers shared by the analysis engines.

/// Gini coefficient of non-negative values.
///
/// Uses the sorted form `Σ (2(i+1) − n − 1)·v_i / (n·Σv)`. Returns 0 for an
/// empty slice or when every value is zero.
pub fn gini(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let sum: f64 = sorted.iter().sum();
    if sum == 0.0 {
        return 0.0;
    }

    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (2.0 * (i as f64 + 1.0) - n - 1.0) * v)
        .sum();
    weighted / (n * sum)
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, 0 for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64
}

/// Fraction of unordered pairs satisfying `related`. 0 with fewer than two
/// items.
pub fn pair_fraction<T>(items: &[T], related: impl Fn(&T, &T) -> bool) -> f64 {
    let mut total = 0usize;
    let mut hits = 0usize;
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            total += 1;
            if related(a, b) {
                hits += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// `numerator / denominator`, or 0 when the denominator is zero.
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_gini_reference_values() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[0.0, 0.0]), 0.0);
        assert!(close(gini(&[5.0, 5.0, 5.0]), 0.0));
        assert!(close(gini(&[0.0, 0.0, 10.0]), 2.0 / 3.0));
        assert!(close(gini(&[10.0, 0.0, 0.0]), 2.0 / 3.0));
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[3.0]), 0.0);
        assert!(close(variance(&[1.0, 3.0]), 1.0));
    }

    #[test]
    fn test_pair_fraction() {
        let values = [1, 1, 2];
        assert!(close(pair_fraction(&values, |a, b| a == b), 1.0 / 3.0));
        assert_eq!(pair_fraction(&[1], |_, _| true), 0.0);
    }
}
