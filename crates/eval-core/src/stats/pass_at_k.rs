//! Unbiased pass@k estimation.

use crate::domain::EvalResult;

/// Probability that at least one of `k` samples drawn without replacement
/// from `n` trials with `c` passes is a pass.
///
/// `1 - C(n-c, k) / C(n, k)`, evaluated as `1 - Π_{i=n-c+1}^{n} (1 - k/i)`
/// so it never forms a factorial.
pub fn pass_at_k_counts(n: usize, c: usize, k: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let c = c.min(n);
    if k > n {
        return c as f64 / n as f64;
    }
    if c == n {
        return 1.0;
    }
    if c == 0 {
        return 0.0;
    }
    if n - c < k {
        return 1.0;
    }
    let k = k as f64;
    let miss: f64 = (n - c + 1..=n).map(|i| 1.0 - k / i as f64).product();
    1.0 - miss
}

/// pass@k over a group of results.
pub fn pass_at_k_unbiased(results: &[EvalResult], k: usize) -> f64 {
    let passed = results.iter().filter(|r| r.passed).count();
    pass_at_k_counts(results.len(), passed, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_cases() {
        assert_eq!(pass_at_k_counts(0, 0, 1), 0.0);
        assert_eq!(pass_at_k_counts(5, 5, 3), 1.0);
        assert_eq!(pass_at_k_counts(5, 0, 3), 0.0);
        assert!((pass_at_k_counts(4, 1, 10) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn pass_at_one_is_pass_rate() {
        assert!((pass_at_k_counts(10, 3, 1) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn matches_binomial_form() {
        // n = 10, c = 3, k = 5: 1 - C(7,5)/C(10,5) = 1 - 21/252
        assert!((pass_at_k_counts(10, 3, 5) - (1.0 - 21.0 / 252.0)).abs() < 1e-12);
    }

    #[test]
    fn certain_when_failures_fewer_than_k() {
        assert_eq!(pass_at_k_counts(5, 3, 3), 1.0);
    }

    #[test]
    fn large_n_does_not_overflow() {
        let p = pass_at_k_counts(10_000, 5_000, 50);
        assert!(p > 0.999_999 && p <= 1.0);
    }

    #[test]
    fn monotone_in_k() {
        let mut last = 0.0;
        for k in 1..=10 {
            let p = pass_at_k_counts(10, 2, k);
            assert!(p >= last);
            last = p;
        }
    }
}
