//! Anomaly Scorer - statistical distance from the learned baseline.
//!
//! Severity is the Mahalanobis distance of the live feature vector from the
//! baseline mean, using a ridge-regularized sample covariance factored by
//! Cholesky. When the covariance is unusable the scorer degrades to a
//! per-feature normalized Euclidean distance over the diagonal variances.
//!
//! Absence of a baseline (or a baseline too thin or incompatible to trust)
//! yields the configured maximal-uncertainty severity, never zero: an
//! unknown binary is a reason for caution, not trust.
//!
//! The scorer is read-only. It sees only an in-memory `BaselineRecord` and
//! never touches the store's write path.

use ndarray::{Array1, Array2};

use crate::logic::features::FeatureVector;
use crate::logic::store::baseline::BaselineRecord;

/// Variance floor for the degraded path; avoids dividing by a dead feature.
const VARIANCE_FLOOR: f64 = 1e-9;

/// Severity of `vector` against `baseline`. Non-negative.
pub fn severity(
    vector: &FeatureVector,
    baseline: Option<&BaselineRecord>,
    max_uncertainty: f64,
    min_samples: u64,
) -> f64 {
    let baseline = match baseline {
        Some(b) => b,
        None => return max_uncertainty,
    };

    // A thin profile is statistically indistinguishable from no profile.
    if baseline.samples < min_samples {
        return max_uncertainty;
    }
    if !vector.layout_matches(baseline.feature_version, baseline.layout_hash) {
        log::warn!(
            "Layout mismatch scoring pid {}: vector v{}/{:x} vs baseline v{}/{:x}",
            vector.pid,
            vector.version,
            vector.layout_hash,
            baseline.feature_version,
            baseline.layout_hash
        );
        return max_uncertainty;
    }
    if vector.dim() != baseline.dim() || baseline.covariance.len() != baseline.dim() {
        return max_uncertainty;
    }

    let deviation: Vec<f64> = vector
        .values
        .iter()
        .zip(baseline.mean.iter())
        .map(|(x, m)| x - m)
        .collect();

    match mahalanobis(&deviation, &baseline.covariance) {
        Some(d) => d,
        None => normalized_euclidean(&deviation, &baseline.covariance),
    }
}

/// sqrt(d' Sigma^-1 d) via Cholesky: with Sigma = L L', the distance is
/// ||L^-1 d||. Returns None when the regularized covariance is still not
/// positive definite or malformed.
fn mahalanobis(deviation: &[f64], covariance: &[Vec<f64>]) -> Option<f64> {
    let n = deviation.len();
    if covariance.iter().any(|row| row.len() != n) {
        return None;
    }

    let mut sigma = Array2::<f64>::zeros((n, n));
    for (i, row) in covariance.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            if !v.is_finite() {
                return None;
            }
            sigma[[i, j]] = *v;
        }
    }

    // Ridge keeps a near-singular sample covariance factorable without
    // meaningfully distorting well-conditioned ones.
    let trace: f64 = (0..n).map(|i| sigma[[i, i]]).sum();
    let eps = (1e-6 * trace / n as f64).max(1e-12);
    for i in 0..n {
        sigma[[i, i]] += eps;
    }

    let l = cholesky(&sigma)?;
    let y = forward_substitute(&l, &Array1::from(deviation.to_vec()))?;
    Some(y.dot(&y).sqrt())
}

/// Lower-triangular Cholesky factor, or None if not positive definite.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve L y = b for lower-triangular L.
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        let diag = l[[i, i]];
        if diag == 0.0 || !diag.is_finite() {
            return None;
        }
        y[i] = sum / diag;
    }
    Some(y)
}

/// Degraded metric: per-feature deviation over the diagonal variances.
fn normalized_euclidean(deviation: &[f64], covariance: &[Vec<f64>]) -> f64 {
    deviation
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let var = covariance
                .get(i)
                .and_then(|row| row.get(i))
                .copied()
                .unwrap_or(VARIANCE_FLOOR)
                .max(VARIANCE_FLOOR);
            d * d / var
        })
        .sum::<f64>()
        .sqrt()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_UNCERTAINTY: f64 = 10.0;
    const MIN_SAMPLES: u64 = 10;

    fn identity_cov(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect()
    }

    fn sample_baseline(mean: Vec<f64>, cov: Vec<Vec<f64>>, samples: u64) -> BaselineRecord {
        BaselineRecord::new("/usr/bin/x", mean, cov, 0.5, samples)
    }

    fn sample_vector(values: Vec<f64>) -> FeatureVector {
        FeatureVector::new(1, "/usr/bin/x", values, 0)
    }

    #[test]
    fn test_missing_baseline_is_max_uncertainty() {
        let v = sample_vector(vec![0.0, 0.0]);
        assert_eq!(severity(&v, None, MAX_UNCERTAINTY, MIN_SAMPLES), MAX_UNCERTAINTY);
    }

    #[test]
    fn test_thin_baseline_is_max_uncertainty() {
        let b = sample_baseline(vec![0.0, 0.0], identity_cov(2), 3);
        let v = sample_vector(vec![0.0, 0.0]);
        assert_eq!(severity(&v, Some(&b), MAX_UNCERTAINTY, MIN_SAMPLES), MAX_UNCERTAINTY);
    }

    #[test]
    fn test_zero_deviation_scores_near_zero() {
        let b = sample_baseline(vec![1.0, 2.0, 3.0], identity_cov(3), 100);
        let v = sample_vector(vec![1.0, 2.0, 3.0]);
        let s = severity(&v, Some(&b), MAX_UNCERTAINTY, MIN_SAMPLES);
        assert!(s < 1e-6, "got {}", s);
    }

    #[test]
    fn test_identity_covariance_matches_euclidean() {
        let b = sample_baseline(vec![0.0, 0.0], identity_cov(2), 100);
        let v = sample_vector(vec![3.0, 4.0]);
        let s = severity(&v, Some(&b), MAX_UNCERTAINTY, MIN_SAMPLES);
        assert!((s - 5.0).abs() < 1e-3, "got {}", s);
    }

    #[test]
    fn test_high_variance_dampens_severity() {
        // Same deviation, wider learned variance: lower severity.
        let tight = sample_baseline(vec![0.0], vec![vec![1.0]], 100);
        let loose = sample_baseline(vec![0.0], vec![vec![25.0]], 100);
        let v = sample_vector(vec![5.0]);
        let s_tight = severity(&v, Some(&tight), MAX_UNCERTAINTY, MIN_SAMPLES);
        let s_loose = severity(&v, Some(&loose), MAX_UNCERTAINTY, MIN_SAMPLES);
        assert!((s_tight - 5.0).abs() < 1e-3);
        assert!((s_loose - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_correlation_matters() {
        // Deviation along the learned correlation direction scores lower
        // than the same-magnitude deviation against it.
        let cov = vec![vec![1.0, 0.9], vec![0.9, 1.0]];
        let b = sample_baseline(vec![0.0, 0.0], cov, 100);
        let along = sample_vector(vec![2.0, 2.0]);
        let against = sample_vector(vec![2.0, -2.0]);
        let s_along = severity(&along, Some(&b), 1e9, MIN_SAMPLES);
        let s_against = severity(&against, Some(&b), 1e9, MIN_SAMPLES);
        assert!(s_against > s_along);
    }

    #[test]
    fn test_non_pd_covariance_degrades_not_panics() {
        // Negative diagonal is not a valid covariance; the degraded metric
        // still produces a finite non-negative severity.
        let cov = vec![vec![-1.0, 0.0], vec![0.0, 4.0]];
        let b = sample_baseline(vec![0.0, 0.0], cov, 100);
        let v = sample_vector(vec![1.0, 2.0]);
        let s = severity(&v, Some(&b), MAX_UNCERTAINTY, MIN_SAMPLES);
        assert!(s.is_finite() && s >= 0.0);
    }

    #[test]
    fn test_dim_mismatch_is_max_uncertainty() {
        let b = sample_baseline(vec![0.0, 0.0], identity_cov(2), 100);
        let v = sample_vector(vec![1.0, 2.0, 3.0]);
        assert_eq!(severity(&v, Some(&b), MAX_UNCERTAINTY, MIN_SAMPLES), MAX_UNCERTAINTY);
    }
}
