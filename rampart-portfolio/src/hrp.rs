//! Hierarchical risk parity.
//!
//! Assets are clustered by correlation distance with single linkage, ordered so that similar
//! assets sit next to each other, and capital is split top-down between the two halves of each
//! cluster in inverse proportion to their variance. No matrix inversion is involved, which keeps
//! the weights stable on short, noisy windows.

use crate::stats::{correlation, covariance, quadratic_form, trace, Matrix};
use crate::{AllocationError, AllocationResult};

const VARIANCE_FLOOR: f64 = 1e-12;

/// HRP weights for the provided return series, in input order.
pub fn hrp_weights(returns: &[Vec<f64>]) -> AllocationResult<Vec<f64>> {
    let n = returns.len();
    if n < 2 {
        return Err(AllocationError::degenerate("fewer than two priced symbols"));
    }
    let cov = covariance(returns);
    if trace(&cov) <= VARIANCE_FLOOR {
        return Err(AllocationError::degenerate("covariance has no variance"));
    }
    let corr = correlation(&cov);
    let distance: Matrix = corr
        .iter()
        .map(|row| {
            row.iter()
                .map(|rho| ((1.0 - rho) / 2.0).clamp(0.0, 1.0).sqrt())
                .collect()
        })
        .collect();

    let order = quasi_diagonal_order(&distance);
    let weights = recursive_bisection(&cov, &order);
    if weights.iter().any(|weight| !weight.is_finite()) {
        return Err(AllocationError::NonFinite);
    }
    Ok(weights)
}

/// Leaf order of a single-linkage dendrogram built over `distance`.
fn quasi_diagonal_order(distance: &Matrix) -> Vec<usize> {
    let mut clusters: Vec<Vec<usize>> = (0..distance.len()).map(|i| vec![i]).collect();
    while clusters.len() > 1 {
        let mut best = (0, 1, f64::INFINITY);
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let link = linkage(distance, &clusters[a], &clusters[b]);
                if link < best.2 {
                    best = (a, b, link);
                }
            }
        }
        let (a, b, _) = best;
        let right = clusters.remove(b);
        clusters[a].extend(right);
    }
    clusters.pop().unwrap_or_default()
}

fn linkage(distance: &Matrix, left: &[usize], right: &[usize]) -> f64 {
    left.iter()
        .flat_map(|i| right.iter().map(move |j| distance[*i][*j]))
        .fold(f64::INFINITY, f64::min)
}

fn recursive_bisection(cov: &Matrix, order: &[usize]) -> Vec<f64> {
    let mut weights = vec![1.0; cov.len()];
    let mut pending: Vec<&[usize]> = vec![order];
    while let Some(cluster) = pending.pop() {
        if cluster.len() < 2 {
            continue;
        }
        let (left, right) = cluster.split_at(cluster.len() / 2);
        let left_variance = cluster_variance(cov, left);
        let right_variance = cluster_variance(cov, right);
        let total = left_variance + right_variance;
        let alpha = if total > 0.0 {
            1.0 - left_variance / total
        } else {
            0.5
        };
        for i in left {
            weights[*i] *= alpha;
        }
        for i in right {
            weights[*i] *= 1.0 - alpha;
        }
        pending.push(left);
        pending.push(right);
    }
    weights
}

/// Variance of the inverse-variance portfolio restricted to `members`.
fn cluster_variance(cov: &Matrix, members: &[usize]) -> f64 {
    let sub: Matrix = members
        .iter()
        .map(|i| members.iter().map(|j| cov[*i][*j]).collect())
        .collect();
    let inverse: Vec<f64> = members
        .iter()
        .map(|i| 1.0 / cov[*i][*i].max(VARIANCE_FLOOR))
        .collect();
    let total: f64 = inverse.iter().sum();
    let ivp: Vec<f64> = inverse.iter().map(|w| w / total).collect();
    quadratic_form(&sub, &ivp, &ivp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one_and_favor_low_variance() {
        let calm = vec![0.001, -0.001, 0.002, -0.002, 0.001, 0.0];
        let wild = vec![0.05, -0.04, 0.06, -0.05, 0.03, -0.02];
        let weights = hrp_weights(&[calm, wild]).unwrap();
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(weights[0] > weights[1]);
    }

    #[test]
    fn correlated_assets_are_grouped() {
        let distance = vec![
            vec![0.0, 0.9, 0.1],
            vec![0.9, 0.0, 0.8],
            vec![0.1, 0.8, 0.0],
        ];
        let order = quasi_diagonal_order(&distance);
        let first = order.iter().position(|i| *i == 0).unwrap();
        let third = order.iter().position(|i| *i == 2).unwrap();
        assert_eq!(first.abs_diff(third), 1);
    }

    #[test]
    fn rejects_single_asset_and_flat_prices() {
        assert!(hrp_weights(&[vec![0.01, 0.02]]).is_err());
        assert!(hrp_weights(&[vec![0.0; 5], vec![0.0; 5]]).is_err());
    }
}
