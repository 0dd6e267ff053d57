//! Long-only maximum-Sharpe weights on a shrunk covariance.

use std::cmp::Ordering;

use crate::stats::{ledoit_wolf, mat_vec, mean, quadratic_form, trace, Matrix};
use crate::{AllocationError, AllocationResult};

const TOLERANCE: f64 = 1e-9;
const MIN_STEP: f64 = 1e-14;
const DUST: f64 = 1e-6;

/// Tuning knobs of the projected-gradient solver.
#[derive(Clone, Copy, Debug)]
pub struct SharpeSolver {
    pub risk_free_rate: f64,
    pub max_iterations: usize,
    /// Weightings whose volatility exceeds this bound are infeasible.
    pub max_volatility: Option<f64>,
}

impl SharpeSolver {
    /// Weights maximizing `(w·mu - rf) / sqrt(w' S w)` subject to `w >= 0`, `sum(w) = 1` and,
    /// when set, `sqrt(w' S w) <= max_volatility`.
    pub fn solve(&self, returns: &[Vec<f64>]) -> AllocationResult<Vec<f64>> {
        let n = returns.len();
        if n < 2 {
            return Err(AllocationError::degenerate("fewer than two priced symbols"));
        }
        let expected: Vec<f64> = returns.iter().map(|series| mean(series)).collect();
        if expected.iter().all(|mu| *mu <= self.risk_free_rate) {
            return Err(AllocationError::degenerate(
                "no asset beats the risk-free rate",
            ));
        }
        let (cov, _) = ledoit_wolf(returns);
        if trace(&cov) <= f64::EPSILON * f64::EPSILON {
            return Err(AllocationError::degenerate("covariance has no variance"));
        }

        let sharpe = |weights: &[f64]| -> Option<f64> {
            let variance = quadratic_form(&cov, weights, weights);
            if variance <= 0.0 || !variance.is_finite() {
                return None;
            }
            let sigma = variance.sqrt();
            if self.max_volatility.is_some_and(|cap| sigma > cap) {
                return None;
            }
            let excess: f64 = weights.iter().zip(&expected).map(|(w, mu)| w * mu).sum::<f64>()
                - self.risk_free_rate;
            Some(excess / sigma)
        };

        // Equal weights first, then single-asset vertices when the cap excludes them.
        let starts = std::iter::once(vec![1.0 / n as f64; n]).chain((0..n).map(|index| {
            let mut vertex = vec![0.0; n];
            vertex[index] = 1.0;
            vertex
        }));
        let (mut weights, mut value) = starts
            .filter_map(|start| sharpe(&start).map(|value| (start, value)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .ok_or_else(|| match self.max_volatility {
                Some(cap) => AllocationError::degenerate(format!(
                    "no weighting within the volatility cap {cap}"
                )),
                None => AllocationError::NonFinite,
            })?;
        let mut step = 1.0;

        for _ in 0..self.max_iterations {
            let gradient = self.gradient(&cov, &expected, &weights);
            let mut improved = None;
            while step > MIN_STEP {
                let candidate = project_to_simplex(
                    &weights
                        .iter()
                        .zip(&gradient)
                        .map(|(w, g)| w + step * g)
                        .collect::<Vec<_>>(),
                );
                match sharpe(&candidate) {
                    Some(candidate_value) if candidate_value > value => {
                        improved = Some((candidate, candidate_value));
                        break;
                    }
                    _ => step *= 0.5,
                }
            }
            let Some((candidate, candidate_value)) = improved else {
                return finish(weights);
            };
            let movement: f64 = candidate
                .iter()
                .zip(&weights)
                .map(|(a, b)| (a - b).abs())
                .sum();
            weights = candidate;
            value = candidate_value;
            step = (step * 2.0).min(1e6);
            if movement < TOLERANCE {
                return finish(weights);
            }
        }
        Err(AllocationError::NotConverged {
            iterations: self.max_iterations,
        })
    }

    fn gradient(&self, cov: &Matrix, expected: &[f64], weights: &[f64]) -> Vec<f64> {
        let cov_w = mat_vec(cov, weights);
        let variance: f64 = weights.iter().zip(&cov_w).map(|(w, c)| w * c).sum();
        let sigma = variance.sqrt();
        let excess: f64 = weights
            .iter()
            .zip(expected)
            .map(|(w, mu)| w * mu)
            .sum::<f64>()
            - self.risk_free_rate;
        expected
            .iter()
            .zip(&cov_w)
            .map(|(mu, c)| (mu * sigma - excess * c / sigma) / variance)
            .collect()
    }
}

fn finish(mut weights: Vec<f64>) -> AllocationResult<Vec<f64>> {
    weights.iter_mut().for_each(|weight| {
        if *weight < DUST {
            *weight = 0.0;
        }
    });
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(AllocationError::NonFinite);
    }
    Ok(weights.into_iter().map(|weight| weight / total).collect())
}

/// Euclidean projection onto the probability simplex.
#[must_use]
pub fn project_to_simplex(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (index, value) in sorted.iter().enumerate() {
        cumulative += value;
        let candidate = (cumulative - 1.0) / (index as f64 + 1.0);
        if value - candidate > 0.0 {
            theta = candidate;
        }
    }
    values.iter().map(|value| (value - theta).max(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> SharpeSolver {
        SharpeSolver {
            risk_free_rate: 0.0,
            max_iterations: 5_000,
            max_volatility: None,
        }
    }

    fn volatility(returns: &[Vec<f64>], weights: &[f64]) -> f64 {
        let (cov, _) = ledoit_wolf(returns);
        quadratic_form(&cov, weights, weights).sqrt()
    }

    #[test]
    fn projection_lands_on_simplex() {
        let projected = project_to_simplex(&[0.8, 0.6, -0.2]);
        assert!((projected.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((projected[0] - 0.6).abs() < 1e-12);
        assert!((projected[1] - 0.4).abs() < 1e-12);
        assert_eq!(projected[2], 0.0);
    }

    #[test]
    fn prefers_the_better_risk_adjusted_asset() {
        let strong = vec![0.012, 0.008, 0.011, 0.009, 0.010, 0.012, 0.008];
        let weak = vec![0.002, -0.010, 0.015, -0.012, 0.004, 0.011, -0.006];
        let weights = solver().solve(&[strong, weak]).unwrap();
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(weights.iter().all(|w| *w >= 0.0));
        assert!(weights[0] > weights[1]);
    }

    #[test]
    fn losing_assets_are_degenerate() {
        let a = vec![-0.01, -0.02, -0.01];
        let b = vec![-0.02, -0.01, -0.03];
        assert!(matches!(
            solver().solve(&[a, b]),
            Err(AllocationError::Degenerate(_))
        ));
    }

    #[test]
    fn volatility_cap_shifts_weight_to_the_calmer_asset() {
        let loud = vec![0.030, 0.010, 0.032, 0.008, 0.031, 0.009, 0.030, 0.010];
        let calm = vec![0.003, -0.001, 0.002, 0.000, 0.003, -0.001, 0.002, 0.000];
        let returns = [loud, calm];

        let free = solver().solve(&returns).unwrap();
        let free_vol = volatility(&returns, &free);
        let calm_vol = volatility(&returns, &[0.0, 1.0]);
        assert!(free_vol > calm_vol);

        let cap = (free_vol + calm_vol) / 2.0;
        let capped = SharpeSolver {
            max_volatility: Some(cap),
            ..solver()
        }
        .solve(&returns)
        .unwrap();
        assert!((capped.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(volatility(&returns, &capped) <= cap * (1.0 + 1e-6));
        assert!(capped[1] > free[1]);
    }

    #[test]
    fn unreachable_volatility_cap_is_degenerate() {
        let a = vec![0.012, 0.008, 0.011, 0.009, 0.010, 0.012, 0.008];
        let b = vec![0.002, -0.010, 0.015, -0.012, 0.004, 0.011, -0.006];
        let capped = SharpeSolver {
            max_volatility: Some(1e-12),
            ..solver()
        };
        assert!(matches!(
            capped.solve(&[a, b]),
            Err(AllocationError::Degenerate(_))
        ));
    }
}
