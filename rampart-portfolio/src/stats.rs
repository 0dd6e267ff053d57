//! Return and covariance estimation on aligned close histories.

use itertools::Itertools;

/// Square matrix stored row-major as nested vectors.
pub type Matrix = Vec<Vec<f64>>;

/// Simple returns `p[t] / p[t-1] - 1` for one close series.
#[must_use]
pub fn simple_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .iter()
        .tuple_windows()
        .map(|(previous, current)| current / previous - 1.0)
        .collect()
}

#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Unbiased sample covariance of equally long return series.
#[must_use]
pub fn covariance(returns: &[Vec<f64>]) -> Matrix {
    let n = returns.len();
    let observations = returns.iter().map(Vec::len).min().unwrap_or(0);
    let mut matrix = vec![vec![0.0; n]; n];
    if observations < 2 {
        return matrix;
    }
    let means: Vec<f64> = returns.iter().map(|series| mean(series)).collect();
    for i in 0..n {
        for j in i..n {
            let value = (0..observations)
                .map(|t| (returns[i][t] - means[i]) * (returns[j][t] - means[j]))
                .sum::<f64>()
                / (observations as f64 - 1.0);
            matrix[i][j] = value;
            matrix[j][i] = value;
        }
    }
    matrix
}

/// Correlation matrix derived from a covariance matrix. Zero-variance rows correlate with
/// nothing but themselves.
#[must_use]
pub fn correlation(covariance: &Matrix) -> Matrix {
    let n = covariance.len();
    let deviations: Vec<f64> = (0..n).map(|i| covariance[i][i].max(0.0).sqrt()).collect();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            matrix[i][j] = if i == j {
                1.0
            } else if deviations[i] > 0.0 && deviations[j] > 0.0 {
                (covariance[i][j] / (deviations[i] * deviations[j])).clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
    }
    matrix
}

#[must_use]
pub fn trace(matrix: &Matrix) -> f64 {
    (0..matrix.len()).map(|i| matrix[i][i]).sum()
}

/// Ledoit-Wolf shrinkage of the sample covariance towards a scaled identity.
///
/// Returns the shrunk matrix and the shrinkage intensity in `[0, 1]`.
#[must_use]
pub fn ledoit_wolf(returns: &[Vec<f64>]) -> (Matrix, f64) {
    let n = returns.len();
    let observations = returns.iter().map(Vec::len).min().unwrap_or(0);
    if n == 0 || observations == 0 {
        return (Vec::new(), 1.0);
    }
    let t = observations as f64;
    let means: Vec<f64> = returns.iter().map(|series| mean(series)).collect();
    let centered: Vec<Vec<f64>> = (0..observations)
        .map(|row| (0..n).map(|i| returns[i][row] - means[i]).collect())
        .collect();

    let mut sample = vec![vec![0.0; n]; n];
    for row in &centered {
        for i in 0..n {
            for j in 0..n {
                sample[i][j] += row[i] * row[j] / t;
            }
        }
    }

    let target = trace(&sample) / n as f64;
    let mut distance = 0.0;
    for i in 0..n {
        for j in 0..n {
            let identity = if i == j { target } else { 0.0 };
            distance += (sample[i][j] - identity).powi(2);
        }
    }

    let mut dispersion = 0.0;
    for row in &centered {
        for i in 0..n {
            for j in 0..n {
                dispersion += (row[i] * row[j] - sample[i][j]).powi(2);
            }
        }
    }
    dispersion /= t * t;

    let intensity = if distance > 0.0 {
        (dispersion.min(distance) / distance).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let shrunk = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    let identity = if i == j { target } else { 0.0 };
                    intensity * identity + (1.0 - intensity) * sample[i][j]
                })
                .collect()
        })
        .collect();
    (shrunk, intensity)
}

/// `x' M y`
#[must_use]
pub fn quadratic_form(matrix: &Matrix, x: &[f64], y: &[f64]) -> f64 {
    matrix
        .iter()
        .zip(x)
        .map(|(row, xi)| xi * row.iter().zip(y).map(|(m, yj)| m * yj).sum::<f64>())
        .sum()
}

/// `M x`
#[must_use]
pub fn mat_vec(matrix: &Matrix, x: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(x).map(|(m, xi)| m * xi).sum())
        .collect()
}
