//! 稠密线性代数工具
//!
//! 组合构建只涉及小规模对称矩阵，这里提供样本协方差、条件数（Jacobi 特征值）
//! 以及带部分主元的高斯消元。

use ndarray::{Array1, Array2};
use statrs::statistics::Statistics;

/// Jacobi 迭代的最大扫描次数
const MAX_JACOBI_SWEEPS: usize = 100;

/// 样本协方差矩阵（分母 n-1），列为标的、行为观测
///
/// 观测少于两行或结果含非有限值时返回 None。
pub fn sample_covariance(returns: &Array2<f64>) -> Option<Array2<f64>> {
    let (rows, cols) = returns.dim();
    if rows < 2 || cols == 0 {
        return None;
    }

    let mut covariance = Array2::zeros((cols, cols));
    for i in 0..cols {
        for j in i..cols {
            let value = returns.column(i).iter().covariance(returns.column(j).iter());
            if !value.is_finite() {
                return None;
            }
            covariance[[i, j]] = value;
            covariance[[j, i]] = value;
        }
    }
    Some(covariance)
}

/// 对称矩阵的特征值（循环 Jacobi 方法），升序返回
pub fn symmetric_eigenvalues(matrix: &Array2<f64>) -> Vec<f64> {
    let n = matrix.nrows();
    let mut a = matrix.to_owned();

    for _ in 0..MAX_JACOBI_SWEEPS {
        let mut off_diagonal = 0.0;
        let mut total = 0.0;
        for i in 0..n {
            for j in 0..n {
                let square = a[[i, j]] * a[[i, j]];
                total += square;
                if i != j {
                    off_diagonal += square;
                }
            }
        }
        if off_diagonal == 0.0 || off_diagonal <= f64::EPSILON * f64::EPSILON * total {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
            }
        }
    }

    let mut eigenvalues: Vec<f64> = (0..n).map(|i| a[[i, i]]).collect();
    eigenvalues.sort_by(|x, y| x.total_cmp(y));
    eigenvalues
}

/// 对称矩阵的 2-范数条件数；奇异矩阵返回无穷大
pub fn condition_number(matrix: &Array2<f64>) -> f64 {
    let magnitudes: Vec<f64> = symmetric_eigenvalues(matrix)
        .into_iter()
        .map(f64::abs)
        .collect();
    let largest = magnitudes.iter().copied().fold(0.0, f64::max);
    let smallest = magnitudes.iter().copied().fold(f64::INFINITY, f64::min);

    if magnitudes.iter().any(|m| !m.is_finite()) {
        return f64::INFINITY;
    }
    if smallest == 0.0 || !smallest.is_finite() {
        return f64::INFINITY;
    }
    largest / smallest
}

/// 求解 `a · x = b`，主元过小（矩阵数值奇异）时返回 None
pub fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return None;
    }

    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tolerance = scale * 1e-13;

    let mut m = a.to_owned();
    let mut rhs = b.to_owned();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))?;
        if m[[pivot_row, col]].abs() <= tolerance {
            return None;
        }
        if pivot_row != col {
            for k in 0..n {
                m.swap([col, k], [pivot_row, k]);
            }
            rhs.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut sum = rhs[row];
        for k in (row + 1)..n {
            sum -= m[[row, k]] * x[k];
        }
        x[row] = sum / m[[row, row]];
    }

    if x.iter().all(|v: &f64| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
