//! 均值-方差二次规划求解器
//!
//! 求解
//!
//! ```text
//! min  wᵀΣw
//! s.t. Σw_i = 1
//!      μᵀw ≥ r
//!      lower ≤ w_i ≤ upper
//! ```
//!
//! 采用原始可行的有效集方法：先构造可行起点，再在工作集上反复求解 KKT 方程组。
//! 无法收敛（回报下限不可行、KKT 奇异、超出迭代上限）时返回错误，由调用方回退。

use crate::linalg::solve_linear_system;
use crate::{PipelineError, Result};
use ndarray::{Array1, Array2};

/// 步长/乘子判定容差
const TOLERANCE: f64 = 1e-12;

/// 线性不等式约束 `normal · w ≥ bound`
#[derive(Debug, Clone)]
struct LinearConstraint {
    normal: Array1<f64>,
    bound: f64,
}

impl LinearConstraint {
    fn slack(&self, weights: &Array1<f64>) -> f64 {
        self.normal.dot(weights) - self.bound
    }
}

/// 最小方差问题
#[derive(Debug, Clone)]
pub struct MinVarianceProblem<'a> {
    pub covariance: &'a Array2<f64>,
    pub expected_returns: &'a Array1<f64>,
    pub target_return: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// 求解结果
#[derive(Debug, Clone)]
pub struct MinVarianceSolution {
    pub weights: Array1<f64>,
    pub variance: f64,
    pub expected_return: f64,
}

impl<'a> MinVarianceProblem<'a> {
    fn dimension(&self) -> usize {
        self.expected_returns.len()
    }

    fn validate(&self) -> Result<()> {
        let n = self.dimension();
        if n == 0 {
            return Err(PipelineError::optimization("Problem has no assets"));
        }
        if self.covariance.dim() != (n, n) {
            return Err(PipelineError::optimization(
                "Covariance matrix does not match expected returns",
            ));
        }
        if self.lower_bound.is_nan()
            || self.upper_bound.is_nan()
            || self.lower_bound > self.upper_bound
            || self.lower_bound * (n as f64) > 1.0
            || self.upper_bound * (n as f64) < 1.0
        {
            return Err(PipelineError::optimization(
                "Weight bounds cannot satisfy the budget constraint",
            ));
        }
        if !self.target_return.is_finite()
            || self.expected_returns.iter().any(|m| !m.is_finite())
            || self.covariance.iter().any(|c| !c.is_finite())
        {
            return Err(PipelineError::optimization("Problem contains non-finite inputs"));
        }
        Ok(())
    }

    /// 不等式约束：回报下限、各权重下界、各权重上界
    fn constraints(&self) -> Vec<LinearConstraint> {
        let n = self.dimension();
        let mut constraints = Vec::with_capacity(2 * n + 1);
        constraints.push(LinearConstraint {
            normal: self.expected_returns.clone(),
            bound: self.target_return,
        });
        for i in 0..n {
            let mut normal = Array1::zeros(n);
            normal[i] = 1.0;
            constraints.push(LinearConstraint {
                normal,
                bound: self.lower_bound,
            });
        }
        for i in 0..n {
            let mut normal = Array1::zeros(n);
            normal[i] = -1.0;
            constraints.push(LinearConstraint {
                normal,
                bound: -self.upper_bound,
            });
        }
        constraints
    }

    /// 预算与边界约束下回报最大的组合（贪心：从下界出发，按预期回报从高到低加仓）
    fn max_return_portfolio(&self) -> Array1<f64> {
        let n = self.dimension();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            self.expected_returns[b]
                .total_cmp(&self.expected_returns[a])
                .then(a.cmp(&b))
        });

        let mut weights = Array1::from_elem(n, self.lower_bound);
        let mut remaining = 1.0 - self.lower_bound * n as f64;
        for i in order {
            let increment = remaining.min(self.upper_bound - self.lower_bound);
            weights[i] += increment;
            remaining -= increment;
            if remaining <= 0.0 {
                break;
            }
        }
        weights
    }

    /// 构造可行起点：初始猜测可行则直接使用，否则向最大回报组合方向插值
    fn feasible_start(&self, initial: &Array1<f64>) -> Result<Array1<f64>> {
        let initial_return = self.expected_returns.dot(initial);
        if initial_return >= self.target_return - TOLERANCE {
            return Ok(initial.clone());
        }

        let best = self.max_return_portfolio();
        let best_return = self.expected_returns.dot(&best);
        if best_return < self.target_return - TOLERANCE {
            return Err(PipelineError::optimization(&format!(
                "Target return {:.6} is unreachable (max {:.6})",
                self.target_return, best_return
            )));
        }

        let t = ((self.target_return - initial_return) / (best_return - initial_return))
            .clamp(0.0, 1.0);
        Ok(initial + &((&best - initial) * t))
    }

    /// 有效集求解
    ///
    /// `initial` 必须满足预算与边界约束。
    pub fn solve(
        &self,
        initial: &Array1<f64>,
        max_iterations: usize,
    ) -> Result<MinVarianceSolution> {
        self.validate()?;
        let n = self.dimension();
        if initial.len() != n {
            return Err(PipelineError::optimization("Initial guess has wrong dimension"));
        }

        let hessian = self.covariance * 2.0;
        let constraints = self.constraints();
        let budget = Array1::from_elem(n, 1.0);

        let mut weights = self.feasible_start(initial)?;
        let mut working: Vec<usize> = Vec::new();

        for iteration in 0..max_iterations {
            let gradient = hessian.dot(&weights);
            let (step, multipliers) =
                self.solve_kkt(&hessian, &gradient, &budget, &constraints, &working)?;

            if step.iter().all(|p| p.abs() <= TOLERANCE) {
                // 第 0 个乘子属于预算等式约束，不要求非负
                let most_negative = multipliers
                    .iter()
                    .skip(1)
                    .enumerate()
                    .min_by(|a, b| a.1.total_cmp(b.1));

                match most_negative {
                    Some((position, lambda)) if *lambda < -TOLERANCE => {
                        working.remove(position);
                    }
                    _ => {
                        let variance = weights.dot(&self.covariance.dot(&weights));
                        let expected_return = self.expected_returns.dot(&weights);
                        tracing::debug!(
                            "MVO converged after {} iterations: variance={:.3e}, return={:.6}",
                            iteration,
                            variance,
                            expected_return
                        );
                        return Ok(MinVarianceSolution {
                            weights,
                            variance,
                            expected_return,
                        });
                    }
                }
                continue;
            }

            // 沿步长方向前进，直到碰到第一个阻挡约束
            let mut alpha = 1.0;
            let mut blocking = None;
            for (index, constraint) in constraints.iter().enumerate() {
                if working.contains(&index) {
                    continue;
                }
                let directional = constraint.normal.dot(&step);
                if directional < -TOLERANCE {
                    let ratio = (-constraint.slack(&weights) / directional).max(0.0);
                    if ratio < alpha {
                        alpha = ratio;
                        blocking = Some(index);
                    }
                }
            }

            weights = &weights + &(&step * alpha);
            if let Some(index) = blocking {
                working.push(index);
            }
        }

        Err(PipelineError::optimization(&format!(
            "Active-set solver did not converge within {} iterations",
            max_iterations
        )))
    }

    /// 求解工作集上的等式约束子问题
    ///
    /// ```text
    /// [ G  -Aᵀ ] [ p ]   [ -g ]
    /// [ A   0  ] [ λ ] = [  0 ]
    /// ```
    fn solve_kkt(
        &self,
        hessian: &Array2<f64>,
        gradient: &Array1<f64>,
        budget: &Array1<f64>,
        constraints: &[LinearConstraint],
        working: &[usize],
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let n = self.dimension();
        let rows: Vec<&Array1<f64>> = std::iter::once(budget)
            .chain(working.iter().map(|&i| &constraints[i].normal))
            .collect();
        let m = rows.len();

        let mut kkt = Array2::zeros((n + m, n + m));
        let mut rhs = Array1::zeros(n + m);
        for i in 0..n {
            for j in 0..n {
                kkt[[i, j]] = hessian[[i, j]];
            }
            rhs[i] = -gradient[i];
        }
        for (r, normal) in rows.iter().enumerate() {
            for j in 0..n {
                kkt[[j, n + r]] = -normal[j];
                kkt[[n + r, j]] = normal[j];
            }
        }

        let solution = solve_linear_system(&kkt, &rhs)
            .ok_or_else(|| PipelineError::optimization("KKT system is singular"))?;
        let step = solution.slice(ndarray::s![..n]).to_owned();
        let multipliers = solution.slice(ndarray::s![n..]).to_owned();
        Ok((step, multipliers))
    }
}
