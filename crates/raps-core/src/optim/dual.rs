//! Dual bisection solver for separable resource-share problems.
//!
//! Handles problems of the form
//!
//! ```text
//! min  sum_i f_i(x_i)
//! s.t. g_L[0] <= sum_i x_i <= g_U[0]
//!      g_L[r] <= g_r(x_j(r)) <= g_U[r]      r >= 1
//!      x_L <= x <= x_U
//! ```
//!
//! with convex `f_i` and monotone `g_r`. Row 0 of the Jacobian must be the
//! all-ones budget row and every other row must touch a single variable.
//! The single-variable rows shrink each variable's interval, after which the
//! KKT condition `f_i'(x_i) = lambda` is solved by nested bisection on the
//! budget multiplier. The two iterates bracketing the multiplier are blended
//! so the budget is met exactly, which also covers variables with a constant
//! derivative.

use super::{NlpProblem, NlpSolution, NlpSolver, SolveStatus};
use crate::types::{RapsError, RapsResult};
use tracing::debug;

/// Bisection-based solver for separable problems with one budget row.
#[derive(Debug, Clone)]
pub struct SeparableDualSolver {
    /// Allowed constraint violation, relative to the bound.
    pub tolerance: f64,
    /// Bisection steps on the budget multiplier.
    pub max_bisections: usize,
}

impl Default for SeparableDualSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-7,
            max_bisections: 200,
        }
    }
}

/// Which variable each single-variable constraint row belongs to.
struct Layout {
    rows_of: Vec<Vec<usize>>,
}

impl Layout {
    fn analyse(problem: &dyn NlpProblem, x0: &[f64]) -> RapsResult<Self> {
        let n = problem.num_variables();
        let m = problem.num_constraints();
        if m == 0 {
            return Err(RapsError::NotImplemented(
                "dual solver needs a budget constraint in row 0".into(),
            ));
        }
        let structure = problem.jacobian_structure();
        let values = problem.eval_jac_g(x0);
        if values.len() != structure.len() {
            return Err(RapsError::DimensionMismatch {
                expected: structure.len(),
                actual: values.len(),
            });
        }

        let mut budget_cols = vec![false; n];
        let mut cols_of_row: Vec<Vec<usize>> = vec![Vec::new(); m];
        for (&(row, col), value) in structure.iter().zip(&values) {
            if row >= m || col >= n {
                return Err(RapsError::Consistency(format!(
                    "Jacobian entry ({row}, {col}) outside a {m} x {n} problem"
                )));
            }
            if row == 0 {
                if (value - 1.0).abs() > 1e-12 {
                    return Err(RapsError::NotImplemented(
                        "dual solver needs a unit-coefficient budget row".into(),
                    ));
                }
                budget_cols[col] = true;
            } else {
                cols_of_row[row].push(col);
            }
        }
        if budget_cols.iter().any(|covered| !covered) {
            return Err(RapsError::NotImplemented(
                "budget row must cover every variable".into(),
            ));
        }

        let mut rows_of = vec![Vec::new(); n];
        for (row, cols) in cols_of_row.iter().enumerate().skip(1) {
            match cols.as_slice() {
                [col] => rows_of[*col].push(row),
                _ => {
                    return Err(RapsError::NotImplemented(format!(
                        "constraint row {row} couples {} variables",
                        cols.len()
                    )))
                }
            }
        }
        Ok(Self { rows_of })
    }
}

impl SeparableDualSolver {
    fn within(&self, value: f64, lower: f64, upper: f64) -> bool {
        within(value, lower, upper, self.tolerance)
    }
}

fn within(value: f64, lower: f64, upper: f64, tolerance: f64) -> bool {
    value.is_finite()
        && value >= lower - tolerance * lower.abs().max(1.0)
        && value <= upper + tolerance * upper.abs().max(1.0)
}

/// Shrinks `[lo, hi]` around the switch point of `pred`, which fails at `lo`
/// and holds at `hi`. Returns the final bracket.
fn bisect(mut lo: f64, mut hi: f64, pred: impl Fn(f64) -> bool) -> (f64, f64) {
    for _ in 0..128 {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if pred(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (lo, hi)
}

impl NlpSolver for SeparableDualSolver {
    fn solve(&self, problem: &dyn NlpProblem) -> RapsResult<NlpSolution> {
        let n = problem.num_variables();
        if n == 0 {
            return Err(RapsError::Optimization("problem has no variables".into()));
        }
        let x0 = problem.initial_point();
        let (x_lo, x_hi) = problem.variable_bounds();
        let (g_lo, g_hi) = problem.constraint_bounds();
        for len in [x0.len(), x_lo.len(), x_hi.len()] {
            if len != n {
                return Err(RapsError::DimensionMismatch { expected: n, actual: len });
            }
        }
        for len in [g_lo.len(), g_hi.len()] {
            if len != problem.num_constraints() {
                return Err(RapsError::DimensionMismatch {
                    expected: problem.num_constraints(),
                    actual: len,
                });
            }
        }
        let layout = Layout::analyse(problem, &x0)?;

        let infeasible = |x: Vec<f64>| {
            let objective = problem.eval_f(&x);
            NlpSolution {
                x,
                objective,
                status: SolveStatus::Infeasible,
            }
        };
        let trial = |i: usize, v: f64| {
            let mut x = x0.clone();
            x[i] = v;
            x
        };
        let slope = |i: usize, v: f64| problem.eval_grad_f(&trial(i, v))[i];

        // Feasible interval of every variable under its own rows.
        let mut lower = x_lo.clone();
        let mut upper = x_hi.clone();
        for i in 0..n {
            let rows = &layout.rows_of[i];
            let feasible = |v: f64| {
                let g = problem.eval_g(&trial(i, v));
                rows.iter().all(|&r| within(g[r], g_lo[r], g_hi[r], 0.0))
            };
            match (feasible(lower[i]), feasible(upper[i])) {
                (true, true) => {}
                (false, true) => lower[i] = bisect(lower[i], upper[i], feasible).1,
                (true, false) => upper[i] = bisect(lower[i], upper[i], |v| !feasible(v)).0,
                (false, false) => {
                    debug!(variable = i, "no feasible value for variable");
                    return Ok(infeasible(x0.clone()));
                }
            }
        }

        let budget_lo = g_lo[0];
        let budget_hi = g_hi[0];
        let sum_lower: f64 = lower.iter().sum();
        let sum_upper: f64 = upper.iter().sum();
        if !self.within(budget_lo, f64::NEG_INFINITY, sum_upper) || !self.within(budget_hi, sum_lower, f64::INFINITY) {
            debug!(sum_lower, sum_upper, budget_lo, budget_hi, "budget outside reachable range");
            return Ok(infeasible(x0.clone()));
        }

        let shares_at = |lambda: f64| -> Vec<f64> {
            (0..n)
                .map(|i| {
                    if slope(i, lower[i]) >= lambda {
                        lower[i]
                    } else if slope(i, upper[i]) <= lambda {
                        upper[i]
                    } else {
                        let (a, b) = bisect(lower[i], upper[i], |v| slope(i, v) >= lambda);
                        0.5 * (a + b)
                    }
                })
                .collect()
        };

        let lambda_lo = (0..n).map(|i| slope(i, lower[i])).fold(f64::INFINITY, f64::min);
        let lambda_hi = (0..n).map(|i| slope(i, upper[i])).fold(f64::NEG_INFINITY, f64::max);
        if !lambda_lo.is_finite() || !lambda_hi.is_finite() {
            return Err(RapsError::Optimization(format!(
                "objective slope not finite on the feasible box ({lambda_lo}, {lambda_hi})"
            )));
        }

        // Unconstrained minimizer within the box, if it already meets the budget.
        let free = shares_at(0f64.clamp(lambda_lo, lambda_hi));
        let free_sum: f64 = free.iter().sum();
        let x = if free_sum >= budget_lo && free_sum <= budget_hi {
            free
        } else {
            let target = if free_sum < budget_lo { budget_lo } else { budget_hi };
            let total = |lambda: f64| shares_at(lambda).iter().sum::<f64>();
            let (mut a, mut b) = (lambda_lo, lambda_hi);
            for _ in 0..self.max_bisections {
                let mid = 0.5 * (a + b);
                if mid <= a || mid >= b {
                    break;
                }
                if total(mid) >= target {
                    b = mid;
                } else {
                    a = mid;
                }
            }
            let xa = shares_at(a);
            let xb = shares_at(b);
            let sa: f64 = xa.iter().sum();
            let sb: f64 = xb.iter().sum();
            let theta = if sb > sa { ((target - sa) / (sb - sa)).clamp(0.0, 1.0) } else { 0.0 };
            debug!(multiplier = 0.5 * (a + b), theta, "budget multiplier found");
            xa.iter().zip(&xb).map(|(p, q)| p + theta * (q - p)).collect()
        };

        let g = problem.eval_g(&x);
        let violated = g
            .iter()
            .zip(g_lo.iter().zip(&g_hi))
            .position(|(v, (lo, hi))| !self.within(*v, *lo, *hi));
        let status = match violated {
            None => SolveStatus::Success,
            Some(row) => {
                debug!(row, value = g[row], "constraint violated at solution");
                SolveStatus::ConstraintViolation
            }
        };
        let objective = problem.eval_f(&x);
        Ok(NlpSolution { x, objective, status })
    }
}
