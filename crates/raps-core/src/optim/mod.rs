//! # Constrained Nonlinear Optimization
//!
//! The power-control problem is stated through [`NlpProblem`], a set of
//! callbacks with analytic derivatives in the usual interior-point layout:
//! variable bounds, constraint bounds `g_L <= g(x) <= g_U`, objective,
//! gradient, constraints and a sparse Jacobian given as `(row, column)`
//! pairs plus values in the same order.
//!
//! Any [`NlpSolver`] can consume such a problem. [`SeparableDualSolver`]
//! solves the resource-share problems of [`min_power`] exactly.

pub mod dual;
pub mod min_power;

pub use dual::SeparableDualSolver;
pub use min_power::{
    dissect, optimize_pc, optimize_pc_dtx, ptx_of_mu, ChannelSummary, MinPowerProblem,
    PcSolution, PowerControlParams,
};

use crate::types::RapsResult;
use serde::{Deserialize, Serialize};

/// Callbacks describing a smooth constrained minimization problem.
pub trait NlpProblem {
    fn num_variables(&self) -> usize;

    fn num_constraints(&self) -> usize;

    /// Lower and upper bound of every variable.
    fn variable_bounds(&self) -> (Vec<f64>, Vec<f64>);

    /// Lower and upper bound of every constraint row.
    fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>);

    fn initial_point(&self) -> Vec<f64>;

    fn eval_f(&self, x: &[f64]) -> f64;

    fn eval_grad_f(&self, x: &[f64]) -> Vec<f64>;

    fn eval_g(&self, x: &[f64]) -> Vec<f64>;

    /// Nonzero pattern of the constraint Jacobian as `(row, column)` pairs.
    fn jacobian_structure(&self) -> Vec<(usize, usize)>;

    /// Jacobian values in the order of [`NlpProblem::jacobian_structure`].
    fn eval_jac_g(&self, x: &[f64]) -> Vec<f64>;
}

/// Outcome reported by a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Success,
    /// No point satisfies the bounds.
    Infeasible,
    /// The returned point violates a constraint beyond tolerance.
    ConstraintViolation,
}

impl SolveStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Success)
    }
}

/// Solution vector, objective value and status of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct NlpSolution {
    pub x: Vec<f64>,
    pub objective: f64,
    pub status: SolveStatus,
}

/// A constrained NLP solver.
///
/// Returns `Err` only when the problem cannot be handled at all; an
/// unsolvable but well-formed problem yields a non-success status.
pub trait NlpSolver {
    fn solve(&self, problem: &dyn NlpProblem) -> RapsResult<NlpSolution>;
}
