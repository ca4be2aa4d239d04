//! # Minimum-Power Resource Shares (2x2 MIMO)
//!
//! Each user `k` receives a share `mu_k` of the frame and must carry
//! `rate` bit/s within it. On a 2x2 channel with unit-power SINR covariance
//! `S_k` the transmit power needed for that is
//!
//! ```text
//! c     = rate / (B mu)
//! Ptx   = n M / b (-a + sqrt(a^2 + 2 b (2^c - 1)))
//! a     = tr(S),  b = 2 det(S),  M = 2
//! ```
//!
//! evaluated here in the rationalised form `n M 2X / (a + sqrt(a^2 + 2bX))`
//! with `X = 2^c - 1`, which stays finite for rank-deficient channels.
//!
//! The base station draws `p0 + m Ptx` while serving a user, so the frame
//! costs `sum_k mu_k (p0 + m Ptx_k(mu_k))`, plus `mu_S pS` for a sleep share
//! when discontinuous transmission is allowed. Shares sum to one and no user
//! may exceed `pMax`.

use super::{NlpProblem, NlpSolver, SeparableDualSolver, SolveStatus};
use crate::linalg::ComplexMatrix;
use crate::types::{RapsError, RapsResult};
use std::f64::consts::LN_2;
use tracing::debug;

/// Largest accepted sum of returned shares.
pub const SHARE_SUM_LIMIT: f64 = 1.0001;

/// Rate target and base-station power model shared by all users.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerControlParams {
    /// Target rate per user, bit/s.
    pub rate: f64,
    /// Link bandwidth, Hz.
    pub bandwidth: f64,
    /// Transmit power limit, W.
    pub p_max: f64,
    /// Supply power at zero load, W.
    pub p0: f64,
    /// Load factor.
    pub m: f64,
}

/// Trace and scaled determinant of a 2x2 SINR covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSummary {
    /// `lambda_1 + lambda_2`.
    pub a: f64,
    /// `2 lambda_1 lambda_2`.
    pub b: f64,
    /// Covariance dimension.
    pub dims: usize,
}

impl ChannelSummary {
    /// Transmit power that carries `rate` over share `mu`.
    pub fn ptx(&self, mu: f64, rate: f64, bandwidth: f64, noise: f64) -> f64 {
        if mu <= 0.0 {
            return f64::INFINITY;
        }
        let x = (rate / (bandwidth * mu)).exp2() - 1.0;
        if !x.is_finite() {
            return f64::INFINITY;
        }
        noise * self.dims as f64 * 2.0 * x / (self.a + (self.a * self.a + 2.0 * self.b * x).sqrt())
    }

    /// Derivative of [`ChannelSummary::ptx`] with respect to `mu`.
    pub fn ptx_slope(&self, mu: f64, rate: f64, bandwidth: f64, noise: f64) -> f64 {
        if mu <= 0.0 {
            return f64::NEG_INFINITY;
        }
        let growth = (rate / (bandwidth * mu)).exp2();
        let root = (self.a * self.a + 2.0 * self.b * (growth - 1.0)).sqrt();
        -(self.dims as f64) * noise * (rate / bandwidth) * LN_2 * growth / (mu * mu * root)
    }
}

/// Trace and determinant of a 2x2 covariance; other sizes are unsupported.
pub fn dissect(covariance: &ComplexMatrix) -> RapsResult<ChannelSummary> {
    if covariance.rows() != 2 || covariance.cols() != 2 {
        return Err(RapsError::NotImplemented(format!(
            "power control supports 2x2 MIMO only, got {}x{}",
            covariance.rows(),
            covariance.cols()
        )));
    }
    let det = covariance.get(0, 0) * covariance.get(1, 1) - covariance.get(0, 1) * covariance.get(1, 0);
    Ok(ChannelSummary {
        a: covariance.trace(),
        b: 2.0 * det.re,
        dims: 2,
    })
}

/// Transmit power needed for `rate` over share `mu` on one channel.
pub fn ptx_of_mu(mu: f64, rate: f64, bandwidth: f64, noise: f64, covariance: &ComplexMatrix) -> RapsResult<f64> {
    Ok(dissect(covariance)?.ptx(mu, rate, bandwidth, noise))
}

/// The resource-share problem, with or without a sleep share.
#[derive(Debug, Clone)]
pub struct MinPowerProblem {
    channels: Vec<ChannelSummary>,
    noise: Vec<f64>,
    params: PowerControlParams,
    sleep_power: Option<f64>,
}

impl MinPowerProblem {
    pub fn new(covariances: &[ComplexMatrix], noise: &[f64], params: PowerControlParams) -> RapsResult<Self> {
        if covariances.is_empty() {
            return Err(RapsError::Optimization("power control without users".into()));
        }
        if noise.len() != covariances.len() {
            return Err(RapsError::DimensionMismatch {
                expected: covariances.len(),
                actual: noise.len(),
            });
        }
        let channels = covariances.iter().map(dissect).collect::<RapsResult<Vec<_>>>()?;
        Ok(Self {
            channels,
            noise: noise.to_vec(),
            params,
            sleep_power: None,
        })
    }

    /// Adds a trailing sleep share that costs `sleep_power`.
    pub fn with_sleep(mut self, sleep_power: f64) -> Self {
        self.sleep_power = Some(sleep_power);
        self
    }

    pub fn users(&self) -> usize {
        self.channels.len()
    }

    /// Transmit power of user `k` at share `mu`.
    pub fn user_ptx(&self, k: usize, mu: f64) -> f64 {
        self.channels[k].ptx(mu, self.params.rate, self.params.bandwidth, self.noise[k])
    }

    fn user_ptx_slope(&self, k: usize, mu: f64) -> f64 {
        self.channels[k].ptx_slope(mu, self.params.rate, self.params.bandwidth, self.noise[k])
    }
}

impl NlpProblem for MinPowerProblem {
    fn num_variables(&self) -> usize {
        self.users() + usize::from(self.sleep_power.is_some())
    }

    fn num_constraints(&self) -> usize {
        self.users() + 1
    }

    fn variable_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.num_variables();
        (vec![0.0; n], vec![1.0; n])
    }

    fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lower = vec![0.0; self.num_constraints()];
        let mut upper = vec![self.params.p_max; self.num_constraints()];
        lower[0] = 1.0;
        upper[0] = 1.0;
        (lower, upper)
    }

    fn initial_point(&self) -> Vec<f64> {
        let n = self.num_variables();
        vec![1.0 / (n + 1) as f64; n]
    }

    fn eval_f(&self, x: &[f64]) -> f64 {
        let PowerControlParams { p0, m, .. } = self.params;
        let active: f64 = (0..self.users()).map(|k| x[k] * (p0 + m * self.user_ptx(k, x[k]))).sum();
        match self.sleep_power {
            Some(ps) => active + x[self.users()] * ps,
            None => active,
        }
    }

    fn eval_grad_f(&self, x: &[f64]) -> Vec<f64> {
        let PowerControlParams { p0, m, .. } = self.params;
        let mut grad: Vec<f64> = (0..self.users())
            .map(|k| p0 + m * (self.user_ptx(k, x[k]) + x[k] * self.user_ptx_slope(k, x[k])))
            .collect();
        if let Some(ps) = self.sleep_power {
            grad.push(ps);
        }
        grad
    }

    fn eval_g(&self, x: &[f64]) -> Vec<f64> {
        let mut g = Vec::with_capacity(self.num_constraints());
        g.push(x.iter().sum());
        g.extend((0..self.users()).map(|k| self.user_ptx(k, x[k])));
        g
    }

    fn jacobian_structure(&self) -> Vec<(usize, usize)> {
        let budget = (0..self.num_variables()).map(|c| (0, c));
        let power = (0..self.users()).map(|k| (k + 1, k));
        budget.chain(power).collect()
    }

    fn eval_jac_g(&self, x: &[f64]) -> Vec<f64> {
        let mut values = vec![1.0; self.num_variables()];
        values.extend((0..self.users()).map(|k| self.user_ptx_slope(k, x[k])));
        values
    }
}

/// Optimal shares and the supply power they cost.
#[derive(Debug, Clone, PartialEq)]
pub struct PcSolution {
    pub objective: f64,
    /// One share per user, followed by the sleep share for DTX problems.
    pub shares: Vec<f64>,
    pub status: SolveStatus,
}

/// Power control without sleep: shares sum to exactly one.
pub fn optimize_pc(covariances: &[ComplexMatrix], noise: &[f64], params: PowerControlParams) -> RapsResult<PcSolution> {
    let problem = MinPowerProblem::new(covariances, noise, params)?;
    solve_checked(&SeparableDualSolver::default(), &problem)
}

/// Power control with a sleep share drawing `sleep_power`.
pub fn optimize_pc_dtx(
    covariances: &[ComplexMatrix],
    noise: &[f64],
    params: PowerControlParams,
    sleep_power: f64,
) -> RapsResult<PcSolution> {
    let problem = MinPowerProblem::new(covariances, noise, params)?.with_sleep(sleep_power);
    solve_checked(&SeparableDualSolver::default(), &problem)
}

/// Runs `solver` and rejects any result that is not a valid share vector.
pub fn solve_checked(solver: &dyn NlpSolver, problem: &MinPowerProblem) -> RapsResult<PcSolution> {
    let solution = solver.solve(problem)?;
    let sum: f64 = solution.x.iter().sum();
    if !solution.status.is_success() || sum > SHARE_SUM_LIMIT {
        return Err(RapsError::Optimization(format!(
            "invalid solution for {} users: status {:?}, share sum {sum}",
            problem.users(),
            solution.status
        )));
    }
    debug!(users = problem.users(), objective = solution.objective, "power control solved");
    Ok(PcSolution {
        objective: solution.objective,
        shares: solution.x,
        status: solution.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::ergodic_capacity;
    use crate::fading::rayleigh_channel;
    use crate::types::Complex;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn c(re: f64, im: f64) -> Complex {
        Complex::new(re, im)
    }

    fn channels() -> Vec<ComplexMatrix> {
        vec![
            ComplexMatrix::from_rows(&[vec![c(1.0, -1.0), c(-1.0, 0.0)], vec![c(-1.0, 0.0), c(1.0, 0.0)]]).gram(),
            ComplexMatrix::from_rows(&[vec![c(1.0, -1.0), c(1.0, 0.0)], vec![c(-1.0, 0.0), c(1.0, 0.0)]]).gram(),
            ComplexMatrix::from_rows(&[vec![c(0.5, 0.0), c(0.0, 1.0)], vec![c(1.0, 0.0), c(0.0, -1.0)]]).gram(),
        ]
    }

    fn trivial() -> Vec<ComplexMatrix> {
        vec![ComplexMatrix::from_real_rows(&[vec![1.0, 1.0], vec![1.0, 1.0]]).gram(); 3]
    }

    fn strong() -> Vec<ComplexMatrix> {
        vec![ComplexMatrix::from_rows(&[
            vec![c(35.29, -5.14e-15), c(-29.73, 6.64e-2)],
            vec![c(-29.73, -6.64e-2), c(34.80, -5.11e-16)],
        ])
        .gram()]
    }

    fn unit_params(p0: f64, m: f64) -> PowerControlParams {
        PowerControlParams {
            rate: 1.0,
            bandwidth: 1.0,
            p_max: 10.0,
            p0,
            m,
        }
    }

    #[test]
    fn test_dissect() {
        let s = dissect(&channels()[0]).unwrap();
        assert_relative_eq!(s.a, 5.0, epsilon = 1e-12);
        assert_relative_eq!(s.b, 2.0, epsilon = 1e-12);
        assert_eq!(s.dims, 2);

        let s = dissect(&trivial()[0]).unwrap();
        assert_relative_eq!(s.a, 4.0, epsilon = 1e-12);
        assert_relative_eq!(s.b, 0.0, epsilon = 1e-12);

        let s = dissect(&strong()[0]).unwrap();
        assert_relative_eq!(s.a, 4224.17871792, max_relative = 1e-9);
        assert_relative_eq!(s.b, 236967.507055527, max_relative = 1e-6);
    }

    #[test]
    fn test_unsupported_antenna_configuration() {
        let three = ComplexMatrix::eye(3, 3);
        assert!(matches!(dissect(&three), Err(RapsError::NotImplemented(_))));
        let err = optimize_pc(&[three], &[1.0], unit_params(0.0, 1.0)).unwrap_err();
        assert!(matches!(err, RapsError::NotImplemented(_)));
    }

    #[test]
    fn test_ptx_of_mu() {
        let expected = [59.16385275215322, 27.625163754990123, 41.225838967079234];
        for (h, e) in channels().iter().zip(expected) {
            assert_relative_eq!(ptx_of_mu(0.1, 1.0, 1.0, 1.0, h).unwrap(), e, max_relative = 1e-10);
        }
        assert_relative_eq!(ptx_of_mu(0.1, 1.0, 1.0, 1.0, &trivial()[0]).unwrap(), 511.5, max_relative = 1e-12);
        assert_relative_eq!(
            ptx_of_mu(0.1, 1.0, 1.0, 1.0, &strong()[0]).unwrap(),
            0.15357658182477,
            max_relative = 1e-8
        );
    }

    #[test]
    fn test_ptx_delivers_rate() {
        let h = &channels()[1];
        let ptx = ptx_of_mu(0.25, 1.0, 1.0, 1.0, h).unwrap();
        assert_relative_eq!(ergodic_capacity(h, ptx).unwrap(), 4.0, max_relative = 1e-10);
    }

    #[test]
    fn test_objective() {
        let x = [0.1; 4];
        let p = MinPowerProblem::new(&channels(), &[1.0; 3], unit_params(10.0, 2.0)).unwrap().with_sleep(5.0);
        assert_relative_eq!(p.eval_f(&x), 29.10297109484452, max_relative = 1e-10);

        let p = MinPowerProblem::new(&trivial(), &[1.0; 3], unit_params(10.0, 2.0)).unwrap().with_sleep(5.0);
        assert_relative_eq!(p.eval_f(&x), 310.4, max_relative = 1e-10);

        let p = MinPowerProblem::new(&strong(), &[1.0], unit_params(10.0, 2.0)).unwrap().with_sleep(5.0);
        assert_relative_eq!(p.eval_f(&x[..2]), 1.5307153163649543, max_relative = 1e-8);

        let p = MinPowerProblem::new(&channels(), &[1.0; 3], unit_params(0.0, 1.0)).unwrap();
        assert_relative_eq!(p.eval_f(&x[..3]), 12.8015, max_relative = 1e-5);
    }

    #[test]
    fn test_gradient() {
        let x = [0.1; 4];
        let p = MinPowerProblem::new(&channels(), &[1.0; 3], unit_params(10.0, 2.0)).unwrap().with_sleep(5.0);
        let grad = p.eval_grad_f(&x);
        let expected = [-314.15364961947233, -133.11575876811833, -203.26605186463325, 5.0];
        for (g, e) in grad.iter().zip(expected) {
            assert_relative_eq!(*g, e, max_relative = 1e-10);
        }

        let p = MinPowerProblem::new(&strong(), &[1.0], unit_params(10.0, 2.0)).unwrap().with_sleep(5.0);
        let grad = p.eval_grad_f(&x[..2]);
        assert_relative_eq!(grad[0], 9.04084341843472, max_relative = 1e-8);
        assert_relative_eq!(grad[1], 5.0);
    }

    #[test]
    fn test_constraints_and_jacobian() {
        let x = [0.1; 4];
        let p = MinPowerProblem::new(&channels(), &[1.0; 3], unit_params(10.0, 2.0)).unwrap().with_sleep(5.0);
        let g = p.eval_g(&x);
        let expected = [0.4, 59.16385275215322, 27.625163754990123, 41.225838967079234];
        for (v, e) in g.iter().zip(expected) {
            assert_relative_eq!(*v, e, max_relative = 1e-10);
        }

        assert_eq!(
            p.jacobian_structure(),
            vec![(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (2, 1), (3, 2)]
        );
        let jac = p.eval_jac_g(&x);
        let expected = [1.0, 1.0, 1.0, 1.0, -2212.406775618894, -991.8304313904929, -1478.5886489939585];
        for (v, e) in jac.iter().zip(expected) {
            assert_relative_eq!(*v, e, max_relative = 1e-10);
        }

        let p = MinPowerProblem::new(&trivial(), &[1.0; 3], unit_params(10.0, 2.0)).unwrap();
        assert_relative_eq!(p.eval_jac_g(&x[..3])[3], -35489.1356, max_relative = 1e-8);
    }

    #[test]
    fn test_optimize_pc() {
        let sol = optimize_pc(&channels(), &[1.0; 3], unit_params(0.0, 1.0)).unwrap();
        assert_relative_eq!(sol.objective, 2.0422355422276, epsilon = 1e-6);
        let expected = [0.3823792, 0.28708598, 0.33053482];
        for (s, e) in sol.shares.iter().zip(expected) {
            assert_relative_eq!(*s, e, epsilon = 1e-6);
        }
        assert_relative_eq!(sol.shares.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_optimize_pc_dtx() {
        let sol = optimize_pc_dtx(&channels(), &[1.0; 3], unit_params(10.0, 2.0), 5.0).unwrap();
        assert_relative_eq!(sol.objective, 13.9204261, epsilon = 1e-6);
        let expected = [0.32342002, 0.24371824, 0.27855287, 0.15430887];
        for (s, e) in sol.shares.iter().zip(expected) {
            assert_relative_eq!(*s, e, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_optimize_pc_dtx_trivial() {
        let sol = optimize_pc_dtx(&trivial(), &[1.0; 3], unit_params(10.0, 2.0), 5.0).unwrap();
        assert_relative_eq!(sol.objective, 17.0, epsilon = 1e-6);
        for s in &sol.shares[..3] {
            assert_relative_eq!(*s, 1.0 / 3.0, epsilon = 1e-7);
        }
        assert!(sol.shares[3].abs() < 1e-7);
    }

    #[test]
    fn test_random_channels_meet_rate() {
        let mut rng = StdRng::seed_from_u64(2012);
        let users = 22;
        let covariances: Vec<ComplexMatrix> = (0..users)
            .map(|_| rayleigh_channel(2, 2, &mut rng).scale(1e-6).gram())
            .collect();
        let noise = vec![4e-14; users];
        let params = PowerControlParams {
            rate: 1.2e7 / users as f64,
            bandwidth: 1e7,
            p_max: 40.0,
            p0: 100.0,
            m: 2.4,
        };
        let sol = optimize_pc_dtx(&covariances, &noise, params, 50.0).unwrap();
        for k in 0..users {
            let ptx = ptx_of_mu(sol.shares[k], params.rate, params.bandwidth, noise[k], &covariances[k]).unwrap();
            assert!(ptx <= params.p_max * (1.0 + 1e-9));
            let delivered = sol.shares[k] * ergodic_capacity(&covariances[k], ptx / noise[k]).unwrap() * params.bandwidth;
            assert_relative_eq!(delivered, params.rate, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_infeasible_power_limit() {
        let params = PowerControlParams {
            rate: 50.0,
            ..unit_params(0.0, 1.0)
        };
        let err = optimize_pc(&channels(), &[1.0; 3], params).unwrap_err();
        assert!(matches!(err, RapsError::Optimization(_)));
    }
}
