//! Ergodic MIMO capacity with channel distribution knowledge at the
//! transmitter and full channel state at the receiver.
//!
//! With no channel knowledge to steer by, the transmitter spreads its power
//! evenly over `M` spatial dimensions, so each eigenmode of the channel
//! covariance sees `snr / M`:
//!
//! ```text
//! C = sum_i log2(1 + snr / M * lambda_i(S))    [bit/s/Hz]
//! ```

use crate::linalg::ComplexMatrix;
use crate::types::RapsResult;

/// Spectral efficiency of a channel with covariance `covariance` (for example
/// `H * H^H`) at signal-to-noise ratio `snr`.
pub fn ergodic_capacity(covariance: &ComplexMatrix, snr: f64) -> RapsResult<f64> {
    let eig = covariance.hermitian_eigenvalues()?;
    Ok(capacity_from_eigenvalues(&eig, snr, covariance.rows()))
}

/// Same as [`ergodic_capacity`] for eigenvalues that are already known.
pub fn capacity_from_eigenvalues(eigenvalues: &[f64], snr: f64, dimensions: usize) -> f64 {
    if dimensions == 0 {
        return 0.0;
    }
    let per_mode = snr / dimensions as f64;
    eigenvalues
        .iter()
        .map(|&l| (1.0 + per_mode * l.max(0.0)).log2())
        .sum()
}

/// Bits carried in `duration` seconds over `bandwidth` Hz at the given
/// spectral efficiency.
#[inline]
pub fn bits(bandwidth: f64, duration: f64, spectral_efficiency: f64) -> f64 {
    bandwidth * duration * spectral_efficiency
}
