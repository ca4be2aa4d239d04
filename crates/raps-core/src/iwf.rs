//! # Inverse Water-Filling
//!
//! Margin-adaptive bit loading: find the per-channel power levels that carry
//! a target number of bits over a set of parallel channels with the least
//! total power.
//!
//! Channels are sorted by quality and activated one by one. With `k` active
//! channels the water level is
//!
//! ```text
//! log2(w) = L / (B T k) - (1/k) sum_{i<k} log2(g_i T B / (N_i ln 2))
//! ```
//!
//! and the next channel joins only while `log2(w)` exceeds
//! `log2(N_k ln 2 / (g_k B T))`. Active channels receive
//! `p_i = w B T / ln 2 - N_i / g_i`, all others zero.
//!
//! For rate rather than bit targets, set `duration` to one.
//!
//! # Example
//!
//! ```rust
//! use raps_core::iwf::inverse_waterfill_uniform;
//!
//! let gains = [0.2296, 0.0255, 0.1810, 0.1117].map(|g| g * 1e-4);
//! let sol = inverse_waterfill_uniform(&gains, 1.2, 6e-10, 6.0, 0.05).unwrap();
//! assert!((sol.capacity - 1.2).abs() < 1e-9);
//! ```

use crate::numeric::argsort_descending;
use crate::types::{RapsError, RapsResult};
use std::f64::consts::LN_2;

/// Result of an inverse water-filling run.
#[derive(Debug, Clone, PartialEq)]
pub struct IwfSolution {
    /// Power per input channel, in input order.
    pub powers: Vec<f64>,
    /// Final water level.
    pub waterlevel: f64,
    /// Bits carried by `powers`; equals the target up to rounding.
    pub capacity: f64,
    /// Number of channels that received power.
    pub active: usize,
}

impl IwfSolution {
    pub fn total_power(&self) -> f64 {
        self.powers.iter().sum()
    }
}

/// Inverse water-filling with one noise-plus-interference power per channel.
pub fn inverse_waterfill(
    gains: &[f64],
    target_bits: f64,
    noise: &[f64],
    bandwidth: f64,
    duration: f64,
) -> RapsResult<IwfSolution> {
    let channels = gains.len();
    if noise.len() != channels {
        return Err(RapsError::DimensionMismatch {
            expected: channels,
            actual: noise.len(),
        });
    }
    if channels == 0 {
        return Err(RapsError::Overload(
            "inverse water-filling called without channels".into(),
        ));
    }

    let order = argsort_descending(gains);
    let sorted_gains: Vec<f64> = order.iter().map(|&i| gains[i]).collect();
    let sorted_noise: Vec<f64> = order.iter().map(|&i| noise[i]).collect();

    let mut k = 1;
    let mut exponent = waterlevel_exponent(target_bits, bandwidth, duration, &sorted_gains[..k], &sorted_noise[..k]);
    while k < channels && exponent > threshold_exponent(sorted_noise[k], duration, bandwidth, sorted_gains[k]) {
        k += 1;
        exponent = waterlevel_exponent(target_bits, bandwidth, duration, &sorted_gains[..k], &sorted_noise[..k]);
    }

    let waterlevel = 2f64.powf(exponent);
    if !waterlevel.is_finite() {
        return Err(RapsError::Overload(format!(
            "no usable channel for {target_bits} bits (water level {waterlevel})"
        )));
    }

    let mut powers = vec![0.0; channels];
    for i in 0..k {
        powers[order[i]] = waterlevel * bandwidth * duration / LN_2 - sorted_noise[i] / sorted_gains[i];
    }
    let capacity = capacity_with_allocation(bandwidth, duration, &powers, gains, noise);

    Ok(IwfSolution {
        powers,
        waterlevel,
        capacity,
        active: k,
    })
}

/// Inverse water-filling with the same noise power on every channel.
pub fn inverse_waterfill_uniform(
    gains: &[f64],
    target_bits: f64,
    noise: f64,
    bandwidth: f64,
    duration: f64,
) -> RapsResult<IwfSolution> {
    inverse_waterfill(gains, target_bits, &vec![noise; gains.len()], bandwidth, duration)
}

/// Bits carried over parallel channels with the given power levels.
pub fn capacity_with_allocation(bandwidth: f64, duration: f64, powers: &[f64], gains: &[f64], noise: &[f64]) -> f64 {
    bandwidth
        * duration
        * powers
            .iter()
            .zip(gains)
            .zip(noise)
            .map(|((p, g), n)| (1.0 + p * g / n).log2())
            .sum::<f64>()
}

fn waterlevel_exponent(target_bits: f64, bandwidth: f64, duration: f64, gains: &[f64], noise: &[f64]) -> f64 {
    let k = gains.len() as f64;
    let log_sum: f64 = gains
        .iter()
        .zip(noise)
        .map(|(g, n)| (g * duration * bandwidth / (n * LN_2)).log2())
        .sum();
    target_bits / (bandwidth * duration * k) - log_sum / k
}

fn threshold_exponent(noise: f64, duration: f64, bandwidth: f64, gain: f64) -> f64 {
    (noise * LN_2 / (gain * bandwidth * duration)).log2()
}
