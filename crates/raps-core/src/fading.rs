//! # Frequency-Selective Fading
//!
//! Tapped-delay-line channel with a fixed 23-tap power delay profile and a
//! sum-of-sinusoids Doppler model (5 harmonics per tap). Produces one complex
//! gain per (frequency chunk, timeslot).
//!
//! A [`FadingRealization`] holds only the random Doppler angles and phases of
//! one link. The response of any window of timeslots is evaluated on demand
//! by a shared [`FadingProfile`], so a link that spans many iterations never
//! needs its full multi-iteration tensor in memory.
//!
//! ```text
//! H[f, t] = sum_k g_k * (1/5) sum_h exp(j (nu_kh t + phi_kh) - j 2 pi f tau_k)
//! nu_kh   = f_D cos(2 pi u_kh),  phi_kh = 2 pi v_kh,  u, v ~ U[0, 1)
//! ```
//!
//! Each timeslot is normalised so that the magnitudes across chunks sum to the
//! number of chunks.

use crate::linalg::ComplexMatrix;
use crate::numeric::{db_to_linear, linspace};
use crate::types::{Complex, RapsError, RapsResult, ResourceGrid};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::Range;

/// Tap delays in seconds.
pub const TAP_DELAYS_S: [f64; 23] = [
    0.0, 0.0060e-5, 0.0075e-5, 0.0145e-5, 0.0150e-5, 0.0155e-5, 0.0190e-5, 0.0220e-5, 0.0225e-5,
    0.0230e-5, 0.0335e-5, 0.0370e-5, 0.0430e-5, 0.0510e-5, 0.0685e-5, 0.0725e-5, 0.0735e-5,
    0.0800e-5, 0.0960e-5, 0.1020e-5, 0.1100e-5, 0.1210e-5, 0.1845e-5,
];

/// Tap powers in dB, before normalisation.
pub const TAP_POWERS_DB: [f64; 23] = [
    -6.4, -3.4, -2.0, -3.0, -3.55, -7.0, -3.4, -3.4, -5.6, -7.4, -4.6, -7.8, -7.8, -9.3, -12.0,
    -8.5, -13.2, -11.2, -20.8, -14.5, -11.7, -17.2, -16.7,
];

/// Doppler harmonics per tap.
pub const HARMONICS: usize = 5;

/// Propagation speed used for the Doppler shift, m/s.
pub const SPEED_OF_LIGHT: f64 = 3e8;

const TAPS: usize = TAP_DELAYS_S.len();

/// Random state of one fading link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FadingRealization {
    /// Uniform draws setting each harmonic's angle of arrival, `[tap][harmonic]`.
    angles: Vec<f64>,
    /// Uniform draws setting each harmonic's phase, `[tap][harmonic]`.
    phases: Vec<f64>,
}

impl FadingRealization {
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let angles = (0..TAPS * HARMONICS).map(|_| rng.gen::<f64>()).collect();
        let phases = (0..TAPS * HARMONICS).map(|_| rng.gen::<f64>()).collect();
        Self { angles, phases }
    }
}

/// Frame layout and per-chunk tap steering shared by all links of a world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FadingProfile {
    chunks: usize,
    doppler_hz: f64,
    tap_gains: Vec<f64>,
    /// `exp(-j 2 pi f_n tau_k)`, `[chunk][tap]`.
    steering: Vec<Complex>,
    /// Start time of every timeslot across all iterations.
    timestamps: Vec<f64>,
}

impl FadingProfile {
    /// Profile for `chunks` frequency chunks and `total_slots` timeslots
    /// spanning `total_time` seconds.
    pub fn new(
        chunks: usize,
        total_slots: usize,
        center_frequency: f64,
        total_time: f64,
        bandwidth: f64,
        velocity: f64,
    ) -> RapsResult<Self> {
        if chunks == 0 || total_slots == 0 {
            return Err(RapsError::Config(format!(
                "fading needs at least one chunk and one timeslot, got {chunks} x {total_slots}"
            )));
        }
        let chunk_width = bandwidth / chunks as f64;
        let centers = linspace(
            center_frequency - bandwidth / 2.0,
            center_frequency + bandwidth / 2.0 - chunk_width,
            chunks,
        );
        let timestamps = linspace(0.0, total_time * (1.0 - 1.0 / total_slots as f64), total_slots);

        let linear: Vec<f64> = TAP_POWERS_DB.iter().map(|&db| db_to_linear(db)).collect();
        let total: f64 = linear.iter().sum();
        let tap_gains = linear.iter().map(|g| g / total).collect();

        let mut steering = Vec::with_capacity(chunks * TAPS);
        for f in &centers {
            for tau in TAP_DELAYS_S {
                steering.push(Complex::from_polar(1.0, -2.0 * PI * f * tau));
            }
        }

        Ok(Self {
            chunks,
            doppler_hz: velocity * center_frequency / SPEED_OF_LIGHT,
            tap_gains,
            steering,
            timestamps,
        })
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn total_slots(&self) -> usize {
        self.timestamps.len()
    }

    /// Normalised channel response over the timeslot window `slots`,
    /// as a `[chunks, slots.len()]` grid.
    pub fn response(&self, realization: &FadingRealization, slots: Range<usize>) -> RapsResult<ResourceGrid<Complex>> {
        if slots.is_empty() || slots.end > self.timestamps.len() {
            return Err(RapsError::Config(format!(
                "fading window {slots:?} outside the {} generated timeslots",
                self.timestamps.len()
            )));
        }
        let width = slots.len();
        let mut grid = ResourceGrid::filled(self.chunks, width, Complex::new(0.0, 0.0));
        let mut tap_terms = [Complex::new(0.0, 0.0); TAPS];

        for (col, slot) in slots.enumerate() {
            let t = self.timestamps[slot];
            for (k, term) in tap_terms.iter_mut().enumerate() {
                let mut acc = Complex::new(0.0, 0.0);
                for h in 0..HARMONICS {
                    let i = k * HARMONICS + h;
                    let freq = self.doppler_hz * (2.0 * PI * realization.angles[i]).cos();
                    let phase = 2.0 * PI * realization.phases[i];
                    acc += Complex::from_polar(1.0, freq * t + phase);
                }
                *term = acc * self.tap_gains[k];
            }

            let mut magnitude = 0.0;
            for n in 0..self.chunks {
                let steer = &self.steering[n * TAPS..(n + 1) * TAPS];
                let h: Complex = tap_terms
                    .iter()
                    .zip(steer)
                    .map(|(a, s)| a * s)
                    .sum::<Complex>()
                    / HARMONICS as f64;
                magnitude += h.norm();
                grid.set(n, col, h);
            }
            if magnitude > 0.0 {
                let scale = self.chunks as f64 / magnitude;
                for n in 0..self.chunks {
                    let v = *grid.get(n, col) * scale;
                    grid.set(n, col, v);
                }
            }
        }
        Ok(grid)
    }
}

/// One-shot fading response: draws a fresh realization and evaluates all
/// `slots` timeslots.
pub fn frequency_selective_fading<R: Rng + ?Sized>(
    chunks: usize,
    slots: usize,
    center_frequency: f64,
    total_time: f64,
    bandwidth: f64,
    velocity: f64,
    rng: &mut R,
) -> RapsResult<ResourceGrid<Complex>> {
    let profile = FadingProfile::new(chunks, slots, center_frequency, total_time, bandwidth, velocity)?;
    let realization = FadingRealization::draw(rng);
    profile.response(&realization, 0..slots)
}

/// Flat Rayleigh MIMO channel with unit average power per entry.
pub fn rayleigh_channel<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> ComplexMatrix {
    let mut h = ComplexMatrix::zeros(rows, cols);
    for r in 0..rows {
        for c in 0..cols {
            let re: f64 = rng.sample(StandardNormal);
            let im: f64 = rng.sample(StandardNormal);
            h.set(r, c, Complex::new(re, im) / 2f64.sqrt());
        }
    }
    h
}
