//! # RAPS Core Numerics
//!
//! Numerical building blocks for simulating energy-efficient resource
//! allocation in OFDMA cellular networks. Nothing in this crate knows about
//! base stations or mobiles; the network model lives in `raps-sim`.
//!
//! ## Overview
//!
//! - **Geometry**: hexagonal tilings, point-in-hexagon tests, three-sector
//!   site placement
//! - **Propagation**: distance pathloss, sector antenna pattern, correlated
//!   log-normal shadowing
//! - **Fading**: 23-tap frequency-selective fading evaluated per resource
//!   block on demand
//! - **Capacity**: ergodic MIMO capacity with channel knowledge at the
//!   receiver only
//! - **Bit loading**: inverse water-filling, block quantization and
//!   rate-craving greedy assignment
//! - **Optimization**: minimum-power resource shares on 2x2 MIMO links
//!
//! ## Signal Flow
//!
//! ```text
//! geometry → propagation → fading → SINR (raps-sim)
//!                                     │
//!        optim → quantize → rcg → iwf ┘ power grid for the next frame
//! ```
//!
//! ## Example
//!
//! ```rust
//! use raps_core::capacity::ergodic_capacity;
//! use raps_core::linalg::ComplexMatrix;
//!
//! let h = ComplexMatrix::from_real_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
//! let c = ergodic_capacity(&h.gram(), 2.0).unwrap();
//! assert!((c - 2.0).abs() < 1e-12);
//! ```

pub mod capacity;
pub mod config;
pub mod fading;
pub mod geometry;
pub mod iwf;
pub mod linalg;
pub mod numeric;
pub mod observe;
pub mod optim;
pub mod propagation;
pub mod quantize;
pub mod types;

// Re-export main types
pub use config::{ConfigError, InitialPower, Policy, SimConfig, SleepAlignment};
pub use linalg::ComplexMatrix;
pub use types::{Complex, Position, RapsError, RapsResult, ResourceGrid};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{InitialPower, Policy, SimConfig, SleepAlignment};
    pub use crate::geometry::Hexagon;
    pub use crate::linalg::ComplexMatrix;
    pub use crate::types::{Complex, Position, RapsError, RapsResult, ResourceGrid};
}
