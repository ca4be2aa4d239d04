//! # Scheduling Policies
//!
//! A policy takes one cell, decides which mobile gets each resource block
//! and at what power, writes that into the cell for the next SINR round and
//! reports the supply power the base station draws over the frame.
//!
//! | Policy   | Allocation                               | Idle resources       |
//! |----------|------------------------------------------|----------------------|
//! | `ba`     | chunk by chunk at `pMax/N`               | idle at `p0`         |
//! | `dtx`    | timeslot by timeslot in alignment order  | sleep at `pS`        |
//! | `pf`     | best PF metric per block, full power     | none                 |
//! | `pf_ba`  | PF frame, then best blocks per user      | idle at `p0`         |
//! | `pf_dtx` | PF until served, then best blocks        | empty slots at `pS`  |
//! | `raps`   | power-control optimum, quantized, IWF    | sleep slots at `pS`  |
//!
//! A frame that cannot carry every mobile's bit load is an expected outcome,
//! reported as [`PolicyOutcome::Overload`] or [`RapsError::Overload`].

pub mod ba;
pub mod pf;
pub mod raps;

pub use ba::{ba, dtx};
pub use pf::{pf, pf_ba, pf_dtx, pf_schedule};
pub use raps::raps;

use crate::entities::{Cell, CellId, Mobile, MobileId};
use crate::world::World;
use raps_core::config::Policy;
use raps_core::types::{RapsError, RapsResult};
use std::collections::BTreeMap;
use tracing::info;

/// What a policy achieved in one cell for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyOutcome {
    /// All targets met.
    Scheduled {
        /// Mean supply power over the frame, W.
        supply: f64,
        /// Continuous optimum, for policies that solve one.
        objective: Option<f64>,
    },
    /// The policy does not apply to this power model.
    NotApplicable,
    /// The targets do not fit into the frame.
    Overload,
}

impl PolicyOutcome {
    pub fn scheduled(supply: f64) -> Self {
        PolicyOutcome::Scheduled { supply, objective: None }
    }

    /// Supply power, `NaN` when nothing was scheduled.
    pub fn supply(&self) -> f64 {
        match self {
            PolicyOutcome::Scheduled { supply, .. } => *supply,
            _ => f64::NAN,
        }
    }

    pub fn objective(&self) -> Option<f64> {
        match self {
            PolicyOutcome::Scheduled { objective, .. } => *objective,
            _ => None,
        }
    }
}

/// Frame dimensions and per-block constants seen by one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub chunks: usize,
    pub timeslots: usize,
    /// Hz per chunk.
    pub chunk_bandwidth: f64,
    /// Seconds per timeslot.
    pub slot_duration: f64,
    /// Seconds per frame.
    pub frame_duration: f64,
    /// Cell transmit power limit, W.
    pub p_max: f64,
    /// Target rate per mobile, bit/s.
    pub rate: f64,
}

impl FrameParams {
    pub fn new(world: &World, cell: &Cell) -> Self {
        let phy = &world.config().phy;
        Self {
            chunks: phy.frequency_chunks,
            timeslots: phy.timeslots,
            chunk_bandwidth: phy.chunk_bandwidth(),
            slot_duration: phy.slot_duration(),
            frame_duration: phy.simulation_time,
            p_max: cell.p_max,
            rate: world.config().scheduling.user_rate,
        }
    }

    /// Flat power per chunk, `pMax / N`.
    pub fn chunk_power(&self) -> f64 {
        self.p_max / self.chunks as f64
    }

    /// Bits every mobile must receive in one frame.
    pub fn bitload(&self) -> f64 {
        self.rate * self.frame_duration
    }

    /// Bits block `(n, t)` carries for `mobile` at flat chunk power.
    pub fn block_bits(&self, mobile: &Mobile, n: usize, t: usize) -> f64 {
        mobile.block_bits(n, t, self.chunk_bandwidth, self.slot_duration, self.chunk_power())
    }

    /// [`FrameParams::block_bits`] rounded down to whole bits.
    pub fn whole_block_bits(&self, mobile: &Mobile, n: usize, t: usize) -> f64 {
        self.block_bits(mobile, n, t).floor()
    }
}

/// Run `policy` in `cell`.
///
/// A cell without mobiles is reported as [`RapsError::EmptyCell`].
pub fn run_policy(world: &mut World, policy: Policy, cell: CellId) -> RapsResult<PolicyOutcome> {
    if world.cell(cell)?.mobiles().is_empty() {
        return Err(RapsError::EmptyCell(cell.index()));
    }
    let outcome = match policy {
        Policy::Ba => ba(world, cell),
        Policy::Dtx => dtx(world, cell),
        Policy::Pf => pf_schedule(world, cell),
        Policy::PfBa => pf_ba(world, cell),
        Policy::PfDtx => pf_dtx(world, cell),
        Policy::Raps => raps(world, cell),
    }?;
    info!(%cell, ?policy, supply = outcome.supply(), "policy outcome");
    Ok(outcome)
}

/// Whole-bit capacity of each timeslot summed over the cell's mobiles and
/// chunks, at flat chunk power.
pub fn timeslot_capacity(world: &World, cell: CellId) -> RapsResult<Vec<f64>> {
    let c = world.cell(cell)?;
    let frame = FrameParams::new(world, c);
    let mobiles = world.mobiles_in(cell);
    Ok((0..frame.timeslots)
        .map(|t| {
            mobiles
                .iter()
                .map(|m| (0..frame.chunks).map(|n| frame.whole_block_bits(m, n, t)).sum::<f64>())
                .sum()
        })
        .collect())
}

/// Bits delivered in `cell` under its current allocation, in total and per
/// mobile, counting every allocated block at flat chunk power.
pub fn achieved_capacity_in_cell(world: &World, cell: CellId) -> RapsResult<(f64, BTreeMap<MobileId, f64>)> {
    let c = world.cell(cell)?;
    let frame = FrameParams::new(world, c);
    let mut per_mobile = BTreeMap::new();
    for mobile in world.mobiles_in(cell) {
        let mut bits = 0.0;
        for n in 0..frame.chunks {
            for t in 0..frame.timeslots {
                if *c.outmap().get(n, t) == Some(mobile.id) {
                    bits += frame.whole_block_bits(mobile, n, t);
                }
            }
        }
        per_mobile.insert(mobile.id, bits);
    }
    Ok((per_mobile.values().sum(), per_mobile))
}
