//! Resource allocation using power control and sleep (RAPS).
//!
//! 1. Solve the continuous minimum-power problem for each mobile's share of
//!    the frame plus a sleep share.
//! 2. Round the shares to whole blocks and whole sleep timeslots.
//! 3. Place each timeslot's blocks with rate-craving greedy.
//! 4. Inverse water-fill every mobile's streams to exactly its bit load.

use super::{FrameParams, PolicyOutcome};
use crate::entities::{CellId, MobileId, PowerGrid};
use crate::world::{World, ANTENNAS};
use raps_core::iwf::inverse_waterfill_uniform;
use raps_core::linalg::ComplexMatrix;
use raps_core::optim::min_power::{optimize_pc_dtx, PowerControlParams};
use raps_core::quantize::{quantize_shares, rcg};
use raps_core::types::{RapsError, RapsResult, ResourceGrid};
use tracing::{debug, info};

/// Relative slack on the per-timeslot power limit.
const P_MAX_TOLERANCE: f64 = 1e-9;
/// Relative slack between water-filled capacity and bit load.
const BIT_LOAD_TOLERANCE: f64 = 1e-6;

/// Fails unless a water-filled allocation carries the bit load of `mobile`.
fn confirm_bit_load(mobile: MobileId, achieved: f64, bitload: f64) -> RapsResult<()> {
    if (achieved - bitload).abs() > BIT_LOAD_TOLERANCE * bitload.max(1.0) {
        return Err(RapsError::Consistency(format!(
            "water-filling for {mobile} carries {achieved} bits instead of {bitload}"
        )));
    }
    Ok(())
}

/// Unit-power SINR covariance of a mobile: the mean stream SINRs over the
/// frame on the diagonal.
fn sinr_covariance(mean_streams: &[f64]) -> ComplexMatrix {
    let rows: Vec<Vec<f64>> = (0..mean_streams.len())
        .map(|i| {
            let mut row = vec![0.0; mean_streams.len()];
            row[i] = mean_streams[i];
            row
        })
        .collect();
    ComplexMatrix::from_real_rows(&rows)
}

/// Schedule `cell` with RAPS and write power and allocation into it.
pub fn raps(world: &mut World, cell: CellId) -> RapsResult<PolicyOutcome> {
    let (frame, power_model, antennas) = {
        let c = world.cell(cell)?;
        (FrameParams::new(world, c), world.base_station_of(c)?.power, c.antennas)
    };
    let mobiles = world.mobiles_in(cell);
    if antennas != ANTENNAS || mobiles.iter().any(|m| m.antennas != ANTENNAS) {
        return Err(RapsError::NotImplemented(format!(
            "power control needs {ANTENNAS}x{ANTENNAS} links in {cell}"
        )));
    }
    let users = mobiles.len();

    let covariances: Vec<ComplexMatrix> = mobiles
        .iter()
        .map(|m| {
            let means: Vec<f64> = m.effective_sinr().iter().map(ResourceGrid::<f64>::mean).collect();
            sinr_covariance(&means)
        })
        .collect();
    // unit-power SINRs assume the whole power on one chunk
    let noise = vec![frame.chunks as f64; users];
    let params = PowerControlParams {
        rate: frame.rate,
        bandwidth: world.config().phy.system_bandwidth,
        p_max: frame.p_max,
        p0: power_model.p0,
        m: power_model.m,
    };
    let solution = optimize_pc_dtx(&covariances, &noise, params, power_model.p_s)?;
    debug!(%cell, objective = solution.objective, shares = ?solution.shares, "continuous optimum");

    let ids: Vec<MobileId> = mobiles.iter().map(|m| m.id).collect();
    let mut outmap: ResourceGrid<Option<MobileId>> = ResourceGrid::filled(frame.chunks, frame.timeslots, None);
    let mut owner: ResourceGrid<Option<usize>> = ResourceGrid::filled(frame.chunks, frame.timeslots, None);
    let quantized = quantize_shares(&solution.shares, frame.chunks, frame.timeslots, &mut world.rng)?;
    let mobiles = world.mobiles_in(cell);
    for t in 0..frame.timeslots {
        let targets = &quantized.slot(t)[..users];
        if quantized.is_sleep_slot(t) || targets.iter().sum::<usize>() == 0 {
            continue;
        }
        let desirability: Vec<Vec<f64>> = (0..frame.chunks)
            .map(|n| mobiles.iter().map(|m| m.block_capacity(n, t, frame.chunk_power())).collect())
            .collect();
        for (n, k) in rcg(&desirability, targets)?.into_iter().enumerate() {
            owner.set(n, t, Some(k));
            outmap.set(n, t, Some(ids[k]));
        }
    }

    let mut power = PowerGrid::zeros(antennas, frame.chunks, frame.timeslots);
    for (k, mobile) in mobiles.iter().enumerate() {
        let blocks: Vec<(usize, usize)> = owner
            .as_slice()
            .iter()
            .enumerate()
            .filter(|(_, o)| **o == Some(k))
            .map(|(i, _)| owner.coords(i))
            .collect();
        if blocks.is_empty() {
            if quantized.user_total(k) > 0 {
                return Err(RapsError::Overload(format!("{} was quantized but never placed", mobile.id)));
            }
            continue;
        }
        let gains: Vec<f64> = blocks.iter().flat_map(|&(n, t)| mobile.block_sinr(n, t)).collect();
        let fill = inverse_waterfill_uniform(&gains, frame.bitload(), 1.0, frame.chunk_bandwidth, frame.slot_duration)?;
        confirm_bit_load(mobile.id, fill.capacity, frame.bitload())?;
        // stream s of a block goes out on antenna s
        for (b, &(n, t)) in blocks.iter().enumerate() {
            for a in 0..antennas {
                power.set(a, n, t, fill.powers[b * antennas + a]);
            }
        }
        debug!(mobile = %mobile.id, blocks = blocks.len(), waterlevel = fill.waterlevel, "inverse water-filling");
    }

    let mut supply = 0.0;
    for t in 0..frame.timeslots {
        let ptx = power.timeslot_total(t);
        if ptx > frame.p_max * (1.0 + P_MAX_TOLERANCE) {
            return Err(RapsError::Overload(format!(
                "timeslot {t} of {cell} needs {ptx} W above {} W",
                frame.p_max
            )));
        }
        supply += if quantized.is_sleep_slot(t) {
            power_model.p_s
        } else {
            power_model.p0 + power_model.m * ptx
        };
    }
    supply /= frame.timeslots as f64;

    world.cells[cell.index()].apply_schedule(power, outmap)?;
    info!(%cell, supply, objective = solution.objective, sleep_slots = quantized.sleep_slots(), "RAPS");
    Ok(PolicyOutcome::Scheduled {
        supply,
        objective: Some(solution.objective),
    })
}
