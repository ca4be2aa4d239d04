//! Proportional fair scheduling and its energy-aware variants.
//!
//! `pf` gives each block to the mobile with the best ratio of mean stream
//! SINR to average rate and transmits on everything. `pf_ba` and `pf_dtx`
//! first build a virtual PF frame timeslot by timeslot, weighting each
//! block's bits by the bits a mobile already got, then keep only each
//! mobile's best blocks until its load is covered:
//!
//! ```text
//! metric[n, k]   = bits[n, k] / max(bitload - remaining[k], 1)
//! remaining[k]  <- -1e20 once negative
//! ```
//!
//! `pf_dtx` stops the virtual frame once every mobile is covered so whole
//! timeslots can sleep.

use super::{FrameParams, PolicyOutcome};
use crate::entities::{CellId, Mobile, MobileId, PowerGrid};
use crate::world::World;
use raps_core::numeric::{argmax, argsort_descending};
use raps_core::types::{RapsError, RapsResult, ResourceGrid};
use tracing::{debug, info};

/// Frames over which the PF average rate is smoothed.
pub const PF_WINDOW: f64 = 10.0;

/// Remaining load marking a mobile as covered.
const SERVED: f64 = -1e20;

/// Per-block PF decision: index into `mobiles` of the best metric
/// `mean SINR / average rate`, lowest index on ties.
pub fn pf(mobiles: &[&Mobile], average_rates: &[f64], chunks: usize, timeslots: usize) -> RapsResult<ResourceGrid<usize>> {
    if average_rates.len() != mobiles.len() {
        return Err(RapsError::DimensionMismatch {
            expected: mobiles.len(),
            actual: average_rates.len(),
        });
    }
    if mobiles.is_empty() {
        return Err(RapsError::Consistency("proportional fair without mobiles".into()));
    }
    let mut metric = vec![0.0; mobiles.len()];
    Ok(ResourceGrid::from_fn(chunks, timeslots, |n, t| {
        for (k, m) in mobiles.iter().enumerate() {
            metric[k] = m.mean_block_sinr(n, t) / average_rates[k];
        }
        argmax(&metric).unwrap_or(0)
    }))
}

/// Plain PF on the cell: full flat power on every block, then the average
/// rates move towards what this frame delivered.
pub fn pf_schedule(world: &mut World, cell: CellId) -> RapsResult<PolicyOutcome> {
    let (frame, supply, antennas) = {
        let c = world.cell(cell)?;
        let bs = world.base_station_of(c)?;
        (FrameParams::new(world, c), bs.active_supply(c.p_max), c.antennas)
    };
    let mobiles = world.mobiles_in(cell);
    let rates: Vec<f64> = mobiles.iter().map(|m| m.average_rate).collect();
    let alloc = pf(&mobiles, &rates, frame.chunks, frame.timeslots)?;

    let ids: Vec<MobileId> = mobiles.iter().map(|m| m.id).collect();
    let mut delivered = vec![0.0; mobiles.len()];
    for (flat, &k) in alloc.as_slice().iter().enumerate() {
        let (n, t) = alloc.coords(flat);
        delivered[k] += frame.block_bits(mobiles[k], n, t);
    }
    let outmap = alloc.map(|&k| Some(ids[k]));

    world.cells[cell.index()].apply_schedule(PowerGrid::full(antennas, frame.chunks, frame.timeslots, frame.p_max), outmap)?;
    for mobile in world.mobiles.iter_mut() {
        if let Some(k) = ids.iter().position(|&id| id == mobile.id) {
            let rate = delivered[k] / frame.frame_duration;
            mobile.average_rate = (1.0 - 1.0 / PF_WINDOW) * mobile.average_rate + rate / PF_WINDOW;
        }
    }
    info!(%cell, supply, "proportional fair");
    Ok(PolicyOutcome::scheduled(supply))
}

/// Virtual PF frame reduced to the blocks each mobile needs.
struct Reduced {
    /// Mobile index per block that transmits.
    active: ResourceGrid<Option<usize>>,
}

fn pf_reduce(mobiles: &[&Mobile], frame: &FrameParams, stop_when_served: bool) -> RapsResult<Reduced> {
    let users = mobiles.len();
    let bitload = frame.bitload();
    let mut remaining = vec![bitload; users];
    let mut transmitted = vec![1.0; users];
    let mut alloc: ResourceGrid<Option<usize>> = ResourceGrid::filled(frame.chunks, frame.timeslots, None);
    let mut best_rate: ResourceGrid<f64> = ResourceGrid::filled(frame.chunks, frame.timeslots, -1.0);

    let mut capacity = vec![0.0; users];
    let mut metric = vec![0.0; users];
    for t in 0..frame.timeslots {
        for n in 0..frame.chunks {
            for (k, m) in mobiles.iter().enumerate() {
                capacity[k] = frame.block_bits(m, n, t);
                metric[k] = capacity[k] / transmitted[k];
            }
            let k = argmax(&metric).unwrap_or(0);
            alloc.set(n, t, Some(k));
            best_rate.set(n, t, capacity[k]);
            // may go negative, which steers the metric away from this mobile
            remaining[k] -= capacity[k];
        }
        for r in remaining.iter_mut() {
            if *r < 0.0 {
                *r = SERVED;
            }
        }
        if stop_when_served && remaining.iter().all(|&r| r < 0.0) {
            debug!(slot = t, "all mobiles covered");
            break;
        }
        for (tx, r) in transmitted.iter_mut().zip(&remaining) {
            *tx = (bitload - r).max(1.0);
        }
    }

    if remaining.iter().any(|&r| r > 0.0) {
        return Err(RapsError::Overload(format!(
            "proportional fair cannot cover {users} mobiles"
        )));
    }
    if !stop_when_served && alloc.iter().any(Option::is_none) {
        return Err(RapsError::Consistency("proportional fair left blocks unallocated".into()));
    }

    let mut active: ResourceGrid<Option<usize>> = ResourceGrid::filled(frame.chunks, frame.timeslots, None);
    let mut sum_rate = 0.0;
    for k in 0..users {
        let blocks: Vec<usize> = alloc
            .as_slice()
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == Some(k))
            .map(|(i, _)| i)
            .collect();
        let rates: Vec<f64> = blocks.iter().map(|&i| best_rate.as_slice()[i]).collect();
        let mut bits = 0.0;
        for j in argsort_descending(&rates) {
            let (n, t) = alloc.coords(blocks[j]);
            if active.get(n, t).is_some() {
                return Err(RapsError::Consistency(format!("block ({n}, {t}) assigned twice")));
            }
            bits += rates[j];
            sum_rate += rates[j];
            active.set(n, t, Some(k));
            if bits > bitload {
                break;
            }
        }
    }

    if sum_rate < users as f64 * bitload {
        return Err(RapsError::Overload(format!(
            "proportional fair delivers {sum_rate} of {} bits",
            users as f64 * bitload
        )));
    }
    Ok(Reduced { active })
}

fn pf_apply(world: &mut World, cell: CellId, sleep: bool) -> RapsResult<PolicyOutcome> {
    let (frame, power_model, antennas) = {
        let c = world.cell(cell)?;
        (FrameParams::new(world, c), world.base_station_of(c)?.power, c.antennas)
    };
    let mobiles = world.mobiles_in(cell);
    let reduced = pf_reduce(&mobiles, &frame, sleep)?;

    let mut power = PowerGrid::zeros(antennas, frame.chunks, frame.timeslots);
    let mut used = vec![0usize; frame.timeslots];
    for (flat, owner) in reduced.active.as_slice().iter().enumerate() {
        if owner.is_some() {
            let (n, t) = reduced.active.coords(flat);
            power.set_block_total(n, t, frame.chunk_power());
            used[t] += 1;
        }
    }
    let outmap = reduced.active.map(|a| a.map(|k| mobiles[k].id));

    let supply = used
        .iter()
        .map(|&u| {
            if sleep && u == 0 {
                power_model.p_s
            } else {
                power_model.p0 + power_model.m * frame.chunk_power() * u as f64
            }
        })
        .sum::<f64>()
        / frame.timeslots as f64;

    world.cells[cell.index()].apply_schedule(power, outmap)?;
    Ok(PolicyOutcome::scheduled(supply))
}

/// PF with power control: unneeded blocks of the PF frame stay idle.
pub fn pf_ba(world: &mut World, cell: CellId) -> RapsResult<PolicyOutcome> {
    let outcome = pf_apply(world, cell, false)?;
    info!(%cell, supply = outcome.supply(), "power-controlled proportional fair");
    Ok(outcome)
}

/// PF with micro sleep: timeslots the PF frame never reached sleep.
pub fn pf_dtx(world: &mut World, cell: CellId) -> RapsResult<PolicyOutcome> {
    let outcome = pf_apply(world, cell, true)?;
    info!(%cell, supply = outcome.supply(), "proportional fair with DTX");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::super::{achieved_capacity_in_cell, testing};
    use super::*;
    use approx::assert_relative_eq;
    use raps_core::config::Policy;

    #[test]
    fn test_starved_mobile_takes_every_block() {
        let world = testing::world(Policy::Pf, 1.0, 21);
        let cell = world.center_cell().unwrap();
        let mobiles = world.mobiles_in(cell);
        let mut rates = vec![1.0; mobiles.len()];
        rates[0] = 1e-20;
        let alloc = pf(&mobiles, &rates, 6, 4).unwrap();
        assert!(alloc.iter().all(|&k| k == 0));
    }

    #[test]
    fn test_pf_rejects_mismatched_rates() {
        let world = testing::world(Policy::Pf, 1.0, 22);
        let cell = world.center_cell().unwrap();
        let mobiles = world.mobiles_in(cell);
        assert!(pf(&mobiles, &[1.0], 6, 4).is_err());
    }

    #[test]
    fn test_pf_schedule_full_power_and_rates() {
        let mut world = testing::world(Policy::Pf, 1e5, 23);
        let cell = world.center_cell().unwrap();
        let outcome = pf_schedule(&mut world, cell).unwrap();
        let c = world.cell(cell).unwrap();
        let p = world.config().power;
        assert_relative_eq!(outcome.supply(), p.p0 + p.m * c.p_max, epsilon = 1e-9);
        assert!(c.outmap().iter().all(Option::is_some));
        assert_relative_eq!(c.power().total(), c.p_max * 4.0, epsilon = 1e-9);
        // every mobile started at 1 bit/s; only those that got blocks moved up
        let served: Vec<MobileId> = c.outmap().iter().flatten().copied().collect();
        for m in world.mobiles_in(cell) {
            if served.contains(&m.id) {
                assert!(m.average_rate > 1.0);
            } else {
                assert_relative_eq!(m.average_rate, 0.9);
            }
        }
    }

    fn owners(world: &World, cell: CellId) -> Vec<MobileId> {
        world.cell(cell).unwrap().outmap().iter().flatten().copied().collect()
    }

    #[test]
    fn test_pf_ba_keeps_only_needed_blocks() {
        let mut world = testing::world(Policy::PfBa, 1e4, 24);
        let cell = world.center_cell().unwrap();
        let supply = pf_ba(&mut world, cell).unwrap().supply();
        let owners = owners(&world, cell);
        for m in world.mobiles_in(cell) {
            assert!(owners.contains(&m.id));
        }
        let active = owners.len();
        assert!(active < 24);

        let c = world.cell(cell).unwrap();
        let p = world.config().power;
        let chunk_power = c.p_max / 6.0;
        // idle blocks draw nothing but the base station stays awake
        assert_relative_eq!(supply, p.p0 + p.m * chunk_power * active as f64 / 4.0, epsilon = 1e-9);
        assert_relative_eq!(c.power().total(), chunk_power * active as f64, epsilon = 1e-9);

        let (_, per_mobile) = achieved_capacity_in_cell(&world, cell).unwrap();
        let bitload = FrameParams::new(&world, c).bitload();
        assert!(per_mobile.values().all(|&bits| bits >= bitload.floor()));
    }

    #[test]
    fn test_pf_dtx_sleeps_empty_slots() {
        let mut world = testing::world(Policy::PfDtx, 1e4, 25);
        let cell = world.center_cell().unwrap();
        let supply = pf_dtx(&mut world, cell).unwrap().supply();
        let c = world.cell(cell).unwrap();
        let p = world.config().power;
        let expected = (0..4)
            .map(|t| match c.outmap().timeslot(t).filter(|o| o.is_some()).count() {
                0 => p.p_s,
                used => p.p0 + p.m * c.p_max / 6.0 * used as f64,
            })
            .sum::<f64>()
            / 4.0;
        assert_relative_eq!(supply, expected, epsilon = 1e-9);
        assert!(owners(&world, cell).len() < 24);
    }

    #[test]
    fn test_pf_overload() {
        let mut world = testing::world(Policy::PfBa, 1e12, 26);
        let cell = world.center_cell().unwrap();
        assert!(matches!(pf_ba(&mut world, cell), Err(RapsError::Overload(_))));
        assert!(matches!(pf_dtx(&mut world, cell), Err(RapsError::Overload(_))));
    }
}
