//! Bandwidth adaptation and sequential DTX.
//!
//! Both fill resource blocks one user at a time at flat power `pMax/N`,
//! moving on once the current user's bit load is covered. Bandwidth
//! adaptation scans chunk-major and leaves idle blocks at idle power. DTX
//! scans timeslots in the cell's sleep-alignment order and lets untouched
//! timeslots sleep.

use super::{FrameParams, PolicyOutcome};
use crate::entities::{CellId, MobileId, PowerGrid};
use crate::world::World;
use raps_core::capacity::{bits, ergodic_capacity};
use raps_core::config::SleepAlignment;
use raps_core::types::{RapsError, RapsResult, ResourceGrid};
use tracing::{debug, info, warn};

/// Bandwidth adaptation. Leaves the cell untouched.
pub fn ba(world: &World, cell: CellId) -> RapsResult<PolicyOutcome> {
    let c = world.cell(cell)?;
    let bs = world.base_station_of(c)?;
    let frame = FrameParams::new(world, c);
    let mobiles = world.mobiles_in(cell);
    let users = mobiles.len();

    let mut remaining = vec![frame.bitload(); users];
    let mut used = vec![0usize; frame.timeslots];
    let mut user = 0;

    // chunk-major: every timeslot of chunk n before chunk n + 1
    'scan: for n in 0..frame.chunks {
        for t in 0..frame.timeslots {
            used[t] += 1;
            let mobile = mobiles[user];
            let h = mobile.serving_channel()?.matrix(n, t);
            let noise = mobile
                .wideband()
                .map(|w| w.noise_plus_interference())
                .ok_or_else(|| RapsError::Consistency(format!("{} has no SINR yet", mobile.id)))?;
            // per-block noise and power both scale with 1/N
            let snr = frame.p_max / noise;
            remaining[user] -= bits(frame.chunk_bandwidth, frame.slot_duration, ergodic_capacity(&h.gram(), snr)?);

            if remaining[user] <= 0.0 {
                user += 1;
            }
            if user >= users {
                break 'scan;
            }
        }
    }

    if !remaining.iter().all(|&r| r < 0.0) {
        warn!(%cell, users, "bandwidth adaptation overload");
        return Ok(PolicyOutcome::Overload);
    }

    let supply = used
        .iter()
        .map(|&u| bs.active_supply(frame.chunk_power() * u as f64))
        .sum::<f64>()
        / frame.timeslots as f64;
    info!(%cell, supply, "bandwidth adaptation");
    Ok(PolicyOutcome::scheduled(supply))
}

/// Sequential DTX with sleep alignment. Writes the cell's power and
/// allocation.
pub fn dtx(world: &mut World, cell: CellId) -> RapsResult<PolicyOutcome> {
    let (power_model, frame, needs_capacity) = {
        let c = world.cell(cell)?;
        let bs = world.base_station_of(c)?;
        (bs.power, FrameParams::new(world, c), c.sleep().needs_capacity())
    };
    if power_model.p_s > power_model.p0 {
        warn!(%cell, p_s = power_model.p_s, p0 = power_model.p0, "sleep draws more than idle, DTX not applicable");
        return Ok(PolicyOutcome::NotApplicable);
    }

    let capacity = if needs_capacity {
        Some(super::timeslot_capacity(world, cell)?)
    } else {
        None
    };
    let order = world.cells[cell.index()]
        .sleep_mut()
        .slot_order(cell, frame.timeslots, capacity.as_deref(), &mut world.rng)?;
    info!(%cell, ?order, "sleep alignment");

    let mobiles = world.mobiles_in(cell);
    let users = mobiles.len();
    let mut remaining = vec![frame.bitload(); users];
    let mut outmap: ResourceGrid<Option<MobileId>> = ResourceGrid::filled(frame.chunks, frame.timeslots, None);
    let mut used = vec![0usize; frame.timeslots];
    let mut user = 0;

    'fill: for &t in &order {
        for n in 0..frame.chunks {
            used[t] += 1;
            outmap.set(n, t, Some(mobiles[user].id));
            remaining[user] -= frame.whole_block_bits(mobiles[user], n, t);

            if remaining[user] <= 0.0 {
                debug!(mobile = %mobiles[user].id, slot = t, "bit load covered");
                user += 1;
            }
            if user >= users {
                break 'fill;
            }
        }
    }

    if !remaining.iter().all(|&r| r < 0.0) {
        return Err(RapsError::Overload(format!(
            "sequential DTX in {cell} cannot serve {users} mobiles"
        )));
    }

    let mut power = PowerGrid::zeros(world.cells[cell.index()].antennas, frame.chunks, frame.timeslots);
    for (flat, owner) in outmap.as_slice().iter().enumerate() {
        if owner.is_some() {
            let (n, t) = outmap.coords(flat);
            power.set_block_total(n, t, frame.chunk_power());
        }
    }
    let supply = used
        .iter()
        .map(|&u| {
            if u == 0 {
                power_model.p_s
            } else {
                power_model.p0 + power_model.m * frame.chunk_power() * u as f64
            }
        })
        .sum::<f64>()
        / frame.timeslots as f64;
    let unused: Vec<usize> = (0..frame.timeslots).filter(|&t| used[t] == 0).collect();

    let c = &mut world.cells[cell.index()];
    if c.sleep().alignment() == SleepAlignment::DtxSegregation {
        c.sleep_mut().segregator_mut().set_unused_slots(unused);
    }
    c.apply_schedule(power, outmap)?;
    info!(%cell, supply, "sequential DTX");
    Ok(PolicyOutcome::scheduled(supply))
}
