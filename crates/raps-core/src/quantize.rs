//! Integer resource-block quantization.
//!
//! The power-control optimizer returns continuous resource shares. Two steps
//! turn them into a concrete OFDMA allocation:
//!
//! 1. [`quantize_shares`] rounds the shares to whole blocks per user (never
//!    below the requested share) and whole sleep timeslots, and distributes
//!    them over the timeslots of the frame.
//! 2. [`rcg`] (rate-craving greedy) assigns the chunks of one timeslot to
//!    users so that every user receives exactly its per-slot block count
//!    while losing as little desirability as possible.

use crate::numeric::argmax;
use crate::types::{RapsError, RapsResult};
use rand::seq::SliceRandom;
use rand::Rng;

/// Slack on the sum of shares returned by a numerical solver.
pub const SHARE_SUM_TOLERANCE: f64 = 1e-4;

/// Per-timeslot block counts of a quantized frame.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedFrame {
    chunks: usize,
    users: usize,
    /// `[timeslot][user]`, with the sleep column last.
    counts: Vec<Vec<usize>>,
}

impl QuantizedFrame {
    pub fn timeslots(&self) -> usize {
        self.counts.len()
    }

    pub fn users(&self) -> usize {
        self.users
    }

    /// Block counts of one timeslot, sleep column last.
    pub fn slot(&self, t: usize) -> &[usize] {
        &self.counts[t]
    }

    /// Whether the whole timeslot sleeps.
    pub fn is_sleep_slot(&self, t: usize) -> bool {
        self.counts[t][self.users] == self.chunks
    }

    pub fn sleep_slots(&self) -> usize {
        (0..self.timeslots()).filter(|&t| self.is_sleep_slot(t)).count()
    }

    /// Blocks given to `user` across the frame.
    pub fn user_total(&self, user: usize) -> usize {
        self.counts.iter().map(|slot| slot[user]).sum()
    }
}

/// Round resource shares to whole blocks on an `chunks x timeslots` frame.
///
/// `shares` holds one entry per user followed by the sleep share. Every user
/// receives at least `ceil(share * chunks * timeslots)` blocks. The sleep
/// share becomes whole sleep timeslots, as many as it asks for and the free
/// blocks allow. Leftover blocks go to the users with the largest shares, so
/// every block of an active timeslot belongs to some user.
///
/// Which timeslots sleep and the order in which users fill the active ones
/// are drawn from `rng`.
pub fn quantize_shares<R: Rng + ?Sized>(
    shares: &[f64],
    chunks: usize,
    timeslots: usize,
    rng: &mut R,
) -> RapsResult<QuantizedFrame> {
    let users = shares.len().checked_sub(1).ok_or_else(|| {
        RapsError::Consistency("quantization needs at least the sleep share".into())
    })?;
    if let Some(bad) = shares.iter().find(|s| !s.is_finite() || **s < -1e-9) {
        return Err(RapsError::Consistency(format!("invalid resource share {bad}")));
    }
    let sum: f64 = shares.iter().sum();
    if sum > 1.0 + SHARE_SUM_TOLERANCE {
        return Err(RapsError::Consistency(format!("resource shares sum to {sum}")));
    }

    let total = chunks * timeslots;
    let mut blocks: Vec<usize> = shares[..users]
        .iter()
        .map(|s| (s.max(0.0) * total as f64 - 1e-9).ceil().max(0.0) as usize)
        .collect();
    let demanded: usize = blocks.iter().sum();
    if demanded > total {
        return Err(RapsError::Overload(format!(
            "quantized users need {demanded} blocks but the frame holds {total}"
        )));
    }

    let free = total - demanded;
    let sleep_slots = if users == 0 {
        timeslots
    } else {
        let requested = (shares[users].max(0.0) * timeslots as f64 + 1e-9).floor() as usize;
        requested.min(free / chunks.max(1))
    };

    let mut leftover = free - sleep_slots * chunks;
    if leftover > 0 {
        let mut by_share: Vec<usize> = (0..users).collect();
        by_share.sort_by(|&a, &b| shares[b].total_cmp(&shares[a]));
        for &u in by_share.iter().cycle() {
            if leftover == 0 {
                break;
            }
            blocks[u] += 1;
            leftover -= 1;
        }
    }

    let mut slots: Vec<usize> = (0..timeslots).collect();
    slots.shuffle(rng);
    let mut counts = vec![vec![0usize; users + 1]; timeslots];
    for &t in &slots[..sleep_slots] {
        counts[t][users] = chunks;
    }
    let mut active: Vec<usize> = slots[sleep_slots..].to_vec();
    active.sort_unstable();

    let mut fill_order: Vec<usize> = (0..users).collect();
    fill_order.shuffle(rng);
    let mut slot_iter = active.into_iter();
    let mut current = slot_iter.next();
    let mut room = chunks;
    for &u in &fill_order {
        let mut remaining = blocks[u];
        while remaining > 0 {
            let t = current.ok_or_else(|| {
                RapsError::Consistency("quantized blocks exceed the active timeslots".into())
            })?;
            let take = remaining.min(room);
            counts[t][u] += take;
            remaining -= take;
            room -= take;
            if room == 0 {
                current = slot_iter.next();
                room = chunks;
            }
        }
    }

    Ok(QuantizedFrame { chunks, users, counts })
}

/// Rate-craving greedy assignment of rows (chunks) to users.
///
/// `desirability[n][k]` is how much user `k` values chunk `n`. Every chunk
/// starts with its favourite user (lowest index on ties). While some user
/// holds more chunks than `targets` asks for, the single move from an
/// over-served user to an under-served one that loses the least desirability
/// is applied; ties go to the first candidate in (chunk, user) order.
pub fn rcg(desirability: &[Vec<f64>], targets: &[usize]) -> RapsResult<Vec<usize>> {
    let users = targets.len();
    let rows = desirability.len();
    let wanted: usize = targets.iter().sum();
    if wanted != rows {
        return Err(RapsError::Consistency(format!(
            "block targets sum to {wanted} for {rows} chunks"
        )));
    }
    if let Some(row) = desirability.iter().find(|r| r.len() != users) {
        return Err(RapsError::DimensionMismatch {
            expected: users,
            actual: row.len(),
        });
    }
    if rows == 0 {
        return Ok(Vec::new());
    }

    let mut assignment: Vec<usize> = desirability
        .iter()
        .map(|row| argmax(row).unwrap_or(0))
        .collect();
    let mut counts = vec![0usize; users];
    for &k in &assignment {
        counts[k] += 1;
    }

    while counts != targets {
        let mut best: Option<(f64, usize, usize)> = None;
        for (n, row) in desirability.iter().enumerate() {
            let from = assignment[n];
            if counts[from] <= targets[from] {
                continue;
            }
            for to in 0..users {
                if counts[to] >= targets[to] {
                    continue;
                }
                let loss = row[from] - row[to];
                if best.map_or(true, |(b, _, _)| loss < b) {
                    best = Some((loss, n, to));
                }
            }
        }
        let (_, n, to) = best.ok_or_else(|| {
            RapsError::Consistency("rate-craving greedy found no admissible move".into())
        })?;
        counts[assignment[n]] -= 1;
        counts[to] += 1;
        assignment[n] = to;
    }
    Ok(assignment)
}
