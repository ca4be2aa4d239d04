//! Timeslot ordering for sleep alignment.
//!
//! A DTX cell fills timeslots in priority order and sleeps through whatever
//! is left, so the priority decides where the sleep lands. The strategy is
//! picked by [`SleepAlignment`]; [`SleepState`] keeps whatever it remembers
//! between frames.
//!
//! The segregation strategy scores every timeslot in `[0, 5]`. Used slots
//! and the frame's best slot gain a point, unused slots lose one, and the
//! next priority is the score plus a small tie-break from the capacity
//! ranking:
//!
//! ```text
//! priority = argsort_desc(score[t] + (T - 1 - rank(t)) / 100)
//! ```

use raps_core::config::SleepAlignment;
use raps_core::numeric::{argsort_descending, is_trivial_order, rolled_range};
use raps_core::types::{RapsError, RapsResult};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::CellId;

/// Probability of re-ranking per frame once a capacity ranking exists.
pub const RERANK_PROBABILITY: f64 = 0.3;

/// Scale of the capacity tie-break added to segregation scores.
const TIE_BREAK_SCALE: f64 = 100.0;

/// Segregation score bounds.
pub const SCORE_FLOOR: u8 = 0;
pub const SCORE_CEILING: u8 = 5;

/// Reuse-3 table for the 19-cell layout: cell id to slot group.
const STATIC_GROUPS: [(usize, usize); 19] = [
    (0, 0),
    (1, 2),
    (2, 1),
    (3, 2),
    (4, 2),
    (5, 0),
    (6, 2),
    (7, 0),
    (8, 1),
    (9, 0),
    (10, 2),
    (11, 1),
    (12, 2),
    (13, 0),
    (14, 1),
    (15, 2),
    (16, 1),
    (17, 0),
    (18, 1),
];

/// Timeslots a cell may use under the static reuse-3 scheme.
pub fn static_timeslots(cell: CellId, timeslots: usize) -> RapsResult<Vec<usize>> {
    let group = STATIC_GROUPS
        .iter()
        .find(|(id, _)| *id == cell.index())
        .map(|(_, g)| *g)
        .ok_or_else(|| {
            RapsError::Config(format!(
                "static sleep alignment covers cells 0..19 only, got {cell}"
            ))
        })?;
    let slots: Vec<usize> = (3 * group..3 * group + 3).collect();
    if slots[2] >= timeslots {
        return Err(RapsError::Config(format!(
            "static sleep alignment needs at least {} timeslots, frame has {timeslots}",
            slots[2] + 1
        )));
    }
    Ok(slots)
}

/// Timeslots ordered by descending capacity.
///
/// Slowly varying channels tend to produce the identity ranking or its
/// reverse in the first frame; those are replaced by a random permutation.
pub fn rank_timeslots<R: Rng + ?Sized>(capacity: &[f64], rng: &mut R) -> Vec<usize> {
    let mut ranking = argsort_descending(capacity);
    if is_trivial_order(&ranking) {
        ranking.shuffle(rng);
        debug!("degenerate timeslot ranking randomized");
    }
    ranking
}

fn permutation<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(rng);
    order
}

/// Score-based timeslot segregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtxSegregator {
    score: Vec<u8>,
    best_timeslot: Option<usize>,
    unused_slots: Vec<usize>,
}

impl DtxSegregator {
    pub fn new(timeslots: usize) -> Self {
        Self {
            score: vec![SCORE_FLOOR; timeslots],
            best_timeslot: None,
            unused_slots: Vec::new(),
        }
    }

    pub fn score(&self) -> &[u8] {
        &self.score
    }

    pub fn best_timeslot(&self) -> Option<usize> {
        self.best_timeslot
    }

    /// Slots left asleep in the last frame.
    pub fn set_unused_slots(&mut self, slots: Vec<usize>) {
        self.unused_slots = slots;
    }

    fn increment(&mut self, slot: usize) {
        if let Some(s) = self.score.get_mut(slot) {
            *s = (*s + 1).min(SCORE_CEILING);
        }
    }

    fn decrement(&mut self, slot: usize) {
        if let Some(s) = self.score.get_mut(slot) {
            *s = s.saturating_sub(1).max(SCORE_FLOOR);
        }
    }

    fn update_score(&mut self) {
        let unused = std::mem::take(&mut self.unused_slots);
        for t in 0..self.score.len() {
            if unused.contains(&t) {
                self.decrement(t);
            } else {
                self.increment(t);
            }
        }
        if let Some(best) = self.best_timeslot {
            self.increment(best);
            if unused.contains(&best) {
                self.increment(best);
            }
        }
        self.unused_slots = unused;
        info!(score = ?self.score, "dtx segregation score");
    }

    /// Next frame's priority given this frame's capacity ranking.
    pub fn ranking(&mut self, capacity_order: &[usize]) -> Vec<usize> {
        self.best_timeslot = capacity_order.first().copied();
        self.update_score();

        let len = capacity_order.len();
        let mut tie_break = vec![0.0; self.score.len()];
        for (rank, &t) in capacity_order.iter().enumerate() {
            if let Some(v) = tie_break.get_mut(t) {
                *v = (len - 1 - rank) as f64 / TIE_BREAK_SCALE;
            }
        }
        let combined: Vec<f64> = self
            .score
            .iter()
            .zip(&tie_break)
            .map(|(&s, &b)| s as f64 + b)
            .collect();
        argsort_descending(&combined)
    }
}

/// Sleep alignment of one cell and its memory across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepState {
    alignment: SleepAlignment,
    priority: Option<Vec<usize>>,
    segregator: DtxSegregator,
}

impl SleepState {
    pub fn new(alignment: SleepAlignment, timeslots: usize) -> Self {
        Self {
            alignment,
            priority: None,
            segregator: DtxSegregator::new(timeslots),
        }
    }

    pub fn alignment(&self) -> SleepAlignment {
        self.alignment
    }

    /// Switch strategy; any remembered priority is dropped.
    pub fn set_alignment(&mut self, alignment: SleepAlignment) {
        self.alignment = alignment;
        self.priority = None;
        info!(?alignment, "sleep slot priority reset");
    }

    pub fn segregator(&self) -> &DtxSegregator {
        &self.segregator
    }

    pub fn segregator_mut(&mut self) -> &mut DtxSegregator {
        &mut self.segregator
    }

    /// Whether [`SleepState::slot_order`] needs the per-timeslot capacity.
    pub fn needs_capacity(&self) -> bool {
        matches!(
            self.alignment,
            SleepAlignment::Sinr | SleepAlignment::DtxSegregation
        )
    }

    /// Order in which the cell fills its timeslots this frame.
    ///
    /// `capacity` is the cell's achievable capacity per timeslot and must be
    /// given whenever [`SleepState::needs_capacity`] holds.
    pub fn slot_order<R: Rng + ?Sized>(
        &mut self,
        cell: CellId,
        timeslots: usize,
        capacity: Option<&[f64]>,
        rng: &mut R,
    ) -> RapsResult<Vec<usize>> {
        let order = match self.alignment {
            SleepAlignment::None => (0..timeslots).collect(),
            SleepAlignment::RandomShiftOnce => self
                .priority
                .get_or_insert_with(|| rolled_range(timeslots, rng.gen_range(0..timeslots.max(1))))
                .clone(),
            SleepAlignment::RandomShiftIter => rolled_range(timeslots, rng.gen_range(0..timeslots.max(1))),
            SleepAlignment::RandomOnce => self
                .priority
                .get_or_insert_with(|| permutation(timeslots, rng))
                .clone(),
            SleepAlignment::RandomIter => permutation(timeslots, rng),
            SleepAlignment::Sinr => {
                let capacity = required(capacity)?;
                if self.priority.is_none() || rng.gen::<f64>() < RERANK_PROBABILITY {
                    self.priority = Some(rank_timeslots(capacity, rng));
                }
                self.priority.clone().unwrap_or_default()
            }
            SleepAlignment::Static => static_timeslots(cell, timeslots)?,
            SleepAlignment::DtxSegregation => {
                let ranking = rank_timeslots(required(capacity)?, rng);
                self.segregator.ranking(&ranking)
            }
        };
        debug!(%cell, ?order, "sleep alignment");
        Ok(order)
    }
}

fn required(capacity: Option<&[f64]>) -> RapsResult<&[f64]> {
    capacity.ok_or_else(|| RapsError::Consistency("timeslot capacity missing for a ranked sleep alignment".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn is_permutation(order: &[usize], len: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..len).collect::<Vec<_>>()
    }

    #[test]
    fn test_static_table() {
        assert_eq!(static_timeslots(CellId(0), 10).unwrap(), vec![0, 1, 2]);
        assert_eq!(static_timeslots(CellId(16), 10).unwrap(), vec![3, 4, 5]);
        assert_eq!(static_timeslots(CellId(4), 10).unwrap(), vec![6, 7, 8]);
        assert!(static_timeslots(CellId(19), 10).is_err());
        assert!(static_timeslots(CellId(4), 8).is_err());
    }

    #[test]
    fn test_static_groups_balanced() {
        let mut counts = [0; 3];
        for (_, g) in STATIC_GROUPS {
            counts[g] += 1;
        }
        assert_eq!(counts.iter().sum::<usize>(), 19);
        assert!(counts.iter().all(|&c| c >= 6));
    }

    #[test]
    fn test_rank_timeslots_descending() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rank_timeslots(&[3.0, 9.0, 1.0, 5.0], &mut rng), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_rank_timeslots_randomizes_degenerate() {
        let mut rng = StdRng::seed_from_u64(1);
        let capacity: Vec<f64> = (0..10).map(|t| 100.0 - t as f64).collect();
        let mut randomized = false;
        for _ in 0..20 {
            let order = rank_timeslots(&capacity, &mut rng);
            assert!(is_permutation(&order, 10));
            randomized |= !is_trivial_order(&order);
        }
        assert!(randomized);
    }

    #[test]
    fn test_segregator_scores() {
        let mut dtxs = DtxSegregator::new(4);
        dtxs.set_unused_slots(vec![2, 3]);
        // best slot 3 was unused: floored at zero, then two increments
        let order = dtxs.ranking(&[3, 0, 1, 2]);
        assert_eq!(dtxs.score(), &[1, 1, 0, 2]);
        assert_eq!(dtxs.best_timeslot(), Some(3));
        // slots 0 and 1 tie on score and follow the capacity order
        assert_eq!(order, vec![3, 0, 1, 2]);
    }

    #[test]
    fn test_segregator_bounds() {
        let mut dtxs = DtxSegregator::new(3);
        for _ in 0..10 {
            dtxs.set_unused_slots(vec![2]);
            dtxs.ranking(&[0, 1, 2]);
        }
        assert_eq!(dtxs.score(), &[SCORE_CEILING, SCORE_CEILING, SCORE_FLOOR]);
        let order = dtxs.ranking(&[2, 1, 0]);
        assert_eq!(order[2], 2);
    }

    #[test]
    fn test_once_strategies_persist() {
        let mut rng = StdRng::seed_from_u64(3);
        for alignment in [SleepAlignment::RandomOnce, SleepAlignment::RandomShiftOnce] {
            let mut state = SleepState::new(alignment, 10);
            let first = state.slot_order(CellId(0), 10, None, &mut rng).unwrap();
            assert!(is_permutation(&first, 10));
            for _ in 0..5 {
                assert_eq!(state.slot_order(CellId(0), 10, None, &mut rng).unwrap(), first);
            }
        }
    }

    #[test]
    fn test_shift_is_rolled_range() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut state = SleepState::new(SleepAlignment::RandomShiftIter, 6);
        for _ in 0..10 {
            let order = state.slot_order(CellId(0), 6, None, &mut rng).unwrap();
            for w in order.windows(2) {
                assert_eq!(w[1], (w[0] + 1) % 6);
            }
        }
    }

    #[test]
    fn test_alignment_change_resets_priority() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = SleepState::new(SleepAlignment::RandomOnce, 10);
        state.slot_order(CellId(0), 10, None, &mut rng).unwrap();
        state.set_alignment(SleepAlignment::None);
        assert_eq!(
            state.slot_order(CellId(0), 10, None, &mut rng).unwrap(),
            (0..10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_ranked_alignment_requires_capacity() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut state = SleepState::new(SleepAlignment::Sinr, 4);
        assert!(state.needs_capacity());
        assert!(state.slot_order(CellId(0), 4, None, &mut rng).is_err());
        let order = state
            .slot_order(CellId(0), 4, Some(&[1.0, 4.0, 2.0, 3.0]), &mut rng)
            .unwrap();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }
}
