//! Cell (sector) state: transmit power and allocation on every resource block.

use super::sleep::SleepState;
use super::{BsId, CellId, MobileId};
use raps_core::config::{InitialPower, SleepAlignment};
use raps_core::types::{Position, RapsError, RapsResult, ResourceGrid};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-antenna transmit power on every resource block, in Watts.
///
/// Antenna powers of one block are contiguous so the SINR engine can read
/// them as a slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerGrid {
    antennas: usize,
    chunks: usize,
    timeslots: usize,
    data: Vec<f64>,
}

impl PowerGrid {
    pub fn zeros(antennas: usize, chunks: usize, timeslots: usize) -> Self {
        Self {
            antennas,
            chunks,
            timeslots,
            data: vec![0.0; antennas * chunks * timeslots],
        }
    }

    /// `p_max / chunks / antennas` on every block.
    pub fn full(antennas: usize, chunks: usize, timeslots: usize, p_max: f64) -> Self {
        let mut grid = Self::zeros(antennas, chunks, timeslots);
        grid.data.fill(p_max / chunks as f64 / antennas as f64);
        grid
    }

    /// Every timeslot spends exactly `p_max`, split at random over chunks
    /// and antennas.
    pub fn random<R: Rng + ?Sized>(antennas: usize, chunks: usize, timeslots: usize, p_max: f64, rng: &mut R) -> Self {
        let mut grid = Self::zeros(antennas, chunks, timeslots);
        for t in 0..timeslots {
            let draws: Vec<f64> = (0..antennas * chunks).map(|_| rng.gen::<f64>()).collect();
            let total: f64 = draws.iter().sum();
            for a in 0..antennas {
                for n in 0..chunks {
                    let share = if total > 0.0 { draws[a * chunks + n] / total } else { 0.0 };
                    grid.set(a, n, t, p_max * share);
                }
            }
        }
        grid
    }

    pub fn initial<R: Rng + ?Sized>(
        policy: InitialPower,
        antennas: usize,
        chunks: usize,
        timeslots: usize,
        p_max: f64,
        rng: &mut R,
    ) -> Self {
        match policy {
            InitialPower::Zero => Self::zeros(antennas, chunks, timeslots),
            InitialPower::Random => Self::random(antennas, chunks, timeslots, p_max, rng),
            InitialPower::Full => Self::full(antennas, chunks, timeslots, p_max),
        }
    }

    pub fn antennas(&self) -> usize {
        self.antennas
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn timeslots(&self) -> usize {
        self.timeslots
    }

    #[inline]
    fn offset(&self, n: usize, t: usize) -> usize {
        (n * self.timeslots + t) * self.antennas
    }

    /// Antenna powers of block `(n, t)`.
    #[inline]
    pub fn block(&self, n: usize, t: usize) -> &[f64] {
        let o = self.offset(n, t);
        &self.data[o..o + self.antennas]
    }

    #[inline]
    pub fn get(&self, antenna: usize, n: usize, t: usize) -> f64 {
        self.data[self.offset(n, t) + antenna]
    }

    #[inline]
    pub fn set(&mut self, antenna: usize, n: usize, t: usize, value: f64) {
        let o = self.offset(n, t);
        self.data[o + antenna] = value;
    }

    /// Split `total` evenly over the antennas of block `(n, t)`.
    pub fn set_block_total(&mut self, n: usize, t: usize, total: f64) {
        let per_antenna = total / self.antennas as f64;
        let o = self.offset(n, t);
        self.data[o..o + self.antennas].fill(per_antenna);
    }

    /// Power summed over antennas on block `(n, t)`.
    pub fn block_total(&self, n: usize, t: usize) -> f64 {
        self.block(n, t).iter().sum()
    }

    /// Power summed over antennas and chunks in timeslot `t`.
    pub fn timeslot_total(&self, t: usize) -> f64 {
        (0..self.chunks).map(|n| self.block_total(n, t)).sum()
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// One sector of a base station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub bs: BsId,
    /// Center of the hexagon this cell covers; sets the antenna boresight.
    pub center: Position,
    pub antennas: usize,
    /// Transmit power limit in Watts.
    pub p_max: f64,
    power: PowerGrid,
    outmap: ResourceGrid<Option<MobileId>>,
    mobiles: BTreeSet<MobileId>,
    neighbors: BTreeSet<CellId>,
    sleep: SleepState,
}

impl Cell {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        id: CellId,
        bs: BsId,
        center: Position,
        antennas: usize,
        p_max: f64,
        chunks: usize,
        timeslots: usize,
        initial_power: InitialPower,
        sleep_alignment: SleepAlignment,
        rng: &mut R,
    ) -> Self {
        Self {
            id,
            bs,
            center,
            antennas,
            p_max,
            power: PowerGrid::initial(initial_power, antennas, chunks, timeslots, p_max, rng),
            outmap: ResourceGrid::filled(chunks, timeslots, None),
            mobiles: BTreeSet::new(),
            neighbors: BTreeSet::new(),
            sleep: SleepState::new(sleep_alignment, timeslots),
        }
    }

    pub fn power(&self) -> &PowerGrid {
        &self.power
    }

    pub fn power_mut(&mut self) -> &mut PowerGrid {
        &mut self.power
    }

    /// Which mobile each resource block is allocated to.
    pub fn outmap(&self) -> &ResourceGrid<Option<MobileId>> {
        &self.outmap
    }

    /// Replace power profile and allocation after a scheduling decision.
    pub fn apply_schedule(&mut self, power: PowerGrid, outmap: ResourceGrid<Option<MobileId>>) -> RapsResult<()> {
        if power.chunks() != self.power.chunks()
            || power.timeslots() != self.power.timeslots()
            || power.antennas() != self.antennas
        {
            return Err(RapsError::DimensionMismatch {
                expected: self.power.data.len(),
                actual: power.data.len(),
            });
        }
        if outmap.len() != self.outmap.len() {
            return Err(RapsError::DimensionMismatch {
                expected: self.outmap.len(),
                actual: outmap.len(),
            });
        }
        self.power = power;
        self.outmap = outmap;
        Ok(())
    }

    /// Stop transmitting and drop every allocation.
    pub fn power_down(&mut self) {
        self.power.fill(0.0);
        self.outmap.fill(None);
    }

    pub fn mobiles(&self) -> &BTreeSet<MobileId> {
        &self.mobiles
    }

    pub fn attach(&mut self, mobile: MobileId) {
        self.mobiles.insert(mobile);
    }

    pub fn detach(&mut self, mobile: MobileId) -> bool {
        self.mobiles.remove(&mobile)
    }

    pub fn neighbors(&self) -> &BTreeSet<CellId> {
        &self.neighbors
    }

    pub fn set_neighbors(&mut self, neighbors: BTreeSet<CellId>) {
        self.neighbors = neighbors;
    }

    pub fn sleep(&self) -> &SleepState {
        &self.sleep
    }

    pub fn sleep_mut(&mut self) -> &mut SleepState {
        &mut self.sleep
    }

    pub fn chunks(&self) -> usize {
        self.power.chunks()
    }

    pub fn timeslots(&self) -> usize {
        self.power.timeslots()
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cell {}", self.id.index())
    }
}
