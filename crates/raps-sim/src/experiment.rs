//! Multi-frame experiments over independent worlds.
//!
//! One repetition builds (or loads) a world and runs the configured policy
//! in every cell for `iterations` frames. Between frames the fading moves
//! on and SINRs are recomputed under the powers the cells just chose, so
//! each frame reacts to the interference of the previous one.
//!
//! Repetitions share nothing and run on the rayon pool, each with its own
//! world seeded by `seed + repetition`.

use crate::entities::CellId;
use crate::policies::{achieved_capacity_in_cell, run_policy, PolicyOutcome};
use crate::results::ResultSink;
use crate::world::World;
use raps_core::config::{InitialPower, Policy, SimConfig};
use raps_core::types::{RapsError, RapsResult};
use rayon::prelude::*;
use tracing::{info, warn};

/// Metrics of one repetition. Per-frame vectors start with the state before
/// the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionResult {
    pub repetition: usize,
    /// Mean supply power over the considered cells, W.
    pub supply: Vec<f64>,
    /// Bits delivered in the considered cells.
    pub delivered: Vec<f64>,
    /// Continuous optimum averaged over the considered cells, RAPS only.
    pub objective: Vec<f64>,
    /// Cells missing their target, per frame.
    pub misses: Vec<usize>,
    /// Bits per considered mobile, per frame.
    pub delivered_per_mobile: Vec<Vec<f64>>,
    /// Scheduled SINR samples of the considered mobiles, per frame.
    pub sinrs: Vec<Vec<f64>>,
    /// Unit-power stream SINR samples, before the first frame and after each.
    pub effective_sinrs: Vec<Vec<f64>>,
    /// Wideband SINR of the considered mobiles before the first frame.
    pub wideband_sinrs: Vec<f64>,
}

/// All repetitions of one experiment.
#[derive(Debug, Clone)]
pub struct ExperimentSummary {
    pub policy: Policy,
    pub repetitions: Vec<RepetitionResult>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

impl ExperimentSummary {
    /// Mean supply power in the last frame.
    pub fn final_supply(&self) -> f64 {
        mean(self.repetitions.iter().filter_map(|r| r.supply.last().copied()))
    }

    /// Mean delivered bits in the last frame.
    pub fn final_delivered(&self) -> f64 {
        mean(self.repetitions.iter().filter_map(|r| r.delivered.last().copied()))
    }

    /// Missed cell targets per frame, summed over repetitions.
    pub fn misses(&self) -> Vec<usize> {
        let frames = self.repetitions.first().map_or(0, |r| r.misses.len());
        (0..frames)
            .map(|i| self.repetitions.iter().map(|r| r.misses[i]).sum())
            .collect()
    }

    fn with_axis(&self, column: impl Fn(&RepetitionResult) -> &Vec<f64>) -> Vec<Vec<f64>> {
        let frames = self.repetitions.first().map_or(0, |r| column(r).len());
        let mut rows = vec![(1..=frames).map(|i| i as f64).collect::<Vec<_>>()];
        rows.extend(self.repetitions.iter().map(|r| column(r).clone()));
        rows
    }

    fn per_frame_samples(&self, samples: impl Fn(&RepetitionResult) -> &Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        let frames = self.repetitions.first().map_or(0, |r| samples(r).len());
        (0..frames)
            .map(|i| self.repetitions.iter().flat_map(|r| samples(r)[i].iter().copied()).collect())
            .collect()
    }

    /// Hand every artifact to `sink`.
    pub fn write(&self, sink: &mut dyn ResultSink) -> RapsResult<()> {
        let policy = self.policy;
        sink.write_matrix(&format!("result_{policy}"), &self.with_axis(|r| &r.supply))?;
        sink.write_scalar(&format!("sumrate_{policy}"), self.final_supply())?;
        sink.write_matrix("delivered_individual", &self.with_axis(|r| &r.delivered))?;
        sink.write_scalar("delivered_final", self.final_delivered())?;
        sink.write_rows("delivered_per_mobile", &self.per_frame_samples(|r| &r.delivered_per_mobile))?;
        sink.write_rows("mobile_sinrs", &self.per_frame_samples(|r| &r.sinrs))?;
        sink.write_rows("mobile_eff_sinrs", &self.per_frame_samples(|r| &r.effective_sinrs))?;
        let wideband: Vec<Vec<f64>> = self.repetitions.iter().map(|r| r.wideband_sinrs.clone()).collect();
        sink.write_rows("wideband_mobile_sinrs", &wideband)?;
        let misses: Vec<Vec<f64>> = self.misses().into_iter().map(|m| vec![m as f64]).collect();
        sink.write_matrix("result_miss", &misses)?;
        if policy == Policy::Raps {
            sink.write_matrix("objective", &self.with_axis(|r| &r.objective))?;
        }
        Ok(())
    }
}

/// Runs repetitions of one configuration.
#[derive(Debug, Clone)]
pub struct Experiment {
    config: SimConfig,
}

impl Experiment {
    /// Fails on an invalid configuration before any world is built.
    pub fn new(config: SimConfig) -> RapsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// World of repetition `repetition`, associated, with SINRs and the
    /// configured center-cell population.
    pub fn prepare_world(&self, repetition: usize) -> RapsResult<World> {
        let seed = self.config.experiment.seed.wrapping_add(repetition as u64);
        match self.config.experiment.load_world {
            Some(ref path) => {
                info!(path = %path.display(), repetition, "loading world");
                let mut world = World::load(path, seed)?;
                world.update_operating_parameters(self.config.power, self.config.scheduling.sleep_alignment);
                world.config.scheduling = self.config.scheduling.clone();
                Ok(world)
            }
            None => {
                let mut world = World::build(self.config.clone(), seed)?;
                world.associate_pathlosses()?;
                world.calculate_sinrs()?;
                world.fix_center_cell_users(self.config.world.center_cell_users)?;
                Ok(world)
            }
        }
    }

    /// Supply power attributed to the frame before the first decision.
    fn initial_supply(&self) -> f64 {
        let p = &self.config.power;
        match self.config.scheduling.initial_power {
            InitialPower::Zero => p.p_s,
            InitialPower::Full => p.p0 + p.m * self.config.phy.p_max(),
            InitialPower::Random => f64::NAN,
        }
    }

    pub fn run_repetition(&self, repetition: usize) -> RapsResult<RepetitionResult> {
        let mut world = self.prepare_world(repetition)?;
        run_frames(&mut world, repetition, self.initial_supply())
    }

    /// All repetitions in parallel.
    pub fn run(&self) -> RapsResult<ExperimentSummary> {
        let repetitions = self.config.experiment.repetitions;
        info!(repetitions, policy = %self.config.scheduling.policy, "starting experiment");
        let results = (0..repetitions)
            .into_par_iter()
            .map(|r| self.run_repetition(r))
            .collect::<RapsResult<Vec<_>>>()?;
        Ok(ExperimentSummary {
            policy: self.config.scheduling.policy,
            repetitions: results,
        })
    }
}

fn effective_samples(world: &World) -> Vec<f64> {
    world
        .considered_mobiles()
        .iter()
        .flat_map(|m| m.effective_sinr().iter().flat_map(|g| g.iter().copied()))
        .collect()
}

fn scheduled_samples(world: &World) -> Vec<f64> {
    world
        .considered_mobiles()
        .iter()
        .filter_map(|m| {
            let cell = world.cell(m.serving_cell()?).ok()?;
            Some(m.scheduled_sinr(cell))
        })
        .flat_map(|grids| grids.into_iter().flat_map(|g| g.as_slice().to_vec()))
        .collect()
}

/// Run the configured number of frames on a prepared world.
pub fn run_frames(world: &mut World, repetition: usize, initial_supply: f64) -> RapsResult<RepetitionResult> {
    let policy = world.config().scheduling.policy;
    let iterations = world.config().phy.iterations;
    let cells: Vec<CellId> = world.cells().iter().map(|c| c.id).collect();
    let considered = world.considered_cells();

    let mut result = RepetitionResult {
        repetition,
        supply: vec![initial_supply],
        delivered: vec![f64::NAN],
        objective: vec![f64::NAN],
        misses: Vec::with_capacity(iterations),
        delivered_per_mobile: Vec::with_capacity(iterations),
        sinrs: Vec::with_capacity(iterations),
        effective_sinrs: vec![effective_samples(world)],
        wideband_sinrs: world.considered_mobiles().iter().map(|m| m.wideband_sinr()).collect(),
    };

    for i in 1..=iterations {
        info!(repetition, iteration = i, cells = ?considered, "frame");
        let mut supplies = Vec::new();
        let mut objectives = Vec::new();
        for &cell in &cells {
            let outcome = match run_policy(world, policy, cell) {
                Ok(outcome) => Some(outcome),
                Err(RapsError::EmptyCell(_)) => {
                    info!(%cell, "no mobile in cell, powering down");
                    world.cells[cell.index()].power_down();
                    None
                }
                Err(e) if e.is_recoverable() => {
                    warn!(%cell, error = %e, "no schedule this frame");
                    Some(PolicyOutcome::Overload)
                }
                Err(e) => return Err(e),
            };
            if let (Some(outcome), true) = (outcome, considered.contains(&cell)) {
                supplies.push(outcome.supply());
                objectives.push(outcome.objective().unwrap_or(f64::NAN));
            }
        }
        result.supply.push(mean(supplies.into_iter()));
        result.objective.push(mean(objectives.into_iter()));

        if i != iterations {
            world.update_fsf(i)?;
        }
        world.calculate_sinrs()?;
        result.sinrs.push(scheduled_samples(world));
        result.effective_sinrs.push(effective_samples(world));

        let rate = world.config().scheduling.user_rate;
        let frame = world.config().phy.simulation_time;
        let mut delivered = 0.0;
        let mut per_mobile = Vec::new();
        let mut misses = 0;
        for &cell in &cells {
            let target = rate * world.cell(cell)?.mobiles().len() as f64 * frame;
            let (achieved, by_mobile) = achieved_capacity_in_cell(world, cell)?;
            if considered.contains(&cell) {
                delivered += achieved;
                per_mobile.extend(by_mobile.values().copied());
            }
            let verdict = if target > achieved { "miss" } else { "pass" };
            info!(%cell, target, achieved, verdict, "target vs achieved");
            if target > achieved {
                misses += 1;
            }
        }
        result.delivered.push(delivered);
        result.delivered_per_mobile.push(per_mobile);
        result.misses.push(misses);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::MemorySink;
    use raps_core::config::SleepAlignment;

    fn config(policy: Policy) -> SimConfig {
        let mut config = SimConfig::default();
        config.world.tiers = 1;
        config.world.considered_tiers = 0;
        config.world.sectors_per_bs = 1;
        config.world.users_per_cell = 3;
        config.world.center_cell_users = 3;
        config.phy.frequency_chunks = 6;
        config.phy.timeslots = 4;
        config.phy.iterations = 2;
        config.scheduling.policy = policy;
        config.scheduling.user_rate = 1e4;
        config.scheduling.sleep_alignment = SleepAlignment::RandomShiftIter;
        config.experiment.repetitions = 2;
        config.experiment.seed = 7;
        config
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bad = config(Policy::Dtx);
        bad.phy.timeslots = 0;
        assert!(matches!(Experiment::new(bad), Err(RapsError::Config(_))));
    }

    #[test]
    fn test_repetition_shapes() {
        let experiment = Experiment::new(config(Policy::Dtx)).unwrap();
        let result = experiment.run_repetition(0).unwrap();
        assert_eq!(result.supply.len(), 3);
        assert_eq!(result.delivered.len(), 3);
        assert!(result.delivered[0].is_nan());
        assert_eq!(result.misses.len(), 2);
        assert_eq!(result.sinrs.len(), 2);
        assert_eq!(result.effective_sinrs.len(), 3);
        let p = &experiment.config().power;
        assert_eq!(result.supply[0], p.p0 + p.m * experiment.config().phy.p_max());
        assert!(result.delivered[1] > 0.0);
    }

    #[test]
    fn test_repetitions_are_reproducible() {
        let experiment = Experiment::new(config(Policy::PfBa)).unwrap();
        let a = experiment.run_repetition(1).unwrap();
        let b = experiment.run_repetition(1).unwrap();
        assert_eq!(a.delivered, b.delivered);
        assert_eq!(a.misses, b.misses);
    }

    #[test]
    fn test_summary_artifacts() {
        let experiment = Experiment::new(config(Policy::Raps)).unwrap();
        let summary = experiment.run().unwrap();
        assert_eq!(summary.repetitions.len(), 2);
        let mut sink = MemorySink::new();
        summary.write(&mut sink).unwrap();

        let result = sink.artifact("result_raps").unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], vec![1.0, 2.0, 3.0]);
        assert!(sink.artifact("objective").is_some());
        assert_eq!(sink.artifact("result_miss").unwrap().len(), 2);
        assert_eq!(sink.artifact("mobile_eff_sinrs").unwrap().len(), 3);
        assert!(sink.scalar("sumrate_raps").is_some());
    }

    #[test]
    fn test_loaded_world_takes_new_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        let experiment = Experiment::new(config(Policy::Dtx)).unwrap();
        experiment.prepare_world(0).unwrap().save(&path).unwrap();

        let mut loaded = config(Policy::Ba);
        loaded.power.p_s = 10.0;
        loaded.experiment.load_world = Some(path);
        let experiment = Experiment::new(loaded).unwrap();
        let world = experiment.prepare_world(0).unwrap();
        assert_eq!(world.config().power.p_s, 10.0);
        assert_eq!(world.config().scheduling.policy, Policy::Ba);
        assert!(world.base_stations().iter().all(|bs| bs.power.p_s == 10.0));
    }
}
