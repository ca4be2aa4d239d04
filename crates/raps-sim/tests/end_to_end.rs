//! End-to-end runs of small experiments.

use raps_core::config::{InitialPower, Policy, SimConfig, SleepAlignment};
use raps_sim::experiment::{run_frames, Experiment};
use raps_sim::results::{CsvSink, MemorySink, ResultSink};
use raps_sim::World;

fn small(policy: Policy) -> SimConfig {
    let mut config = SimConfig::default();
    config.world.tiers = 1;
    config.world.considered_tiers = 0;
    config.world.sectors_per_bs = 1;
    config.world.users_per_cell = 3;
    config.world.center_cell_users = 4;
    config.phy.frequency_chunks = 8;
    config.phy.timeslots = 5;
    config.phy.iterations = 3;
    config.scheduling.policy = policy;
    config.scheduling.user_rate = 5e4;
    config.experiment.repetitions = 2;
    config.experiment.seed = 11;
    config
}

#[test]
fn every_policy_completes() {
    for policy in [Policy::Ba, Policy::Dtx, Policy::Pf, Policy::PfBa, Policy::PfDtx, Policy::Raps] {
        let summary = Experiment::new(small(policy)).unwrap().run().unwrap();
        assert_eq!(summary.repetitions.len(), 2, "{policy}");
        for r in &summary.repetitions {
            assert_eq!(r.supply.len(), 4, "{policy}");
            assert_eq!(r.misses.len(), 3, "{policy}");
        }
    }
}

#[test]
fn csv_artifacts_land_in_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small(Policy::Dtx);
    config.experiment.output_dir = dir.path().join("dtx");
    let summary = Experiment::new(config.clone()).unwrap().run().unwrap();

    let mut sink = CsvSink::new(&config.experiment.output_dir).unwrap();
    summary.write(&mut sink).unwrap();
    for name in [
        "result_dtx",
        "sumrate_dtx",
        "delivered_individual",
        "delivered_final",
        "delivered_per_mobile",
        "mobile_sinrs",
        "mobile_eff_sinrs",
        "wideband_mobile_sinrs",
        "result_miss",
    ] {
        assert!(sink.path(name).exists(), "{name}");
    }
    let result = std::fs::read_to_string(sink.path("result_dtx")).unwrap();
    // axis row plus one row per repetition
    assert_eq!(result.lines().count(), 3);
}

#[test]
fn light_dtx_load_saves_power_over_full_transmission() {
    let mut config = small(Policy::Dtx);
    config.scheduling.user_rate = 1e4;
    config.scheduling.initial_power = InitialPower::Full;
    config.scheduling.sleep_alignment = SleepAlignment::Sinr;
    let experiment = Experiment::new(config).unwrap();
    let result = experiment.run_repetition(0).unwrap();
    let full = result.supply[0];
    for &supply in &result.supply[1..] {
        assert!(supply < full, "{supply} vs {full}");
    }
}

#[test]
fn snapshot_reloads_into_same_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.json");
    let config = small(Policy::PfDtx);
    let mut world = World::build(config.clone(), 3).unwrap();
    world.associate_pathlosses().unwrap();
    world.calculate_sinrs().unwrap();
    world.save(&path).unwrap();

    let mut reloaded = World::load(&path, 3).unwrap();
    assert_eq!(reloaded.cells().len(), world.cells().len());
    assert_eq!(reloaded.mobiles().len(), world.mobiles().len());
    for (a, b) in reloaded.mobiles().iter().zip(world.mobiles()) {
        assert_eq!(a.serving_cell(), b.serving_cell());
    }

    let result = run_frames(&mut reloaded, 0, f64::NAN).unwrap();
    let mut sink = MemorySink::new();
    sink.write_matrix("supply", &[result.supply.clone()]).unwrap();
    assert_eq!(sink.artifact("supply").unwrap()[0].len(), 4);
}
