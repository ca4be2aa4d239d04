//! # RAPS Network Simulator
//!
//! Monte Carlo simulation of a multi-cell OFDMA downlink in which every base
//! station minimizes its supply power while serving a fixed rate to each of
//! its mobiles.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Experiment                           │
//! │   rayon: one World per repetition, seeded seed + r           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  World                                                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ BaseStations │  │    Cells     │  │      Mobiles       │  │
//! │  │ power model  │  │ power grid   │  │ links, SINR grids  │  │
//! │  │              │  │ allocation   │  │ average rate       │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  policies: ba · dtx · pf · pf_ba · pf_dtx · raps             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  results: CsvSink · MemorySink                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each frame every cell runs its policy on the SINRs of the previous frame,
//! then fading advances and SINRs are recomputed under the new powers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use raps_core::config::{Policy, SimConfig};
//! use raps_sim::experiment::Experiment;
//! use raps_sim::results::MemorySink;
//!
//! let mut config = SimConfig::default();
//! config.scheduling.policy = Policy::PfDtx;
//! let summary = Experiment::new(config)?.run()?;
//!
//! let mut sink = MemorySink::new();
//! summary.write(&mut sink)?;
//! println!("{:.1} W", summary.final_supply());
//! # Ok::<(), raps_core::RapsError>(())
//! ```

pub mod entities;
pub mod experiment;
pub mod policies;
pub mod results;
pub mod world;

pub use entities::{BaseStation, BsId, Cell, CellId, Mobile, MobileId, PowerGrid};
pub use experiment::{Experiment, ExperimentSummary, RepetitionResult};
pub use policies::{run_policy, PolicyOutcome};
pub use results::{CsvSink, MemorySink, ResultSink};
pub use world::World;
