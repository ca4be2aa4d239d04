//! # Configuration System
//!
//! YAML configuration of a simulation run:
//!
//! - World layout (tiers, site spacing, sectors, mobile population)
//! - Physical layer (resource grid, carrier, bandwidth, power limit)
//! - Base-station power model (`p0`, `m`, `pS`)
//! - Scheduling policy, sleep alignment and initial cell power
//! - Experiment settings (repetitions, seed, output directory)
//! - Logging
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `RAPS_CONFIG` environment variable
//! 2. `./raps.yaml` (current directory)
//! 3. `~/.config/raps/config.yaml` (user config)
//! 4. `/etc/raps/raps.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! world:
//!   tiers: 2
//!   inter_site_distance: 500
//!   users_per_cell: 10
//!
//! phy:
//!   frequency_chunks: 50
//!   timeslots: 10
//!
//! scheduling:
//!   policy: dtx
//!   sleep_alignment: dtx_segregation
//!   user_rate: 1.0e6
//! ```

use crate::numeric::dbm_to_watts;
use crate::observe::logging::LogConfig;
use crate::types::RapsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadError(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for RapsError {
    fn from(err: ConfigError) -> Self {
        RapsError::Config(err.to_string())
    }
}

/// Network layout and mobile population.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Rings of hexagons around the central one
    pub tiers: usize,
    /// Inner rings whose cells and mobiles are evaluated
    pub considered_tiers: usize,
    /// Distance between neighbouring sites in meters
    pub inter_site_distance: f64,
    /// Sectors per base station (1 or 3)
    pub sectors_per_bs: usize,
    pub users_per_cell: usize,
    /// Mobiles kept in the central hexagon (0 disables the fix-up)
    pub center_cell_users: usize,
    /// Log-normal shadowing standard deviation in dB
    pub shadowing_std_db: f64,
    /// Minimum distance between a mobile and any base station in meters
    pub forbidden_distance: f64,
    /// Mobile speed in m/s
    pub mobile_velocity: f64,
    pub frequency_selective_fading: bool,
    pub boltzmann_constant: f64,
    /// Receiver temperature in Kelvin
    pub temperature: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tiers: 3,
            considered_tiers: 1,
            inter_site_distance: 500.0,
            sectors_per_bs: 3,
            users_per_cell: 10,
            center_cell_users: 10,
            shadowing_std_db: 8.0,
            forbidden_distance: 35.0,
            mobile_velocity: 0.0,
            frequency_selective_fading: true,
            boltzmann_constant: 4e-23,
            temperature: 290.0,
        }
    }
}

/// OFDMA frame and radio parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyConfig {
    /// Frequency chunks per frame (N)
    pub frequency_chunks: usize,
    /// Timeslots per frame (T)
    pub timeslots: usize,
    /// Frames simulated per repetition
    pub iterations: usize,
    /// Maximum transmit power per cell in dBm
    pub p_max_dbm: f64,
    /// Carrier frequency in Hz
    pub center_frequency: f64,
    /// Frame duration in seconds
    pub simulation_time: f64,
    /// System bandwidth in Hz
    pub system_bandwidth: f64,
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            frequency_chunks: 50,
            timeslots: 10,
            iterations: 10,
            p_max_dbm: 46.0,
            center_frequency: 2e9,
            simulation_time: 0.1,
            system_bandwidth: 1e7,
        }
    }
}

impl PhyConfig {
    /// Maximum transmit power in Watts.
    pub fn p_max(&self) -> f64 {
        dbm_to_watts(self.p_max_dbm)
    }

    /// Bandwidth of one frequency chunk in Hz.
    pub fn chunk_bandwidth(&self) -> f64 {
        self.system_bandwidth / self.frequency_chunks as f64
    }

    /// Duration of one timeslot in seconds.
    pub fn slot_duration(&self) -> f64 {
        self.simulation_time / self.timeslots as f64
    }
}

/// Base-station supply power model: `p0 + m * Ptx` while active, `pS` asleep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerModelConfig {
    /// Supply power at zero load in Watts
    pub p0: f64,
    /// Load factor
    pub m: f64,
    /// Supply power while asleep in Watts
    pub p_s: f64,
}

impl Default for PowerModelConfig {
    fn default() -> Self {
        Self {
            p0: 200.0,
            m: 3.75,
            p_s: 90.0,
        }
    }
}

/// Scheduling policy run in every cell each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Bandwidth adaptation at flat power
    Ba,
    /// Bit loading with sleep alignment
    Dtx,
    /// Proportional fair at flat power
    Pf,
    /// Power-controlled proportional fair
    PfBa,
    /// Proportional fair freeing whole timeslots
    PfDtx,
    /// Optimizer, quantization and inverse water-filling
    Raps,
}

impl Default for Policy {
    fn default() -> Self {
        Policy::Dtx
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Policy::Ba => "ba",
            Policy::Dtx => "dtx",
            Policy::Pf => "pf",
            Policy::PfBa => "pf_ba",
            Policy::PfDtx => "pf_dtx",
            Policy::Raps => "raps",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Policy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(s).map_err(|_| ConfigError::ValidationError(format!("unknown policy '{s}'")))
    }
}

/// How a cell orders its timeslots when bit loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepAlignment {
    /// Timeslots in natural order
    None,
    /// Natural order rolled by a random offset drawn once
    RandomShiftOnce,
    /// Natural order rolled by a fresh random offset every frame
    RandomShiftIter,
    /// Random permutation drawn once
    RandomOnce,
    /// Fresh random permutation every frame
    RandomIter,
    /// Ranked by achievable capacity
    Sinr,
    /// Fixed reuse-3 table keyed by cell id
    Static,
    /// Score-based segregation learned across frames
    DtxSegregation,
}

impl Default for SleepAlignment {
    fn default() -> Self {
        SleepAlignment::None
    }
}

/// Transmit power of a cell before its first scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialPower {
    Zero,
    /// Random split of the power limit per timeslot
    Random,
    Full,
}

impl Default for InitialPower {
    fn default() -> Self {
        InitialPower::Full
    }
}

/// Scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    pub policy: Policy,
    pub sleep_alignment: SleepAlignment,
    pub initial_power: InitialPower,
    /// Target rate per mobile in bit/s
    pub user_rate: f64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            sleep_alignment: SleepAlignment::default(),
            initial_power: InitialPower::default(),
            user_rate: 1e6,
        }
    }
}

/// Experiment driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Independent worlds simulated
    pub repetitions: usize,
    /// Base seed; repetition `r` uses `seed + r`
    pub seed: u64,
    /// Directory receiving result artifacts
    pub output_dir: PathBuf,
    /// Precomputed world snapshot to load instead of generating one
    pub load_world: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            repetitions: 1,
            seed: 0,
            output_dir: PathBuf::from("out"),
            load_world: None,
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub world: WorldConfig,
    pub phy: PhyConfig,
    pub power: PowerModelConfig,
    pub scheduling: SchedulingConfig,
    pub experiment: ExperimentConfig,
    pub logging: LogConfig,
}

impl SimConfig {
    /// Load configuration from the default search path.
    ///
    /// Search order:
    /// 1. `RAPS_CONFIG` environment variable
    /// 2. `./raps.yaml`
    /// 3. `~/.config/raps/config.yaml`
    /// 4. `/etc/raps/raps.yaml`
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("RAPS_CONFIG") {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        for path in &Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_yaml()?)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./raps.yaml")];

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "raps") {
            paths.push(config_dir.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/raps/raps.yaml"));

        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if !matches!(self.world.sectors_per_bs, 1 | 3) {
            return invalid("sectors_per_bs must be 1 or 3");
        }
        if self.world.considered_tiers > self.world.tiers {
            return invalid("considered_tiers must not exceed tiers");
        }
        if self.world.inter_site_distance <= 0.0 {
            return invalid("inter_site_distance must be positive");
        }
        if 2.0 * self.world.forbidden_distance >= self.inter_hex_distance() {
            return Err(ConfigError::ValidationError(format!(
                "forbidden_distance {} leaves no room between sites {} m apart",
                self.world.forbidden_distance,
                self.inter_hex_distance()
            )));
        }
        if self.world.temperature <= 0.0 || self.world.boltzmann_constant <= 0.0 {
            return invalid("temperature and boltzmann_constant must be positive");
        }
        if self.world.mobile_velocity < 0.0 || self.world.shadowing_std_db < 0.0 {
            return invalid("mobile_velocity and shadowing_std_db must not be negative");
        }

        if self.phy.frequency_chunks == 0 || self.phy.timeslots == 0 || self.phy.iterations == 0 {
            return invalid("frequency_chunks, timeslots and iterations must be > 0");
        }
        if self.phy.system_bandwidth <= 0.0 || self.phy.simulation_time <= 0.0 || self.phy.center_frequency <= 0.0 {
            return invalid("system_bandwidth, simulation_time and center_frequency must be positive");
        }

        let p = &self.power;
        if p.p0 < 0.0 || p.m < 0.0 || p.p_s < 0.0 {
            return invalid("power model constants must not be negative");
        }
        if self.scheduling.user_rate < 0.0 {
            return invalid("user_rate must not be negative");
        }
        if self.experiment.repetitions == 0 {
            return invalid("repetitions must be > 0");
        }

        Ok(())
    }

    /// Thermal noise power over the system bandwidth in Watts.
    pub fn system_noise_power(&self) -> f64 {
        self.world.boltzmann_constant * self.phy.system_bandwidth * self.world.temperature
    }

    /// Distance between neighbouring hexagon centers.
    ///
    /// Equals the site distance for omni sites; three-sector sites serve
    /// three smaller hexagons each.
    pub fn inter_hex_distance(&self) -> f64 {
        if self.world.sectors_per_bs == 3 {
            self.world.inter_site_distance * 3f64.sqrt() / 3.0
        } else {
            self.world.inter_site_distance
        }
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            scheduling: SchedulingConfig {
                sleep_alignment: SleepAlignment::DtxSegregation,
                ..Default::default()
            },
            experiment: ExperimentConfig {
                repetitions: 4,
                seed: 2012,
                ..Default::default()
            },
            ..Default::default()
        };

        config.to_yaml().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.world.tiers, 3);
        assert_eq!(config.phy.frequency_chunks, 50);
        assert_eq!(config.scheduling.policy, Policy::Dtx);
        assert_eq!(config.scheduling.initial_power, InitialPower::Full);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
world:
  tiers: 2
  sectors_per_bs: 1
  frequency_selective_fading: false

phy:
  timeslots: 20
  p_max_dbm: 43

power:
  p0: 100
  m: 2.4
  p_s: 50

scheduling:
  policy: pf_ba
  sleep_alignment: random_shift_iter
  initial_power: zero
"#;

        let config = SimConfig::parse(yaml).unwrap();
        assert_eq!(config.world.tiers, 2);
        assert_eq!(config.world.sectors_per_bs, 1);
        assert!(!config.world.frequency_selective_fading);
        assert_eq!(config.phy.timeslots, 20);
        assert_eq!(config.power.p_s, 50.0);
        assert_eq!(config.scheduling.policy, Policy::PfBa);
        assert_eq!(config.scheduling.sleep_alignment, SleepAlignment::RandomShiftIter);
        assert_eq!(config.scheduling.initial_power, InitialPower::Zero);
        // untouched sections keep their defaults
        assert_eq!(config.phy.frequency_chunks, 50);
        assert_eq!(config.experiment.repetitions, 1);
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        let yaml = "scheduling:\n  policy: greedy\n";
        assert!(matches!(SimConfig::parse(yaml), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = SimConfig::default();
        config.world.sectors_per_bs = 2;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.world.forbidden_distance = 200.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.phy.timeslots = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.world.considered_tiers = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_quantities() {
        let mut config = SimConfig::default();
        assert_relative_eq!(config.inter_hex_distance(), 500.0 / 3f64.sqrt(), max_relative = 1e-12);
        config.world.sectors_per_bs = 1;
        assert_relative_eq!(config.inter_hex_distance(), 500.0);
        assert_relative_eq!(config.system_noise_power(), 4e-23 * 1e7 * 290.0, max_relative = 1e-12);
        assert_relative_eq!(config.phy.p_max(), 39.810717055, max_relative = 1e-9);
        assert_relative_eq!(config.phy.chunk_bandwidth(), 2e5);
        assert_relative_eq!(config.phy.slot_duration(), 0.01);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("raps".parse::<Policy>().unwrap(), Policy::Raps);
        assert_eq!("pf_dtx".parse::<Policy>().unwrap(), Policy::PfDtx);
        assert!("fastest".parse::<Policy>().is_err());
        assert_eq!(Policy::PfBa.to_string(), "pf_ba");
    }

    #[test]
    fn test_example_yaml_roundtrip() {
        let yaml = SimConfig::example_yaml();
        assert!(yaml.contains("world:"));
        assert!(yaml.contains("dtx_segregation"));
        let parsed = SimConfig::parse(&yaml).unwrap();
        assert_eq!(parsed.experiment.seed, 2012);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raps.yaml");
        let mut config = SimConfig::default();
        config.world.users_per_cell = 4;
        config.save(&path).unwrap();
        let loaded = SimConfig::load_from(&path).unwrap();
        assert_eq!(loaded.world.users_per_cell, 4);
        assert!(SimConfig::load_from(&dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_config_search_paths() {
        let paths = SimConfig::config_search_paths();
        assert!(paths[0].ends_with("raps.yaml"));
        assert!(paths.last().unwrap().starts_with("/etc/raps"));
    }
}
