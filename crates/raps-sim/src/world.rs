//! # World
//!
//! Owns every entity of one simulation run and drives the network state
//! through its lifecycle:
//!
//! ```text
//! build ─► associate_pathlosses ─► calculate_sinrs ─► fix_center_cell_users
//!                                        ▲
//!          schedule every cell ─► update_fsf(i) ─┘   (once per iteration)
//! ```
//!
//! A world is exclusively owned by the thread running its repetition. All
//! randomness flows through the world's own seeded generator, and identifiers
//! come from a factory created with the world, so two worlds built from the
//! same configuration and seed are identical.

use crate::entities::{BaseStation, Cell, CellId, IdFactory, LinkRecord, Mobile, MobileId};
use raps_core::config::{PowerModelConfig, SimConfig, SleepAlignment};
use raps_core::fading::{FadingProfile, FadingRealization};
use raps_core::geometry::{cells_from_tiers, hex_tile_centers, three_sector_sites, Hexagon};
use raps_core::propagation::{antenna_gain_db, correlated_shadowing, correlated_shadowing_row, off_boresight_angle_deg, pathgain};
use raps_core::types::{Position, RapsError, RapsResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Antennas at every cell and every mobile.
pub const ANTENNAS: usize = 2;

/// Attempts to place a mobile that the center cell ends up serving.
const CENTER_PLACEMENT_ATTEMPTS: usize = 10_000;

fn unseeded() -> StdRng {
    StdRng::seed_from_u64(0)
}

/// Network state of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub(crate) config: SimConfig,
    ids: IdFactory,
    hexagons: Vec<Hexagon>,
    /// Indices into `hexagons` inside the considered tiers.
    considered: Vec<usize>,
    pub(crate) base_stations: Vec<BaseStation>,
    pub(crate) cells: Vec<Cell>,
    pub(crate) mobiles: Vec<Mobile>,
    fading: Option<FadingProfile>,
    iteration: usize,
    #[serde(skip, default = "unseeded")]
    pub(crate) rng: StdRng,
}

impl World {
    /// Lay out hexagons, sites, cells and mobiles and draw shadowing.
    ///
    /// Links are not associated yet; call [`World::associate_pathlosses`].
    pub fn build(config: SimConfig, seed: u64) -> RapsResult<Self> {
        let ihd = config.inter_hex_distance();
        if 2.0 * config.world.forbidden_distance > ihd {
            return Err(RapsError::Geometry(format!(
                "forbidden distance {} m is too large for hexagons {ihd} m apart",
                config.world.forbidden_distance
            )));
        }

        let mut world = Self {
            config,
            ids: IdFactory::new(),
            hexagons: Vec::new(),
            considered: Vec::new(),
            base_stations: Vec::new(),
            cells: Vec::new(),
            mobiles: Vec::new(),
            fading: None,
            iteration: 0,
            rng: StdRng::seed_from_u64(seed),
        };
        world.place_hexagons();
        world.place_base_stations()?;
        world.assign_cell_neighbors();
        world.place_mobiles()?;
        world.draw_shadowing()?;
        world.fading = world.fading_profile()?;

        info!(
            tiers = world.config.world.tiers,
            base_stations = world.base_stations.len(),
            cells = world.cells.len(),
            mobiles = world.mobiles.len(),
            "generated world"
        );
        Ok(world)
    }

    fn outer_radius(&self) -> f64 {
        self.config.inter_hex_distance() / 3f64.sqrt()
    }

    fn place_hexagons(&mut self) {
        let outer = self.outer_radius();
        let ihd = self.config.inter_hex_distance();
        self.hexagons = hex_tile_centers(self.config.world.tiers, ihd)
            .into_iter()
            .map(|center| Hexagon::north_south(center, outer))
            .collect();
        let reach = self.config.world.considered_tiers as f64 * 2.0;
        self.considered = self
            .hexagons
            .iter()
            .enumerate()
            .filter(|(_, h)| h.center.norm() < h.inner_radius() * reach + 1.0)
            .map(|(i, _)| i)
            .collect();
    }

    fn add_cell(&mut self, bs: usize, center: Position) {
        let id = self.ids.cell();
        let phy = &self.config.phy;
        let cell = Cell::new(
            id,
            self.base_stations[bs].id,
            center,
            ANTENNAS,
            phy.p_max(),
            phy.frequency_chunks,
            phy.timeslots,
            self.config.scheduling.initial_power,
            self.config.scheduling.sleep_alignment,
            &mut self.rng,
        );
        self.cells.push(cell);
        self.base_stations[bs].cells.push(id);
    }

    fn place_base_stations(&mut self) -> RapsResult<()> {
        let power = self.config.power;
        match self.config.world.sectors_per_bs {
            1 => {
                let centers: Vec<Position> = self.hexagons.iter().map(|h| h.center).collect();
                for center in centers {
                    let id = self.ids.base_station();
                    self.base_stations.push(BaseStation::new(id, center, power));
                    self.add_cell(self.base_stations.len() - 1, center);
                }
            }
            3 => {
                let center_tile = self
                    .hexagons
                    .iter()
                    .find(|h| h.center.norm() < 1.0)
                    .copied()
                    .ok_or_else(|| RapsError::Geometry("no hexagon at the origin".into()))?;
                for site in three_sector_sites(&center_tile, self.config.world.tiers) {
                    let id = self.ids.base_station();
                    self.base_stations.push(BaseStation::new(id, site, power));
                    let bs = self.base_stations.len() - 1;
                    let covered: Vec<Position> = self
                        .hexagons
                        .iter()
                        .filter(|h| h.center.distance_to(&site) < h.outer_radius + 1.0)
                        .map(|h| h.center)
                        .collect();
                    for center in covered {
                        self.add_cell(bs, center);
                    }
                }
            }
            other => {
                return Err(RapsError::Config(format!("unsupported sectors per base station: {other}")));
            }
        }

        for (i, a) in self.base_stations.iter().enumerate() {
            if self.base_stations[i + 1..]
                .iter()
                .any(|b| a.position.distance_to(&b.position) < 1e-6)
            {
                return Err(RapsError::Geometry(format!("two base stations share position {}", a.position)));
            }
        }
        Ok(())
    }

    fn assign_cell_neighbors(&mut self) {
        let limit = self.config.inter_hex_distance() + 1.0;
        let centers: Vec<(CellId, Position)> = self.cells.iter().map(|c| (c.id, c.center)).collect();
        for cell in &mut self.cells {
            let neighbors: BTreeSet<CellId> = centers
                .iter()
                .filter(|(_, p)| {
                    let d = p.distance_to(&cell.center);
                    d > 1.0 && d < limit
                })
                .map(|(id, _)| *id)
                .collect();
            cell.set_neighbors(neighbors);
        }
    }

    fn too_close_to_site(&self, position: &Position) -> bool {
        let forbidden = self.config.world.forbidden_distance;
        self.base_stations
            .iter()
            .any(|bs| bs.position.distance_to(position) < forbidden)
    }

    /// Uniform position within `tiers` rings, away from every site.
    fn uniform_mobile_position(&mut self, tiers: usize) -> Position {
        let outer = self.outer_radius();
        let inner = 0.5 * self.config.inter_hex_distance();
        let x_max = inner * (2 * tiers + 1) as f64;
        let y_max = outer * (1.5 * tiers as f64 + 1.0);
        loop {
            let position = Position::new(
                self.rng.gen_range(-x_max..x_max),
                self.rng.gen_range(-y_max..y_max),
            );
            if self.too_close_to_site(&position) {
                continue;
            }
            if self.hexagons.iter().any(|h| h.contains(&position)) {
                return position;
            }
        }
    }

    fn place_mobiles(&mut self) -> RapsResult<()> {
        let total = self.config.world.users_per_cell * cells_from_tiers(self.config.world.tiers);
        let velocity = self.config.world.mobile_velocity;
        for _ in 0..total {
            let position = self.uniform_mobile_position(self.config.world.tiers);
            let id = self.ids.mobile();
            self.mobiles.push(Mobile::new(id, position, velocity, ANTENNAS));
        }
        Ok(())
    }

    fn draw_shadowing(&mut self) -> RapsResult<()> {
        let rows = correlated_shadowing(
            self.mobiles.len(),
            self.base_stations.len(),
            self.config.world.shadowing_std_db,
            &mut self.rng,
        )?;
        for (mobile, row) in self.mobiles.iter_mut().zip(rows) {
            mobile.shadowing = row;
        }
        Ok(())
    }

    /// One profile spans the timeslots of every iteration.
    fn fading_profile(&self) -> RapsResult<Option<FadingProfile>> {
        if !self.config.world.frequency_selective_fading {
            return Ok(None);
        }
        let phy = &self.config.phy;
        FadingProfile::new(
            phy.frequency_chunks,
            phy.timeslots * phy.iterations,
            phy.center_frequency,
            phy.simulation_time * phy.iterations as f64,
            phy.system_bandwidth,
            self.config.world.mobile_velocity,
        )
        .map(Some)
    }

    // ---- accessors -------------------------------------------------------

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn hexagons(&self) -> &[Hexagon] {
        &self.hexagons
    }

    pub fn considered_hexagons(&self) -> impl Iterator<Item = &Hexagon> {
        self.considered.iter().map(|&i| &self.hexagons[i])
    }

    pub fn base_stations(&self) -> &[BaseStation] {
        &self.base_stations
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn cell(&self, id: CellId) -> RapsResult<&Cell> {
        self.cells
            .get(id.index())
            .ok_or_else(|| RapsError::Association(format!("unknown {id}")))
    }

    pub fn base_station_of(&self, cell: &Cell) -> RapsResult<&BaseStation> {
        self.base_stations
            .get(cell.bs.index())
            .ok_or_else(|| RapsError::Association(format!("unknown {}", cell.bs)))
    }

    pub fn mobiles(&self) -> &[Mobile] {
        &self.mobiles
    }

    pub fn mobile(&self, id: MobileId) -> Option<&Mobile> {
        self.mobiles.iter().find(|m| m.id == id)
    }

    /// Mobiles served by `cell`, in id order.
    pub fn mobiles_in(&self, cell: CellId) -> Vec<&Mobile> {
        self.mobiles.iter().filter(|m| m.serving_cell() == Some(cell)).collect()
    }

    pub fn fading(&self) -> Option<&FadingProfile> {
        self.fading.as_ref()
    }

    /// Index of the frame the channels currently describe.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// The cell covering the central hexagon.
    pub fn center_cell(&self) -> Option<CellId> {
        self.cells.iter().find(|c| c.center.norm() < 1.0).map(|c| c.id)
    }

    fn in_considered(&self, position: &Position) -> bool {
        self.considered_hexagons().any(|h| h.contains(position))
    }

    /// Cells whose hexagon lies in the considered tiers.
    pub fn considered_cells(&self) -> Vec<CellId> {
        self.cells
            .iter()
            .filter(|c| self.in_considered(&c.center))
            .map(|c| c.id)
            .collect()
    }

    pub fn considered_mobiles(&self) -> Vec<&Mobile> {
        self.mobiles.iter().filter(|m| self.in_considered(&m.position)).collect()
    }

    // ---- links and SINR --------------------------------------------------

    /// Pathgain, shadowing and fading of every mobile towards every cell.
    pub fn associate_pathlosses(&mut self) -> RapsResult<()> {
        for index in 0..self.mobiles.len() {
            self.associate_pathloss(index)?;
        }
        debug!(mobiles = self.mobiles.len(), "associated pathlosses");
        Ok(())
    }

    fn associate_pathloss(&mut self, index: usize) -> RapsResult<()> {
        let p_max = self.config.phy.p_max();
        let (chunks, timeslots) = (self.config.phy.frequency_chunks, self.config.phy.timeslots);
        let mobile = &mut self.mobiles[index];

        for bs in &self.base_stations {
            let distance = bs.position.distance_to(&mobile.position);
            let shadowing_db = *mobile.shadowing.get(bs.id.index()).ok_or_else(|| {
                RapsError::Consistency(format!("{} has no shadowing towards {}", mobile.id, bs.id))
            })?;
            for &cell_id in &bs.cells {
                let cell = &self.cells[cell_id.index()];
                let angle = off_boresight_angle_deg(&bs.position, &cell.center, &mobile.position)?;
                let gain = pathgain(distance, shadowing_db, antenna_gain_db(angle));
                let fading = self.fading.as_ref().map(|_| {
                    (0..mobile.antennas * cell.antennas)
                        .map(|_| FadingRealization::draw(&mut self.rng))
                        .collect()
                });
                mobile.set_link(LinkRecord {
                    bs: bs.id,
                    cell: cell_id,
                    distance,
                    shadowing_db,
                    pathgain: gain,
                    average_prx: p_max * gain,
                    fading,
                    channel: Default::default(),
                });
            }
        }

        let cells = &self.cells;
        mobile.refresh_channels(
            self.fading.as_ref(),
            &|c: CellId| cells.get(c.index()).map_or(ANTENNAS, |cell| cell.antennas),
            chunks,
            timeslots,
            self.iteration,
        )
    }

    /// Wideband and per-block SINR of every mobile under the cells' current
    /// transmit powers. Newly associated mobiles join their serving cell.
    pub fn calculate_sinrs(&mut self) -> RapsResult<()> {
        let noise = self.config.system_noise_power();
        for mobile in &mut self.mobiles {
            let serving = mobile.calculate_sinr(&self.cells, noise)?;
            self.cells[serving.index()].attach(mobile.id);
        }
        debug!(iteration = self.iteration, "calculated sinrs");
        Ok(())
    }

    /// Move every channel to the timeslots of `iteration`.
    pub fn update_fsf(&mut self, iteration: usize) -> RapsResult<()> {
        if iteration >= self.config.phy.iterations {
            return Err(RapsError::Config(format!(
                "iteration {iteration} beyond the {} configured",
                self.config.phy.iterations
            )));
        }
        self.iteration = iteration;
        self.refresh_all_channels()
    }

    fn refresh_all_channels(&mut self) -> RapsResult<()> {
        let (chunks, timeslots) = (self.config.phy.frequency_chunks, self.config.phy.timeslots);
        let cells = &self.cells;
        let antennas = |c: CellId| cells.get(c.index()).map_or(ANTENNAS, |cell| cell.antennas);
        for mobile in &mut self.mobiles {
            mobile.refresh_channels(self.fading.as_ref(), &antennas, chunks, timeslots, self.iteration)?;
        }
        Ok(())
    }

    // ---- population control ---------------------------------------------

    /// Add or remove mobiles in the center cell until it serves exactly
    /// `target`. Zero disables the adjustment.
    pub fn fix_center_cell_users(&mut self, target: usize) -> RapsResult<()> {
        if target == 0 {
            return Ok(());
        }
        let center = self
            .center_cell()
            .ok_or_else(|| RapsError::Geometry("world has no center cell".into()))?;

        while self.cells[center.index()].mobiles().len() < target {
            self.add_center_mobile(center)?;
        }
        while self.cells[center.index()].mobiles().len() > target {
            let members: Vec<MobileId> = self.cells[center.index()].mobiles().iter().copied().collect();
            let victim = members[self.rng.gen_range(0..members.len())];
            self.remove_mobile(victim);
        }
        info!(%center, users = target, "fixed center cell population");
        Ok(())
    }

    fn add_center_mobile(&mut self, center: CellId) -> RapsResult<()> {
        let tile = self
            .hexagons
            .iter()
            .find(|h| h.center.norm() < 1.0)
            .copied()
            .ok_or_else(|| RapsError::Geometry("no hexagon at the origin".into()))?;
        let noise = self.config.system_noise_power();

        for _ in 0..CENTER_PLACEMENT_ATTEMPTS {
            let position = tile.sample_uniform(&mut self.rng)?;
            if self.too_close_to_site(&position) {
                continue;
            }
            let id = self.ids.mobile();
            let mut mobile = Mobile::new(id, position, self.config.world.mobile_velocity, ANTENNAS);
            mobile.shadowing = correlated_shadowing_row(
                self.base_stations.len(),
                self.config.world.shadowing_std_db,
                &mut self.rng,
            )?;
            self.mobiles.push(mobile);
            let index = self.mobiles.len() - 1;
            self.associate_pathloss(index)?;
            let serving = self.mobiles[index].calculate_sinr(&self.cells, noise)?;
            if serving == center {
                self.cells[center.index()].attach(id);
                return Ok(());
            }
            self.mobiles.pop();
        }
        Err(RapsError::Geometry(format!(
            "no mobile placed in the center hexagon is served by {center}"
        )))
    }

    /// Drop a mobile from the world and from its cell.
    pub fn remove_mobile(&mut self, id: MobileId) -> Option<Mobile> {
        let index = self.mobiles.iter().position(|m| m.id == id)?;
        let mobile = self.mobiles.remove(index);
        if let Some(cell) = mobile.serving_cell() {
            self.cells[cell.index()].detach(id);
        }
        Some(mobile)
    }

    /// Change the supply power model and sleep alignment without touching
    /// the layout.
    pub fn update_operating_parameters(&mut self, power: PowerModelConfig, alignment: SleepAlignment) {
        for bs in &mut self.base_stations {
            bs.power = power;
        }
        for cell in &mut self.cells {
            cell.sleep_mut().set_alignment(alignment);
        }
        self.config.power = power;
        self.config.scheduling.sleep_alignment = alignment;
    }

    // ---- snapshots -------------------------------------------------------

    /// Write the world as JSON.
    pub fn save(&self, path: &Path) -> RapsResult<()> {
        let json = serde_json::to_string(self).map_err(|e| RapsError::Io(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| RapsError::Io(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "saved world");
        Ok(())
    }

    /// Read a world written by [`World::save`]. Channels and SINRs are
    /// recomputed for the stored iteration and the generator is reseeded.
    pub fn load(path: &Path, seed: u64) -> RapsResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| RapsError::Io(format!("{}: {e}", path.display())))?;
        let mut world: World = serde_json::from_str(&json).map_err(|e| RapsError::Io(e.to_string()))?;
        world.rng = StdRng::seed_from_u64(seed);
        if world.mobiles.iter().any(|m| m.links().is_empty()) {
            warn!(path = %path.display(), "snapshot has unassociated mobiles");
            world.associate_pathlosses()?;
        } else {
            world.refresh_all_channels()?;
        }
        world.calculate_sinrs()?;
        info!(path = %path.display(), mobiles = world.mobiles.len(), "loaded world");
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use raps_core::config::InitialPower;

    pub(crate) fn small_config(sectors: usize, fading: bool) -> SimConfig {
        let mut config = SimConfig::default();
        config.world.tiers = 1;
        config.world.considered_tiers = 0;
        config.world.sectors_per_bs = sectors;
        config.world.users_per_cell = 2;
        config.world.center_cell_users = 3;
        config.world.frequency_selective_fading = fading;
        config.phy.frequency_chunks = 4;
        config.phy.timeslots = 3;
        config.phy.iterations = 2;
        config.scheduling.initial_power = InitialPower::Full;
        config
    }

    fn ready_world(sectors: usize, fading: bool) -> World {
        let mut world = World::build(small_config(sectors, fading), 7).unwrap();
        world.associate_pathlosses().unwrap();
        world.calculate_sinrs().unwrap();
        world
    }

    #[test]
    fn test_omni_layout() {
        let world = World::build(small_config(1, false), 1).unwrap();
        assert_eq!(world.hexagons().len(), 7);
        assert_eq!(world.base_stations().len(), 7);
        assert_eq!(world.cells().len(), 7);
        assert_eq!(world.mobiles().len(), 14);
        assert_eq!(world.considered_hexagons().count(), 1);
        assert_eq!(world.considered_cells(), vec![world.center_cell().unwrap()]);
        // the center cell borders all six others
        let center = world.cell(world.center_cell().unwrap()).unwrap();
        assert_eq!(center.neighbors().len(), 6);
    }

    #[test]
    fn test_three_sector_layout() {
        let world = World::build(small_config(3, false), 1).unwrap();
        // every cell covers its own hexagon
        assert!(world.cells().len() <= world.hexagons().len());
        for (i, a) in world.cells().iter().enumerate() {
            assert!(world.hexagons().iter().any(|h| h.center.distance_to(&a.center) < 1e-6));
            assert!(world.cells()[i + 1..].iter().all(|b| b.center.distance_to(&a.center) > 1.0));
        }
        for bs in world.base_stations() {
            assert!(!bs.cells.is_empty() && bs.cells.len() <= 3);
        }
        assert!(world.center_cell().is_some());
    }

    #[test]
    fn test_forbidden_distance_rejected() {
        let mut config = small_config(1, false);
        config.world.forbidden_distance = 300.0;
        assert!(matches!(World::build(config, 0), Err(RapsError::Geometry(_))));
    }

    #[test]
    fn test_mobiles_avoid_sites() {
        let world = World::build(small_config(1, false), 3).unwrap();
        for m in world.mobiles() {
            assert!(world.hexagons().iter().any(|h| h.contains(&m.position)));
            for bs in world.base_stations() {
                assert!(bs.position.distance_to(&m.position) >= 35.0);
            }
            assert_eq!(m.shadowing.len(), world.base_stations().len());
        }
    }

    #[test]
    fn test_same_seed_same_world() {
        let a = World::build(small_config(3, true), 42).unwrap();
        let b = World::build(small_config(3, true), 42).unwrap();
        let pa: Vec<_> = a.mobiles().iter().map(|m| m.position).collect();
        let pb: Vec<_> = b.mobiles().iter().map(|m| m.position).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_every_mobile_joins_one_cell() {
        let world = ready_world(1, false);
        let members: usize = world.cells().iter().map(|c| c.mobiles().len()).sum();
        assert_eq!(members, world.mobiles().len());
        for m in world.mobiles() {
            let cell = m.serving_cell().unwrap();
            assert!(world.cell(cell).unwrap().mobiles().contains(&m.id));
            assert_eq!(m.links().len(), world.cells().len());
            assert_eq!(m.effective_sinr().len(), ANTENNAS);
        }
    }

    #[test]
    fn test_serving_link_is_strongest() {
        let world = ready_world(3, false);
        for m in world.mobiles() {
            let serving = m.serving_cell().unwrap();
            let best = m.links().strongest().unwrap();
            assert_eq!(best.cell, serving);
            assert!(m.wideband_sinr() > 0.0);
        }
    }

    #[test]
    fn test_update_fsf_bounds() {
        let mut world = ready_world(1, true);
        world.update_fsf(1).unwrap();
        assert_eq!(world.iteration(), 1);
        world.calculate_sinrs().unwrap();
        assert!(matches!(world.update_fsf(2), Err(RapsError::Config(_))));
    }

    #[test]
    fn test_fix_center_cell_users() {
        let mut world = ready_world(1, false);
        let center = world.center_cell().unwrap();

        world.fix_center_cell_users(5).unwrap();
        assert_eq!(world.cell(center).unwrap().mobiles().len(), 5);
        assert_eq!(world.mobiles_in(center).len(), 5);

        world.fix_center_cell_users(1).unwrap();
        assert_eq!(world.cell(center).unwrap().mobiles().len(), 1);
        assert_eq!(world.mobiles_in(center).len(), 1);
    }

    #[test]
    fn test_update_operating_parameters() {
        let mut world = ready_world(1, false);
        let power = PowerModelConfig {
            p0: 100.0,
            m: 2.0,
            p_s: 50.0,
        };
        world.update_operating_parameters(power, SleepAlignment::RandomIter);
        assert!(world.base_stations().iter().all(|bs| bs.power == power));
        assert!(world
            .cells()
            .iter()
            .all(|c| c.sleep().alignment() == SleepAlignment::RandomIter));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let world = ready_world(1, true);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        world.save(&path).unwrap();

        let loaded = World::load(&path, 7).unwrap();
        assert_eq!(loaded.mobiles().len(), world.mobiles().len());
        for (a, b) in world.mobiles().iter().zip(loaded.mobiles()) {
            assert_eq!(a.serving(), b.serving());
            assert_relative_eq!(a.wideband_sinr(), b.wideband_sinr(), max_relative = 1e-12);
            assert_relative_eq!(a.block_sinr(2, 1)[0], b.block_sinr(2, 1)[0], max_relative = 1e-9);
        }
    }
}
