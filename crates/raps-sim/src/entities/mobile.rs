//! Mobile terminal: link state towards every cell and the SINR it perceives.
//!
//! For every resource block `(n, t)` the mobile whitens the serving channel
//! with the covariance of noise and co-channel interference:
//!
//! ```text
//! Cn    = noise / N * I + sum_{i != serving} H_i diag(P_i) H_i^H
//! H_eff = H_s Cn^-1 H_s^H
//! ```
//!
//! The eigenvalues of `H_eff` are the unit-power SINRs of its spatial streams.

use super::cell::{Cell, PowerGrid};
use super::{BsId, CellId, MobileId};
use raps_core::capacity::capacity_from_eigenvalues;
use raps_core::fading::{FadingProfile, FadingRealization};
use raps_core::linalg::ComplexMatrix;
use raps_core::types::{Complex, Position, RapsError, RapsResult, ResourceGrid};
use serde::{Deserialize, Serialize};

/// MIMO channel of one link on every resource block of the current frame,
/// `[rx, tx]` matrices stored block by block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelTensor {
    rx: usize,
    tx: usize,
    chunks: usize,
    timeslots: usize,
    data: Vec<Complex>,
}

impl ChannelTensor {
    pub fn zeros(rx: usize, tx: usize, chunks: usize, timeslots: usize) -> Self {
        Self {
            rx,
            tx,
            chunks,
            timeslots,
            data: vec![Complex::new(0.0, 0.0); rx * tx * chunks * timeslots],
        }
    }

    /// `amplitude * I` on every block.
    pub fn identity(rx: usize, tx: usize, chunks: usize, timeslots: usize, amplitude: f64) -> Self {
        let mut tensor = Self::zeros(rx, tx, chunks, timeslots);
        for n in 0..chunks {
            for t in 0..timeslots {
                for d in 0..rx.min(tx) {
                    tensor.set(n, t, d, d, Complex::new(amplitude, 0.0));
                }
            }
        }
        tensor
    }

    /// Independent fading per antenna pair, scaled by `amplitude`, over the
    /// timeslots of `iteration`.
    pub fn faded(
        rx: usize,
        tx: usize,
        profile: &FadingProfile,
        realizations: &[FadingRealization],
        iteration: usize,
        timeslots: usize,
        amplitude: f64,
    ) -> RapsResult<Self> {
        if realizations.len() != rx * tx {
            return Err(RapsError::DimensionMismatch {
                expected: rx * tx,
                actual: realizations.len(),
            });
        }
        let window = iteration * timeslots..(iteration + 1) * timeslots;
        let chunks = profile.chunks();
        let mut tensor = Self::zeros(rx, tx, chunks, timeslots);
        for r in 0..rx {
            for c in 0..tx {
                let response = profile.response(&realizations[r * tx + c], window.clone())?;
                for n in 0..chunks {
                    for t in 0..timeslots {
                        tensor.set(n, t, r, c, *response.get(n, t) * amplitude);
                    }
                }
            }
        }
        Ok(tensor)
    }

    #[inline]
    fn offset(&self, n: usize, t: usize) -> usize {
        (n * self.timeslots + t) * self.rx * self.tx
    }

    #[inline]
    pub fn set(&mut self, n: usize, t: usize, r: usize, c: usize, value: Complex) {
        let o = self.offset(n, t);
        self.data[o + r * self.tx + c] = value;
    }

    /// Channel matrix of block `(n, t)`.
    pub fn matrix(&self, n: usize, t: usize) -> ComplexMatrix {
        let o = self.offset(n, t);
        let block = self.data[o..o + self.rx * self.tx].to_vec();
        ComplexMatrix::from_flat(self.rx, self.tx, block).unwrap_or_else(|_| ComplexMatrix::zeros(self.rx, self.tx))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Everything a mobile knows about one (base station, cell) link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub bs: BsId,
    pub cell: CellId,
    /// Meters.
    pub distance: f64,
    /// dB, shared by all cells of the base station.
    pub shadowing_db: f64,
    /// Linear.
    pub pathgain: f64,
    /// `p_max * pathgain`, used for association.
    pub average_prx: f64,
    /// One fading realization per antenna pair; `None` when fading is off.
    pub fading: Option<Vec<FadingRealization>>,
    #[serde(skip)]
    pub channel: ChannelTensor,
}

/// Link records keyed by `(base station, cell)`, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationTable {
    records: Vec<LinkRecord>,
}

impl AssociationTable {
    fn position(&self, bs: BsId, cell: CellId) -> Result<usize, usize> {
        self.records.binary_search_by(|r| (r.bs, r.cell).cmp(&(bs, cell)))
    }

    /// Insert or replace the record for `(record.bs, record.cell)`.
    pub fn upsert(&mut self, record: LinkRecord) {
        match self.position(record.bs, record.cell) {
            Ok(i) => self.records[i] = record,
            Err(i) => self.records.insert(i, record),
        }
    }

    pub fn get(&self, bs: BsId, cell: CellId) -> Option<&LinkRecord> {
        self.position(bs, cell).ok().map(|i| &self.records[i])
    }

    /// Record for `cell`, whichever base station it belongs to.
    pub fn by_cell(&self, cell: CellId) -> Option<&LinkRecord> {
        self.records.iter().find(|r| r.cell == cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LinkRecord> {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The strongest link by average received power. Exact ties go to the
    /// lowest `(base station, cell)` key.
    pub fn strongest(&self) -> Option<&LinkRecord> {
        let mut best: Option<&LinkRecord> = None;
        for r in &self.records {
            match best {
                Some(b) if r.average_prx <= b.average_prx => {}
                _ => best = Some(r),
            }
        }
        best
    }
}

/// Coarse SINR from average received powers over the whole band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidebandSinr {
    pub signal: f64,
    pub interference: f64,
    pub noise: f64,
    pub sinr: f64,
}

impl WidebandSinr {
    /// Noise plus interference power over the system bandwidth.
    pub fn noise_plus_interference(&self) -> f64 {
        self.noise + self.interference
    }
}

/// A mobile terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mobile {
    pub id: MobileId,
    pub position: Position,
    /// m/s.
    pub velocity: f64,
    pub antennas: usize,
    /// Shadowing towards every base station in dB, one entry per site.
    pub shadowing: Vec<f64>,
    /// Running average rate for proportional fair scheduling, bit/s.
    pub average_rate: f64,
    links: AssociationTable,
    serving: Option<(BsId, CellId)>,
    wideband: Option<WidebandSinr>,
    /// Unit-power SINR per spatial stream, strongest stream first.
    #[serde(skip)]
    effective_sinr: Vec<ResourceGrid<f64>>,
}

impl Mobile {
    pub fn new(id: MobileId, position: Position, velocity: f64, antennas: usize) -> Self {
        Self {
            id,
            position,
            velocity,
            antennas,
            shadowing: Vec::new(),
            average_rate: 1.0,
            links: AssociationTable::default(),
            serving: None,
            wideband: None,
            effective_sinr: Vec::new(),
        }
    }

    pub fn links(&self) -> &AssociationTable {
        &self.links
    }

    pub fn set_link(&mut self, record: LinkRecord) {
        self.links.upsert(record);
    }

    /// Serving base station and cell, once associated.
    pub fn serving(&self) -> Option<(BsId, CellId)> {
        self.serving
    }

    pub fn serving_cell(&self) -> Option<CellId> {
        self.serving.map(|(_, c)| c)
    }

    fn serving_link(&self) -> RapsResult<&LinkRecord> {
        let (bs, cell) = self
            .serving
            .ok_or_else(|| RapsError::Association(format!("{} is not associated", self.id)))?;
        self.links
            .get(bs, cell)
            .ok_or_else(|| RapsError::Association(format!("{} has no link to {cell}", self.id)))
    }

    /// Serving channel of the current frame.
    pub fn serving_channel(&self) -> RapsResult<&ChannelTensor> {
        Ok(&self.serving_link()?.channel)
    }

    pub fn wideband(&self) -> Option<&WidebandSinr> {
        self.wideband.as_ref()
    }

    /// Wideband SINR, `NaN` before the first SINR computation.
    pub fn wideband_sinr(&self) -> f64 {
        self.wideband.map_or(f64::NAN, |w| w.sinr)
    }

    /// Unit-power SINR of every stream on every block.
    pub fn effective_sinr(&self) -> &[ResourceGrid<f64>] {
        &self.effective_sinr
    }

    /// Unit-power stream SINRs on block `(n, t)`.
    pub fn block_sinr(&self, n: usize, t: usize) -> Vec<f64> {
        self.effective_sinr.iter().map(|g| *g.get(n, t)).collect()
    }

    /// Mean unit-power SINR over streams on block `(n, t)`.
    pub fn mean_block_sinr(&self, n: usize, t: usize) -> f64 {
        if self.effective_sinr.is_empty() {
            return 0.0;
        }
        self.effective_sinr.iter().map(|g| *g.get(n, t)).sum::<f64>() / self.effective_sinr.len() as f64
    }

    /// SINR per stream under `cell`'s current schedule: the unit-power SINR
    /// times the power of the matching antenna on blocks allocated to this
    /// mobile, zero elsewhere.
    pub fn scheduled_sinr(&self, cell: &Cell) -> Vec<ResourceGrid<f64>> {
        let power = cell.power();
        self.effective_sinr
            .iter()
            .enumerate()
            .map(|(s, grid)| {
                ResourceGrid::from_fn(grid.chunks(), grid.timeslots(), |n, t| {
                    if *cell.outmap().get(n, t) == Some(self.id) && s < power.antennas() {
                        *grid.get(n, t) * power.get(s, n, t)
                    } else {
                        0.0
                    }
                })
            })
            .collect()
    }

    /// Spectral efficiency of block `(n, t)` at transmit power `power`.
    pub fn block_capacity(&self, n: usize, t: usize, power: f64) -> f64 {
        capacity_from_eigenvalues(&self.block_sinr(n, t), power, self.antennas)
    }

    /// Bits carried by block `(n, t)` at transmit power `power`.
    pub fn block_bits(&self, n: usize, t: usize, bandwidth: f64, duration: f64, power: f64) -> f64 {
        bandwidth * duration * self.block_capacity(n, t, power)
    }

    /// Pick the serving link. Re-association to a different link is refused.
    fn associate(&mut self) -> RapsResult<(BsId, CellId)> {
        let best = self
            .links
            .strongest()
            .ok_or_else(|| RapsError::Association(format!("{} has no links", self.id)))?;
        let choice = (best.bs, best.cell);
        match self.serving {
            Some(current) if current != choice => {
                return Err(RapsError::Association(format!(
                    "{} is served by {} and cannot move to {}",
                    self.id, current.1, choice.1
                )))
            }
            _ => self.serving = Some(choice),
        }
        Ok(choice)
    }

    /// Associate with the strongest cell and derive wideband and per-block
    /// SINR from the current transmit powers of all `cells`.
    ///
    /// `cells` must be indexed by cell id.
    pub fn calculate_sinr(&mut self, cells: &[Cell], system_noise: f64) -> RapsResult<CellId> {
        self.associate()?;
        let serving = self.serving_link()?;
        let total: f64 = self.links.iter().map(|r| r.average_prx).sum();
        let interference = total - serving.average_prx;
        let wideband = WidebandSinr {
            signal: serving.average_prx,
            interference,
            noise: system_noise,
            sinr: serving.average_prx / (interference + system_noise),
        };

        let h_serving = &serving.channel;
        if h_serving.is_empty() {
            return Err(RapsError::Consistency(format!("{} has no channel for the current frame", self.id)));
        }
        let (chunks, timeslots) = (h_serving.chunks, h_serving.timeslots);
        let noise_per_block = system_noise / chunks as f64;

        let interferers: Vec<(&LinkRecord, &PowerGrid)> = self
            .links
            .iter()
            .filter(|r| r.cell != serving.cell)
            .map(|r| {
                cells
                    .get(r.cell.index())
                    .map(|c| (r, c.power()))
                    .ok_or_else(|| RapsError::Association(format!("unknown {}", r.cell)))
            })
            .collect::<RapsResult<_>>()?;

        let streams = self.antennas;
        let mut sinr: Vec<ResourceGrid<f64>> = (0..streams)
            .map(|_| ResourceGrid::filled(chunks, timeslots, 0.0))
            .collect();

        for t in 0..timeslots {
            for n in 0..chunks {
                let mut covariance = ComplexMatrix::scaled_identity(self.antennas, noise_per_block);
                for (link, power) in &interferers {
                    let h = link.channel.matrix(n, t);
                    covariance.add_assign(&h.weighted_gram(power.block(n, t)));
                }
                let h = h_serving.matrix(n, t);
                if h.cols() != covariance.rows() {
                    return Err(RapsError::DimensionMismatch {
                        expected: covariance.rows(),
                        actual: h.cols(),
                    });
                }
                let effective = h.mul(&covariance.inverse()?).mul(&h.hermitian());
                let eig = effective.hermitian_eigenvalues()?;
                for (grid, value) in sinr.iter_mut().zip(eig) {
                    grid.set(n, t, value);
                }
            }
        }
        let serving_cell = serving.cell;
        self.wideband = Some(wideband);
        self.effective_sinr = sinr;
        Ok(serving_cell)
    }

    /// Re-evaluate every link's channel for the timeslots of `iteration`.
    pub fn refresh_channels(
        &mut self,
        profile: Option<&FadingProfile>,
        cell_antennas: &dyn Fn(CellId) -> usize,
        chunks: usize,
        timeslots: usize,
        iteration: usize,
    ) -> RapsResult<()> {
        let rx = self.antennas;
        for link in self.links.iter_mut() {
            let tx = cell_antennas(link.cell);
            let amplitude = link.pathgain.sqrt();
            link.channel = match (profile, link.fading.as_deref()) {
                (Some(profile), Some(realizations)) => {
                    if (iteration + 1) * timeslots > profile.total_slots() {
                        return Err(RapsError::Config(format!(
                            "fading was generated for {} frames, iteration {iteration} requested",
                            profile.total_slots() / timeslots.max(1)
                        )));
                    }
                    ChannelTensor::faded(rx, tx, profile, realizations, iteration, timeslots, amplitude)?
                }
                _ => ChannelTensor::identity(rx, tx, chunks, timeslots, amplitude),
            };
        }
        Ok(())
    }
}
