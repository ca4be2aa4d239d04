//! Large-scale propagation: distance pathloss, sector antenna pattern and
//! correlated log-normal shadowing.
//!
//! ```text
//! PL[dB] = 128.1 + 37.6 log10(d / 1 km) + shadowing[dB] - antennaGain[dB]
//! gain   = 10^(-PL / 10)
//! ```

use crate::linalg::cholesky_lower;
use crate::numeric::db_to_linear;
use crate::types::{Position, RapsError, RapsResult};
use rand::Rng;
use rand_distr::StandardNormal;

/// Half-power beam width of a sector antenna, in degrees.
pub const BEAMWIDTH_3DB_DEG: f64 = 70.0;
/// Maximum attenuation behind the antenna, in dB.
pub const FRONT_TO_BACK_DB: f64 = 25.0;
/// Gain on boresight, in dBi.
pub const BORESIGHT_GAIN_DBI: f64 = 14.0;
/// Correlation of shadowing between any two sites.
pub const SITE_CORRELATION: f64 = 0.5;

/// Distance-dependent pathloss in dB for a distance in meters.
pub fn distance_pathloss_db(distance_m: f64) -> f64 {
    128.1 + 37.6 * (distance_m / 1e3).log10()
}

/// Total pathloss in dB.
pub fn pathloss_db(distance_m: f64, shadowing_db: f64, antenna_gain_db: f64) -> f64 {
    distance_pathloss_db(distance_m) + shadowing_db - antenna_gain_db
}

/// Linear pathgain (less than one for any realistic link).
pub fn pathgain(distance_m: f64, shadowing_db: f64, antenna_gain_db: f64) -> f64 {
    db_to_linear(-pathloss_db(distance_m, shadowing_db, antenna_gain_db))
}

/// Sector antenna gain in dB for an off-boresight angle in degrees.
pub fn antenna_gain_db(angle_deg: f64) -> f64 {
    let attenuation = (12.0 * (angle_deg / BEAMWIDTH_3DB_DEG).powi(2)).min(FRONT_TO_BACK_DB);
    BORESIGHT_GAIN_DBI - attenuation
}

/// Angle in degrees at the site between the direction to the cell center
/// (boresight) and the direction to the mobile.
///
/// A site in the cell center is omnidirectional and returns zero, as does a
/// mobile on top of the site.
pub fn off_boresight_angle_deg(site: &Position, cell_center: &Position, mobile: &Position) -> RapsResult<f64> {
    let p12 = site.distance_to(cell_center);
    let p13 = site.distance_to(mobile);
    let p23 = cell_center.distance_to(mobile);
    if p12 < 1e-5 || p13 < 1e-5 {
        return Ok(0.0);
    }
    let cosine = (p12 * p12 + p13 * p13 - p23 * p23) / (2.0 * p12 * p13);
    if !cosine.is_finite() {
        return Err(RapsError::Geometry(format!(
            "angle between site {site}, cell {cell_center} and mobile {mobile} is undefined"
        )));
    }
    Ok(cosine.clamp(-1.0, 1.0).acos().to_degrees())
}

/// Correlated shadowing values, `rows x sites`, in dB.
///
/// Every pair of sites is correlated with [`SITE_CORRELATION`]. Draws i.i.d.
/// normal values scaled by `std_dev_db` and colours them with the Cholesky
/// factor of the correlation matrix.
pub fn correlated_shadowing<R: Rng + ?Sized>(
    rows: usize,
    sites: usize,
    std_dev_db: f64,
    rng: &mut R,
) -> RapsResult<Vec<Vec<f64>>> {
    let factor = site_correlation_factor(sites)?;
    Ok((0..rows)
        .map(|_| colour_row(&factor, std_dev_db, rng))
        .collect())
}

/// A single row of [`correlated_shadowing`], for a mobile added later.
pub fn correlated_shadowing_row<R: Rng + ?Sized>(sites: usize, std_dev_db: f64, rng: &mut R) -> RapsResult<Vec<f64>> {
    let factor = site_correlation_factor(sites)?;
    Ok(colour_row(&factor, std_dev_db, rng))
}

fn site_correlation_factor(sites: usize) -> RapsResult<Vec<Vec<f64>>> {
    let correlation: Vec<Vec<f64>> = (0..sites)
        .map(|i| {
            (0..sites)
                .map(|j| if i == j { 1.0 } else { SITE_CORRELATION })
                .collect()
        })
        .collect();
    cholesky_lower(&correlation)
}

/// `z * L^T` for a fresh standard normal row `z`.
fn colour_row<R: Rng + ?Sized>(lower: &[Vec<f64>], std_dev_db: f64, rng: &mut R) -> Vec<f64> {
    let n = lower.len();
    let z: Vec<f64> = (0..n)
        .map(|_| std_dev_db * rng.sample::<f64, _>(StandardNormal))
        .collect();
    (0..n)
        .map(|j| (0..=j).map(|k| z[k] * lower[j][k]).sum())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pathloss_reference_values() {
        assert_relative_eq!(distance_pathloss_db(1000.0), 128.1, epsilon = 1e-12);
        assert_relative_eq!(pathloss_db(100.0, 3.0, 14.0), 128.1 - 37.6 + 3.0 - 14.0, epsilon = 1e-12);
        assert_relative_eq!(pathgain(1000.0, 0.0, 0.0), 10f64.powf(-12.81), epsilon = 1e-20);
    }

    #[test]
    fn test_pathloss_monotone_in_distance() {
        let mut last = pathloss_db(10.0, 2.5, 11.0);
        for d in (11..5000).step_by(7) {
            let pl = pathloss_db(d as f64, 2.5, 11.0);
            assert!(pl >= last);
            last = pl;
        }
    }

    #[test]
    fn test_antenna_pattern() {
        assert_relative_eq!(antenna_gain_db(0.0), 14.0);
        assert_relative_eq!(antenna_gain_db(35.0), 14.0 - 3.0);
        assert_relative_eq!(antenna_gain_db(180.0), 14.0 - 25.0);
    }

    #[test]
    fn test_off_boresight_angle() {
        let site = Position::new(0.0, 0.0);
        let cell = Position::new(0.0, 100.0);
        let angle = off_boresight_angle_deg(&site, &cell, &Position::new(100.0, 0.0)).unwrap();
        assert_relative_eq!(angle, 90.0, epsilon = 1e-9);
        let behind = off_boresight_angle_deg(&site, &cell, &Position::new(0.0, -50.0)).unwrap();
        assert_relative_eq!(behind, 180.0, epsilon = 1e-9);
        let omni = off_boresight_angle_deg(&site, &site, &Position::new(30.0, 0.0)).unwrap();
        assert_eq!(omni, 0.0);
        // collinear points can push the cosine just past one
        let aligned = off_boresight_angle_deg(&site, &cell, &Position::new(0.0, 300.0)).unwrap();
        assert!(aligned.abs() < 1e-6);
    }

    #[test]
    fn test_off_boresight_angle_stays_in_range() {
        let site = Position::new(0.0, 0.0);
        let cell = Position::new(0.0, 100.0);
        for i in 0..360 {
            let phi = (i as f64).to_radians();
            for r in [1e-3, 1.0, 250.0, 1e4] {
                let mobile = Position::new(r * phi.cos(), r * phi.sin());
                let angle = off_boresight_angle_deg(&site, &cell, &mobile).unwrap();
                assert!((0.0..=180.0).contains(&angle), "{angle} at {mobile}");
            }
        }
    }

    #[test]
    fn test_shadowing_statistics() {
        let mut rng = StdRng::seed_from_u64(1234);
        let rows = 20_000;
        let sites = 3;
        let map = correlated_shadowing(rows, sites, 8.0, &mut rng).unwrap();
        assert_eq!(map.len(), rows);
        assert_eq!(map[0].len(), sites);

        let mean = |j: usize| map.iter().map(|r| r[j]).sum::<f64>() / rows as f64;
        let means: Vec<f64> = (0..sites).map(mean).collect();
        for m in &means {
            assert!(m.abs() < 0.3, "mean {m}");
        }
        let cov = |a: usize, b: usize| {
            map.iter()
                .map(|r| (r[a] - means[a]) * (r[b] - means[b]))
                .sum::<f64>()
                / rows as f64
        };
        for a in 0..sites {
            assert!((cov(a, a).sqrt() - 8.0).abs() < 0.3);
            for b in (a + 1)..sites {
                let rho = cov(a, b) / (cov(a, a) * cov(b, b)).sqrt();
                assert!((rho - 0.5).abs() < 0.03, "correlation {rho}");
            }
        }
    }

    #[test]
    fn test_single_row() {
        let mut rng = StdRng::seed_from_u64(5);
        let row = correlated_shadowing_row(4, 8.0, &mut rng).unwrap();
        assert_eq!(row.len(), 4);
        assert!(correlated_shadowing_row(0, 8.0, &mut rng).unwrap().is_empty());
    }
}
