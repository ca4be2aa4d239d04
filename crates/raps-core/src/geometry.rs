//! # Hexagonal Network Geometry
//!
//! Hexagonal tiling, point containment and site placement for cellular
//! layouts.
//!
//! Two hexagon orientations exist. Tiles are "north-south" (a vertex points
//! north). "East-west" hexagons (a vertex points east) only serve as large
//! bounding regions when deciding which tiles and sites are kept.
//!
//! ```text
//!   north-south            east-west
//!        /\                 ____
//!       /  \               /    \
//!      |    |             /      \
//!      |    |             \      /
//!       \  /               \____/
//!        \/
//! ```
//!
//! ## Example
//!
//! ```rust
//! use raps_core::geometry::{hex_tile_centers, Hexagon};
//! use raps_core::types::Position;
//!
//! let centers = hex_tile_centers(2, 500.0);
//! assert_eq!(centers.len(), 19);
//!
//! let tile = Hexagon::north_south(Position::ORIGIN, 500.0 / 3f64.sqrt());
//! assert!(tile.contains(&Position::new(10.0, -20.0)));
//! ```

use crate::types::{Position, RapsError, RapsResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Which way the hexagon's vertices point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HexOrientation {
    /// Vertices point north and south.
    NorthSouth,
    /// Vertices point east and west.
    EastWest,
}

/// A regular hexagon given by its center and outer (vertex) radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hexagon {
    pub center: Position,
    pub outer_radius: f64,
    pub orientation: HexOrientation,
}

impl Hexagon {
    pub fn north_south(center: Position, outer_radius: f64) -> Self {
        Self {
            center,
            outer_radius,
            orientation: HexOrientation::NorthSouth,
        }
    }

    pub fn east_west(center: Position, outer_radius: f64) -> Self {
        Self {
            center,
            outer_radius,
            orientation: HexOrientation::EastWest,
        }
    }

    /// Distance from the center to the middle of an edge.
    pub fn inner_radius(&self) -> f64 {
        outer_to_inner_radius(self.outer_radius)
    }

    /// The six corners, clockwise starting from north (north-south) or west
    /// (east-west).
    pub fn vertices(&self) -> [Position; 6] {
        let Position { x, y } = self.center;
        let r = self.outer_radius;
        let ir = self.inner_radius();
        match self.orientation {
            HexOrientation::NorthSouth => [
                Position::new(x, y + r),
                Position::new(x + ir, y + r / 2.0),
                Position::new(x + ir, y - r / 2.0),
                Position::new(x, y - r),
                Position::new(x - ir, y - r / 2.0),
                Position::new(x - ir, y + r / 2.0),
            ],
            HexOrientation::EastWest => [
                Position::new(x - r, y),
                Position::new(x - r / 2.0, y + ir),
                Position::new(x + r / 2.0, y + ir),
                Position::new(x + r, y),
                Position::new(x + r / 2.0, y - ir),
                Position::new(x - r / 2.0, y - ir),
            ],
        }
    }

    /// Closed outline: the vertices followed by the first vertex again.
    pub fn border(&self) -> Vec<Position> {
        let v = self.vertices();
        let mut border = v.to_vec();
        border.push(v[0]);
        border
    }

    /// Even-odd containment test.
    pub fn contains(&self, point: &Position) -> bool {
        point_in_polygon(point, &self.vertices())
    }

    /// Uniformly distributed point inside the hexagon.
    ///
    /// Draws from the bounding square of side `2 * outer_radius` and rejects
    /// points outside. Degenerate hexagons are refused because the loop would
    /// never terminate for them.
    pub fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> RapsResult<Position> {
        if !(self.outer_radius > 0.0 && self.outer_radius.is_finite()) {
            return Err(RapsError::Geometry(format!(
                "cannot sample from a hexagon with radius {}",
                self.outer_radius
            )));
        }
        let side = 2.0 * self.outer_radius;
        loop {
            let x = side * rng.gen::<f64>() - 0.5 * side;
            let y = side * rng.gen::<f64>() - 0.5 * side;
            let point = Position::new(x, y) + self.center;
            if self.contains(&point) {
                return Ok(point);
            }
        }
    }
}

/// Inner radius of a regular hexagon with the given outer radius.
#[inline]
pub fn outer_to_inner_radius(outer: f64) -> f64 {
    0.5 * 3f64.sqrt() * outer
}

/// Outer radius of a regular hexagon with the given inner radius.
#[inline]
pub fn inner_to_outer_radius(inner: f64) -> f64 {
    2.0 * inner / 3f64.sqrt()
}

/// Number of tiles in a layout of `tiers` rings around a central tile.
pub fn cells_from_tiers(tiers: usize) -> usize {
    1 + (1..=tiers).map(|r| 6 * r).sum::<usize>()
}

/// Even-odd ray casting over a closed polygon.
///
/// Horizontal edges never produce a crossing and vertical edges toggle
/// without computing an intersection, so no division by zero can occur.
pub fn point_in_polygon(point: &Position, polygon: &[Position]) -> bool {
    let n = polygon.len();
    if n == 0 {
        return false;
    }
    let (x, y) = (point.x, point.y);
    let mut inside = false;
    let mut p1 = polygon[0];
    for i in 1..=n {
        let p2 = polygon[i % n];
        if y > p1.y.min(p2.y) && y <= p1.y.max(p2.y) && x <= p1.x.max(p2.x) {
            // y lies strictly between the edge endpoints here, so p1.y != p2.y
            let crosses = if p1.x == p2.x {
                true
            } else {
                let x_intersect = (y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y) + p1.x;
                x <= x_intersect
            };
            if crosses {
                inside = !inside;
            }
        }
        p1 = p2;
    }
    inside
}

/// `start, start + step, ...` up to but excluding `stop`.
fn float_range(start: f64, stop: f64, step: f64) -> impl Iterator<Item = f64> {
    let count = ((stop - start) / step).ceil().max(0.0) as usize;
    (0..count).map(move |i| start + i as f64 * step)
}

/// Centers of all hexagonal tiles within `tiers` rings of a central tile at
/// the origin, for tiles `inter_hex_distance` apart.
///
/// A square lattice with every other row shifted by half a step is generated,
/// then clipped to an east-west bounding hexagon of radius
/// `(tiers + 0.1) * inter_hex_distance`.
pub fn hex_tile_centers(tiers: usize, inter_hex_distance: f64) -> Vec<Position> {
    let max_dim = (2 * tiers + 1) as f64;
    let inner = 0.5 * inter_hex_distance;
    let outer = 2.0 * inner / 3f64.sqrt();
    let step_x = 2.0 * inner;
    let step_y = 1.5 * outer;
    let bounds = Hexagon::east_west(Position::ORIGIN, (tiers as f64 + 0.1) * step_x);

    let mut centers = Vec::with_capacity(cells_from_tiers(tiers));
    for x in float_range(step_x * -(max_dim + 1.0) / 2.0, step_x * (max_dim + 1.0) / 2.0 + 1.0, step_x) {
        // row parity puts one point on the origin
        let mut line = 1usize;
        for y in float_range(step_y * -(max_dim + 1.0) / 2.0, step_y * (max_dim + 1.0) / 2.0 + 1.0, step_y) {
            line += 1;
            let point = if (line + tiers) % 2 == 0 {
                Position::new(x + inner, y)
            } else {
                Position::new(x, y)
            };
            if bounds.contains(&point) {
                centers.push(point);
            }
        }
    }
    centers
}

/// Points splitting every edge of a closed outline into `parts` equal
/// segments, excluding the edge endpoints.
pub fn subdivide_border(border: &[Position], parts: usize) -> Vec<Position> {
    let mut points = Vec::new();
    if parts < 2 {
        return points;
    }
    for edge in border.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        for k in 1..parts {
            let f = k as f64 / parts as f64;
            points.push(Position::new(a.x + (b.x - a.x) * f, a.y + (b.y - a.y) * f));
        }
    }
    points
}

/// Site positions for a three-sector deployment.
///
/// `center_tile` is the tile at the origin and `tiers` the number of tile
/// rings. The central site sits on the northern vertex of the center tile.
/// Tier `k` adds the vertices of a north-south hexagon of radius
/// `3 * outer_radius * k` around it, plus `k - 1` evenly spaced sites on each
/// of its edges. Sites outside an east-west hexagon of radius
/// `(2 * tiers + 2) * inner_radius` are dropped.
pub fn three_sector_sites(center_tile: &Hexagon, tiers: usize) -> Vec<Position> {
    let central = center_tile.center + Position::new(0.0, center_tile.outer_radius);
    let mut sites = vec![central];
    for tier in 1..=tiers {
        let ring = Hexagon::north_south(central, 3.0 * center_tile.outer_radius * tier as f64);
        sites.extend_from_slice(&ring.vertices());
        sites.extend(subdivide_border(&ring.border(), tier));
    }

    let bounds = Hexagon::east_west(
        Position::ORIGIN,
        (2 * tiers + 2) as f64 * center_tile.inner_radius(),
    );
    sites.retain(|site| bounds.contains(site));
    sites
}
