//! Core types for OFDMA network simulation
//!
//! This module defines the fundamental value types shared by every layer of the
//! simulator: complex channel coefficients, planar positions, the OFDMA
//! resource grid and the error taxonomy.
//!
//! ## The OFDMA frame
//!
//! One simulated frame is a grid of `N` frequency chunks by `T` timeslots. Each
//! (chunk, timeslot) pair is a resource block, the atomic allocation unit.
//!
//! ```text
//!   chunk
//!     ^
//!  N-1|  .   .   .   .
//!     |  .   .   .   .
//!    1|  .   .   .   .
//!    0|  .   .   .   .
//!     +-----------------> timeslot
//!        0   1  ...  T-1
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// Result type for simulator operations
pub type RapsResult<T> = Result<T, RapsError>;

/// Errors that can occur while building or running a simulation
#[derive(Debug, Clone, thiserror::Error)]
pub enum RapsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Geometric inconsistency: {0}")]
    Geometry(String),

    #[error("Overload: {0}")]
    Overload(String),

    #[error("Optimization failed: {0}")]
    Optimization(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Numerical consistency violation: {0}")]
    Consistency(String),

    #[error("Association error: {0}")]
    Association(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cell {0} has no mobiles attached")]
    EmptyCell(usize),

    #[error("I/O error: {0}")]
    Io(String),
}

impl RapsError {
    /// Whether a multi-frame experiment may record this failure as a missed
    /// frame and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RapsError::Overload(_) | RapsError::EmptyCell(_) | RapsError::Optimization(_)
        )
    }
}

impl From<std::io::Error> for RapsError {
    fn from(err: std::io::Error) -> Self {
        RapsError::Io(err.to_string())
    }
}

/// A point in the simulation plane, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Distance from the origin.
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Point reflected through `center`.
    pub fn reflect_through(&self, center: &Position) -> Position {
        Position::new(2.0 * center.x - self.x, 2.0 * center.y - self.y)
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Dense `[chunks, timeslots]` grid, one value per resource block.
///
/// Storage is chunk-major: block `(n, t)` lives at `n * timeslots + t`. That is
/// also the flat block index used wherever blocks are ranked or sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGrid<T> {
    chunks: usize,
    timeslots: usize,
    data: Vec<T>,
}

impl<T: Clone> ResourceGrid<T> {
    /// Grid with every block set to `value`.
    pub fn filled(chunks: usize, timeslots: usize, value: T) -> Self {
        Self {
            chunks,
            timeslots,
            data: vec![value; chunks * timeslots],
        }
    }

    /// Set every block to `value`.
    pub fn fill(&mut self, value: T) {
        for v in self.data.iter_mut() {
            *v = value.clone();
        }
    }
}

impl<T> ResourceGrid<T> {
    /// Build a grid from a generator called once per block.
    pub fn from_fn(chunks: usize, timeslots: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(chunks * timeslots);
        for n in 0..chunks {
            for t in 0..timeslots {
                data.push(f(n, t));
            }
        }
        Self {
            chunks,
            timeslots,
            data,
        }
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn timeslots(&self) -> usize {
        self.timeslots
    }

    /// Number of resource blocks.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of block `(n, t)`.
    #[inline]
    pub fn index(&self, n: usize, t: usize) -> usize {
        n * self.timeslots + t
    }

    /// Inverse of [`ResourceGrid::index`].
    #[inline]
    pub fn coords(&self, flat: usize) -> (usize, usize) {
        (flat / self.timeslots, flat % self.timeslots)
    }

    #[inline]
    pub fn get(&self, n: usize, t: usize) -> &T {
        &self.data[n * self.timeslots + t]
    }

    #[inline]
    pub fn get_mut(&mut self, n: usize, t: usize) -> &mut T {
        &mut self.data[n * self.timeslots + t]
    }

    #[inline]
    pub fn set(&mut self, n: usize, t: usize, value: T) {
        self.data[n * self.timeslots + t] = value;
    }

    /// Blocks in flat order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data.iter_mut()
    }

    /// Values of one timeslot, in chunk order.
    pub fn timeslot(&self, t: usize) -> impl Iterator<Item = &T> {
        (0..self.chunks).map(move |n| &self.data[n * self.timeslots + t])
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Apply `f` to every block, producing a new grid of the same shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> ResourceGrid<U> {
        ResourceGrid {
            chunks: self.chunks,
            timeslots: self.timeslots,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl ResourceGrid<f64> {
    /// Sum over all blocks.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Mean over all blocks.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert_relative_eq!(a.distance_to(&b), 5.0, epsilon = 1e-12);
        assert_relative_eq!(b.norm(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_position_reflection() {
        let p = Position::new(1.0, 2.0);
        let c = Position::new(0.5, 0.5);
        assert_eq!(p.reflect_through(&c), Position::new(0.0, -1.0));
        assert_eq!(p.reflect_through(&c).reflect_through(&c), p);
    }

    #[test]
    fn test_grid_indexing() {
        let grid = ResourceGrid::from_fn(3, 4, |n, t| n * 10 + t);
        assert_eq!(grid.len(), 12);
        assert_eq!(*grid.get(2, 3), 23);
        assert_eq!(grid.index(1, 2), 6);
        assert_eq!(grid.coords(6), (1, 2));
        let slot: Vec<usize> = grid.timeslot(1).copied().collect();
        assert_eq!(slot, vec![1, 11, 21]);
    }

    #[test]
    fn test_grid_fill_and_mean() {
        let mut grid = ResourceGrid::filled(2, 2, 1.0);
        grid.set(0, 0, 5.0);
        assert_relative_eq!(grid.sum(), 8.0);
        assert_relative_eq!(grid.mean(), 2.0);
        grid.fill(0.0);
        assert_relative_eq!(grid.sum(), 0.0);
    }

    #[test]
    fn test_error_recoverability() {
        assert!(RapsError::Overload("x".into()).is_recoverable());
        assert!(RapsError::EmptyCell(3).is_recoverable());
        assert!(!RapsError::Consistency("x".into()).is_recoverable());
        assert!(!RapsError::NotImplemented("x".into()).is_recoverable());
    }
}
