//! Result sinks.
//!
//! An experiment hands its metrics to a [`ResultSink`] as named artifacts:
//! matrices and ragged row lists that replace any earlier artifact of the
//! same name, or single scalars. [`CsvSink`] writes `<name>.csv` files into
//! an output directory, [`MemorySink`] keeps everything in memory.
//!
//! ## Example
//!
//! ```rust
//! use raps_sim::results::{MemorySink, ResultSink};
//!
//! let mut sink = MemorySink::new();
//! sink.write_scalar("sumrate_dtx", 231.5).unwrap();
//! assert_eq!(sink.scalar("sumrate_dtx"), Some(231.5));
//! ```

use raps_core::types::{RapsError, RapsResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for named experiment artifacts.
pub trait ResultSink {
    /// Rectangular array, one line per row.
    fn write_matrix(&mut self, name: &str, matrix: &[Vec<f64>]) -> RapsResult<()>;

    /// Rows of differing length, such as SINR samples per iteration.
    fn write_rows(&mut self, name: &str, rows: &[Vec<f64>]) -> RapsResult<()>;

    fn write_scalar(&mut self, name: &str, value: f64) -> RapsResult<()>;
}

/// Comma-separated files in one directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    /// Creates `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> RapsResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| RapsError::Io(format!("{}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of artifact `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    fn write_lines(&self, name: &str, rows: &[Vec<f64>]) -> RapsResult<()> {
        let path = self.path(name);
        let io_err = |e: std::io::Error| RapsError::Io(format!("{}: {e}", path.display()));
        let mut out = BufWriter::new(File::create(&path).map_err(io_err)?);
        for row in rows {
            let line: Vec<String> = row.iter().map(|v| format_value(*v)).collect();
            writeln!(out, "{}", line.join(",")).map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
        debug!(path = %path.display(), rows = rows.len(), "wrote artifact");
        Ok(())
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else {
        format!("{v:e}")
    }
}

impl ResultSink for CsvSink {
    fn write_matrix(&mut self, name: &str, matrix: &[Vec<f64>]) -> RapsResult<()> {
        if let Some(first) = matrix.first() {
            if let Some(row) = matrix.iter().find(|r| r.len() != first.len()) {
                return Err(RapsError::DimensionMismatch {
                    expected: first.len(),
                    actual: row.len(),
                });
            }
        }
        self.write_lines(name, matrix)
    }

    fn write_rows(&mut self, name: &str, rows: &[Vec<f64>]) -> RapsResult<()> {
        self.write_lines(name, rows)
    }

    fn write_scalar(&mut self, name: &str, value: f64) -> RapsResult<()> {
        self.write_lines(name, &[vec![value]])
    }
}

/// In-memory artifacts, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: BTreeMap<String, Vec<Vec<f64>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifact(&self, name: &str) -> Option<&[Vec<f64>]> {
        self.artifacts.get(name).map(Vec::as_slice)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.artifact(name)?.first()?.first().copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }
}

impl ResultSink for MemorySink {
    fn write_matrix(&mut self, name: &str, matrix: &[Vec<f64>]) -> RapsResult<()> {
        self.artifacts.insert(name.to_string(), matrix.to_vec());
        Ok(())
    }

    fn write_rows(&mut self, name: &str, rows: &[Vec<f64>]) -> RapsResult<()> {
        self.write_matrix(name, rows)
    }

    fn write_scalar(&mut self, name: &str, value: f64) -> RapsResult<()> {
        self.artifacts.insert(name.to_string(), vec![vec![value]]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_sink_writes_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path().join("run")).unwrap();
        sink.write_matrix("result_dtx", &[vec![1.0, 2.0], vec![f64::NAN, 0.5]]).unwrap();
        sink.write_scalar("sumrate_dtx", 120.0).unwrap();

        let matrix = std::fs::read_to_string(sink.path("result_dtx")).unwrap();
        let lines: Vec<&str> = matrix.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].split(',').next(), Some("nan"));
        let parsed: f64 = lines[0].split(',').nth(1).unwrap().parse().unwrap();
        assert_eq!(parsed, 2.0);

        let scalar = std::fs::read_to_string(sink.path("sumrate_dtx")).unwrap();
        assert_eq!(scalar.trim().parse::<f64>().unwrap(), 120.0);
    }

    #[test]
    fn test_csv_sink_rejects_ragged_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path()).unwrap();
        assert!(sink.write_matrix("bad", &[vec![1.0], vec![1.0, 2.0]]).is_err());
        sink.write_rows("ragged", &[vec![1.0], vec![1.0, 2.0], vec![]]).unwrap();
        let text = std::fs::read_to_string(sink.path("ragged")).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_memory_sink_overwrites() {
        let mut sink = MemorySink::new();
        sink.write_rows("sinrs", &[vec![1.0, 2.0, 3.0]]).unwrap();
        sink.write_rows("sinrs", &[vec![4.0]]).unwrap();
        assert_eq!(sink.artifact("sinrs").unwrap(), &[vec![4.0]]);
        assert_eq!(sink.names().collect::<Vec<_>>(), vec!["sinrs"]);
        assert_eq!(sink.scalar("missing"), None);
    }
}
