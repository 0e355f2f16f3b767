//! JSON calibration file source.
//!
//! The file holds an array of `[duty, rising, falling]` triples, one per
//! measured point, in any order:
//!
//! ```json
//! [[0.0, 0.0, 0.0], [0.4, 0.05, 0.12], [1.0, 1.0, 1.0]]
//! ```

use std::path::{Path, PathBuf};

use crate::drivers::response::{CalibrationRow, CalibrationSource};
use crate::error::{Error, Result};

pub struct JsonCalibrationFile {
    path: PathBuf,
}

impl JsonCalibrationFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CalibrationSource for JsonCalibrationFile {
    fn rows(&self) -> Result<Vec<CalibrationRow>> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::config(format!("{}: {e}", self.path.display())))?;
        parse_rows(&text).map_err(|e| Error::config(format!("{}: {e}", self.path.display())))
    }
}

fn parse_rows(text: &str) -> core::result::Result<Vec<CalibrationRow>, serde_json::Error> {
    let triples: Vec<(f32, f32, f32)> = serde_json::from_str(text)?;
    Ok(triples
        .into_iter()
        .map(|(duty, rising, falling)| CalibrationRow::new(duty, rising, falling))
        .collect())
}
