//! Calibrated valve response curve.
//!
//! A proportional valve does not pass flow linearly in its drive duty cycle,
//! and opening follows a different curve from closing.  The calibration
//! table records, per duty cycle, the fraction of full response observed
//! while rising and while falling:
//!
//! ```text
//!   duty   rising  falling
//!   0.00   0.00    0.00
//!   0.40   0.05    0.12
//!   0.70   0.45    0.60
//!   1.00   1.00    1.00
//! ```
//!
//! Both directions of lookup are nearest-neighbour by absolute difference,
//! so rows may arrive in any order.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One measured point of the valve's response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRow {
    pub duty: f32,
    pub rising: f32,
    pub falling: f32,
}

impl CalibrationRow {
    pub const fn new(duty: f32, rising: f32, falling: f32) -> Self {
        Self {
            duty,
            rising,
            falling,
        }
    }

    fn column(&self, dir: Direction) -> f32 {
        match dir {
            Direction::Rising => self.rising,
            Direction::Falling => self.falling,
        }
    }
}

/// Which hysteresis branch to use for a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Rising,
    Falling,
}

/// Supplies calibration rows once at valve construction.
pub trait CalibrationSource {
    fn rows(&self) -> Result<Vec<CalibrationRow>>;
}

impl CalibrationSource for [CalibrationRow] {
    fn rows(&self) -> Result<Vec<CalibrationRow>> {
        Ok(self.to_vec())
    }
}

impl CalibrationSource for Vec<CalibrationRow> {
    fn rows(&self) -> Result<Vec<CalibrationRow>> {
        Ok(self.clone())
    }
}

/// Validated calibration table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCurve {
    rows: Vec<CalibrationRow>,
}

impl ResponseCurve {
    /// Straight-line response: 101 rows at 1 % spacing.
    pub fn linear() -> Self {
        let rows = (0..=100)
            .map(|i| {
                let f = i as f32 / 100.0;
                CalibrationRow::new(f, f, f)
            })
            .collect();
        Self { rows }
    }

    pub fn from_source<S: CalibrationSource + ?Sized>(source: &S) -> Result<Self> {
        Self::from_rows(source.rows()?)
    }

    pub fn from_rows(rows: Vec<CalibrationRow>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::config("calibration table is empty"));
        }
        for (i, row) in rows.iter().enumerate() {
            for (col, v) in [("duty", row.duty), ("rising", row.rising), ("falling", row.falling)] {
                if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                    return Err(Error::config(format!(
                        "calibration row {i}: {col}={v} not in [0, 1]"
                    )));
                }
            }
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[CalibrationRow] {
        &self.rows
    }

    /// Duty cycle that best produces setpoint `sp` in `[0, 100]`.
    pub fn duty_for(&self, sp: f32, dir: Direction) -> Result<f32> {
        if !(0.0..=100.0).contains(&sp) {
            return Err(Error::range("setpoint", sp, 0.0, 100.0));
        }
        let target = sp / 100.0;
        Ok(self.nearest(|row| row.column(dir), target).duty)
    }

    /// Setpoint in `[0, 100]` produced by driving at `duty`.
    pub fn setpoint_for(&self, duty: f32, dir: Direction) -> f32 {
        self.nearest(|row| row.duty, duty).column(dir) * 100.0
    }

    fn nearest(&self, key: impl Fn(&CalibrationRow) -> f32, target: f32) -> &CalibrationRow {
        // Non-empty by construction; first row wins ties.
        let mut best = &self.rows[0];
        let mut best_diff = (key(best) - target).abs();
        for row in &self.rows[1..] {
            let diff = (key(row) - target).abs();
            if diff < best_diff {
                best = row;
                best_diff = diff;
            }
        }
        best
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn setpoint_lookup_returns_a_table_duty(
            rows in proptest::collection::vec((0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0), 1..32),
            sp in 0.0f32..=100.0,
        ) {
            let rows: Vec<_> = rows.into_iter().map(|(d, r, f)| CalibrationRow::new(d, r, f)).collect();
            let c = ResponseCurve::from_rows(rows.clone()).unwrap();
            let duty = c.duty_for(sp, Direction::Rising).unwrap();
            prop_assert!(rows.iter().any(|r| r.duty == duty));
        }
    }
}
