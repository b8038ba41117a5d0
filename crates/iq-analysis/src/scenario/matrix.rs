// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dense row-major power matrix and its CSV form.
//!
//! CSV layout:
//! ```text
//! ,0,1,2,...        <- header: column indices
//! 0,v00,v01,v02,... <- first field: row index
//! ```

use std::io::{Read, Write};
use std::ops::{Index, IndexMut};

use thiserror::Error;

/// Errors reading a matrix back from CSV.
#[derive(Debug, Error)]
pub enum MatrixCsvError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("row {row} has {found} values, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid number '{value}' at row {row}, column {col}")]
    InvalidNumber { row: usize, col: usize, value: String },
}

/// `rows × cols` matrix of `f64`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl PowerMatrix {
    /// Matrix filled with `value`.
    #[must_use]
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Build a matrix cell by cell, visiting rows in order.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cell value, or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// Mutable cell, or `None` when out of bounds.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut f64> {
        if row < self.rows && col < self.cols {
            Some(&mut self.data[row * self.cols + col])
        } else {
            None
        }
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// All values in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Smallest and largest finite values.
    #[must_use]
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.cols + 1);
        header.push(String::new());
        header.extend((0..self.cols).map(|c| c.to_string()));
        csv_writer.write_record(&header)?;

        for r in 0..self.rows {
            let mut record = Vec::with_capacity(self.cols + 1);
            record.push(r.to_string());
            record.extend(self.row(r).iter().map(ToString::to_string));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Parse a matrix written by [`PowerMatrix::write_csv`].
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, MatrixCsvError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let cols = csv_reader.headers()?.len().saturating_sub(1);
        let mut data = Vec::new();
        let mut rows = 0;

        for record in csv_reader.records() {
            let record = record?;
            let found = record.len().saturating_sub(1);
            if found != cols {
                return Err(MatrixCsvError::Ragged {
                    row: rows,
                    expected: cols,
                    found,
                });
            }

            for (col, field) in record.iter().skip(1).enumerate() {
                let value = field.trim().parse::<f64>().map_err(|e| {
                    log::debug!("Matrix CSV parse failure: {e}");
                    MatrixCsvError::InvalidNumber {
                        row: rows,
                        col,
                        value: field.to_string(),
                    }
                })?;
                data.push(value);
            }
            rows += 1;
        }

        Ok(Self { rows, cols, data })
    }
}

impl Index<(usize, usize)> for PowerMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for PowerMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.cols + col]
    }
}
