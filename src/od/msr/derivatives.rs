/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::linalg::DMatrix;
use crate::od::{DerivativeSizeSnafu, ODError};
use snafu::ensure;

/// Measurement partials: one row per signal path, one column per scalar component of the solve-for parameter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivativeTable {
    rows: Vec<Vec<f64>>,
}

impl DerivativeTable {
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// A table of `rows` rows of `columns` zeros.
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self {
            rows: vec![vec![0.0; columns]; rows],
        }
    }

    pub fn from_row(row: Vec<f64>) -> Self {
        Self { rows: vec![row] }
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns, ensuring that every row has the same size.
    pub fn validate(&self, adapter: &str, path: &str) -> Result<usize, ODError> {
        ensure!(
            !self.rows.is_empty(),
            DerivativeSizeSnafu {
                adapter,
                details: format!("derivative data for the {path} path is empty"),
            }
        );
        let columns = self.rows[0].len();
        for (i, row) in self.rows.iter().enumerate() {
            ensure!(
                row.len() == columns,
                DerivativeSizeSnafu {
                    adapter,
                    details: format!(
                        "derivative data size for the {path} path is a different size than expected: row {i} has {} columns instead of {columns}",
                        row.len()
                    ),
                }
            );
        }
        Ok(columns)
    }

    /// Validates that every table has the same shape, returning that shape as (rows, columns).
    pub fn validate_siblings(
        adapter: &str,
        tables: &[(&str, &DerivativeTable)],
    ) -> Result<(usize, usize), ODError> {
        let mut shape: Option<(&str, usize, usize)> = None;
        for (path, table) in tables {
            let columns = table.validate(adapter, path)?;
            match shape {
                None => shape = Some((*path, table.row_count(), columns)),
                Some((first, rows, cols)) => {
                    ensure!(
                        table.row_count() == rows,
                        DerivativeSizeSnafu {
                            adapter,
                            details: format!(
                                "the {path} path has {} derivative rows but the {first} path has {rows}",
                                table.row_count()
                            ),
                        }
                    );
                    ensure!(
                        columns == cols,
                        DerivativeSizeSnafu {
                            adapter,
                            details: format!(
                                "the {path} path has {columns} derivative columns but the {first} path has {cols}"
                            ),
                        }
                    );
                }
            }
        }
        Ok(shape.map(|(_, rows, cols)| (rows, cols)).unwrap_or((0, 0)))
    }

    /// Computes `Σ w_k · table_k` after validating that all tables have the same shape.
    pub fn weighted_sum(
        adapter: &str,
        terms: &[(&str, &DerivativeTable, f64)],
    ) -> Result<Self, ODError> {
        let tables = terms
            .iter()
            .map(|(path, table, _)| (*path, *table))
            .collect::<Vec<_>>();
        let (rows, columns) = Self::validate_siblings(adapter, &tables)?;

        let mut sum = Self::zeros(rows, columns);
        for (_, table, weight) in terms {
            for (acc_row, row) in sum.rows.iter_mut().zip(table.rows.iter()) {
                for (acc, partial) in acc_row.iter_mut().zip(row.iter()) {
                    *acc += weight * partial;
                }
            }
        }
        Ok(sum)
    }

    /// Converts this table into a matrix, failing if the rows are ragged.
    pub fn to_matrix(&self, adapter: &str) -> Result<DMatrix<f64>, ODError> {
        let columns = self.validate(adapter, "requested")?;
        Ok(DMatrix::from_fn(self.row_count(), columns, |i, j| {
            self.rows[i][j]
        }))
    }
}
