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

use super::MeasurementType;
use crate::linalg::DMatrix;
use crate::od::relay::RelayMetadata;
use crate::time::Epoch;
use std::fmt;

/// Reason code of a measurement feasibility outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnfeasibleReason {
    /// Feasible ("N")
    #[default]
    Normal,
    /// Line of sight is blocked ("B")
    Blocked,
    /// Outside of the ephemeris coverage ("EGAP")
    EphemerisGap,
    /// Rejected ("R")
    Rejected,
    /// Any other code reported by a primitive adapter
    Other(String),
}

impl UnfeasibleReason {
    pub fn code(&self) -> &str {
        match self {
            Self::Normal => "N",
            Self::Blocked => "B",
            Self::EphemerisGap => "EGAP",
            Self::Rejected => "R",
            Self::Other(code) => code.as_str(),
        }
    }
}

impl From<&str> for UnfeasibleReason {
    fn from(code: &str) -> Self {
        match code {
            "N" => Self::Normal,
            "B" => Self::Blocked,
            "EGAP" => Self::EphemerisGap,
            "R" => Self::Rejected,
            _ => Self::Other(code.to_string()),
        }
    }
}

impl fmt::Display for UnfeasibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Result of one primitive or composite measurement computation.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementSample {
    pub measurement_type: MeasurementType,
    /// Epoch of the measurement time tag
    pub epoch: Epoch,
    /// One value per signal path
    pub value: Vec<f64>,
    /// One correction per signal path
    pub correction: Vec<f64>,
    pub is_feasible: bool,
    pub unfeasible_reason: UnfeasibleReason,
    pub feasibility_value: f64,
    pub iono_correction: f64,
    pub tropo_correction: f64,
    /// Measurement error covariance, if an error model was applied
    pub covariance: Option<DMatrix<f64>>,
    /// Resolved relay metadata, for relay observables
    pub relay: Option<RelayMetadata>,
    /// Resolved metadata of the reference relay, for differenced observables
    pub reference_relay: Option<RelayMetadata>,
}

impl MeasurementSample {
    /// Initializes a feasible sample without any value.
    pub fn new(measurement_type: MeasurementType, epoch: Epoch) -> Self {
        Self {
            measurement_type,
            epoch,
            value: Vec::new(),
            correction: Vec::new(),
            is_feasible: true,
            unfeasible_reason: UnfeasibleReason::Normal,
            feasibility_value: 0.0,
            iono_correction: 0.0,
            tropo_correction: 0.0,
            covariance: None,
            relay: None,
            reference_relay: None,
        }
    }

    /// Initializes an infeasible sample without any value.
    pub fn infeasible(
        measurement_type: MeasurementType,
        epoch: Epoch,
        reason: UnfeasibleReason,
    ) -> Self {
        let mut me = Self::new(measurement_type, epoch);
        me.is_feasible = false;
        me.unfeasible_reason = reason;
        me
    }

    /// Number of signal paths in this sample.
    pub fn signal_paths(&self) -> usize {
        self.value.len()
    }

    /// Adopts the feasibility of another sample.
    pub(crate) fn adopt_feasibility(&mut self, other: &Self) {
        self.is_feasible = other.is_feasible;
        self.unfeasible_reason = other.unfeasible_reason.clone();
        self.feasibility_value = other.feasibility_value;
    }
}

impl fmt::Display for MeasurementSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}: {:?} ({})",
            self.measurement_type, self.epoch, self.value, self.unfeasible_reason
        )
    }
}
