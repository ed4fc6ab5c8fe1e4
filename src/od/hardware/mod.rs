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

use super::{ODError, UnsupportedBandSnafu};
use serde_derive::{Deserialize, Serialize};
use std::fmt;

mod oscillator;
pub use oscillator::{FrequencyModel, Oscillator, OscillatorSolveFor};

/// Radio frequency band of a transmitter, identified on tracking data by its numeric code.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrequencyBand {
    Unspecified,
    #[default]
    S,
    X,
    K,
}

impl FrequencyBand {
    /// Builds the band from its tracking data code: 0 unspecified, 1 S-band, 2 X-band, 3 K-band.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::S,
            2 => Self::X,
            3 => Self::K,
            _ => Self::Unspecified,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::S => 1,
            Self::X => 2,
            Self::K => 3,
        }
    }

    /// Returns the transponder turnaround ratio of this band.
    ///
    /// Only the S-band (240/221) and X-band (880/749) ratios are defined.
    pub fn turnaround_ratio(&self) -> Result<f64, ODError> {
        match self {
            Self::S => Ok(240.0 / 221.0),
            Self::X => Ok(880.0 / 749.0),
            _ => UnsupportedBandSnafu {
                band: *self,
                action: "turnaround ratio",
            }
            .fail(),
        }
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "unspecified (0)"),
            Self::S => write!(f, "S (1)"),
            Self::X => write!(f, "X (2)"),
            Self::K => write!(f, "K (3)"),
        }
    }
}
