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

/*! # nyx-relay-od

Relay satellite Doppler measurement models for orbit determination, in the [Nyx](https://nyxspace.com) ecosystem.

A relay Doppler measurement is built from the ranges of four signal paths, at either end of the Doppler count interval,
scaled by the effective and pilot frequencies of the relay. The differenced one-way Doppler subtracts the Doppler through
a reference relay from the Doppler through a comparison relay. Both provide the partials of the measurement with respect
to the estimated parameters, and can be simulated with noise and biases.
*/

/// All the input/output needs for this library, i.e. the YAML configuration of the models.
pub mod io;

/// All the orbit determination measurement models.
pub mod od;

/// Polynomial module, used by the frequency models
pub mod polyfit;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}
