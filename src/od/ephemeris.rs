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

use crate::linalg::{Vector3, Vector6};
use crate::time::Epoch;
use std::collections::HashMap;
use std::fmt::Debug;

/// Provides the Cartesian states (km, km/s) of the tracking participants, in a common inertial frame.
pub trait EphemerisProvider: Send + Sync + Debug {
    /// Returns the state of the object at the epoch, or None if it is not available.
    fn state(&self, object: &str, epoch: Epoch) -> Option<Vector6<f64>>;

    /// Returns whether the ephemerides cover this epoch.
    fn check_epoch_validity(&self, epoch: Epoch) -> bool;

    /// Returns the position of the object at the epoch.
    fn position(&self, object: &str, epoch: Epoch) -> Option<Vector3<f64>> {
        self.state(object, epoch).map(|state| state.fixed_rows::<3>(0).into_owned())
    }
}

/// Straight line ephemerides: every object moves at a constant velocity from its reference state.
#[derive(Clone, Debug, Default)]
pub struct LinearEphemeris {
    objects: HashMap<String, (Epoch, Vector6<f64>)>,
    start: Option<Epoch>,
    end: Option<Epoch>,
}

impl LinearEphemeris {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an object with its state at the reference epoch.
    pub fn with_object<S: Into<String>>(mut self, name: S, epoch: Epoch, state: Vector6<f64>) -> Self {
        self.objects.insert(name.into(), (epoch, state));
        self
    }

    /// Restricts the coverage of these ephemerides.
    pub fn with_coverage(mut self, start: Epoch, end: Epoch) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Adds `delta` to the component `index` of the reference state of the object.
    pub fn perturb(&mut self, name: &str, index: usize, delta: f64) {
        if let Some((_, state)) = self.objects.get_mut(name) {
            state[index] += delta;
        }
    }
}

impl EphemerisProvider for LinearEphemeris {
    fn state(&self, object: &str, epoch: Epoch) -> Option<Vector6<f64>> {
        if !self.check_epoch_validity(epoch) {
            return None;
        }
        let (ref_epoch, ref_state) = self.objects.get(object)?;
        let dt_s = (epoch - *ref_epoch).to_seconds();
        let mut state = *ref_state;
        for i in 0..3 {
            state[i] += dt_s * ref_state[i + 3];
        }
        Some(state)
    }

    fn check_epoch_validity(&self, epoch: Epoch) -> bool {
        self.start.map_or(true, |start| epoch >= start) && self.end.map_or(true, |end| epoch <= end)
    }
}
