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

use crate::od::adapter::TrackingAdapter;
use crate::od::msr::MeasurementSample;
use crate::od::ODError;
use crate::time::{Duration, Epoch, TimeSeries};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;

/// Simulates the measurements of a tracking adapter over a schedule of epochs.
///
/// The adapter is evaluated in simulation mode: the service access is drawn from its candidates and
/// noise and bias are added as configured in its settings. Results are repeatable for a given seed.
#[derive(Clone, Debug)]
pub struct RelayTrackingSim {
    adapter: Box<dyn TrackingAdapter>,
    seed: u64,
}

impl RelayTrackingSim {
    /// Initializes the adapter and builds a simulator around it.
    pub fn new(mut adapter: Box<dyn TrackingAdapter>, seed: u64) -> Result<Self, ODError> {
        adapter.initialize()?;
        Ok(Self { adapter, seed })
    }

    pub fn adapter(&self) -> &dyn TrackingAdapter {
        self.adapter.as_ref()
    }

    /// Every `step` between `start` and `end`, both included.
    pub fn schedule(start: Epoch, end: Epoch, step: Duration) -> Vec<Epoch> {
        TimeSeries::inclusive(start, end, step).collect()
    }

    /// Generates one measurement per epoch, in order, from a single generator seeded with the seed of this simulator.
    pub fn generate(&mut self, epochs: &[Epoch]) -> Result<Vec<MeasurementSample>, ODError> {
        let mut rng = Pcg64Mcg::seed_from_u64(self.seed);
        let samples = Self::run(self.adapter.as_mut(), epochs, &mut rng)?;
        info!(
            "{}: generated {} measurements ({} feasible)",
            self.adapter.name(),
            samples.len(),
            samples.iter().filter(|s| s.is_feasible).count()
        );
        Ok(samples)
    }

    /// Generates the measurements in parallel, one deep copy of the adapter per chunk of `chunk_size` epochs.
    ///
    /// Chunk `i` uses its own generator seeded with `seed + i`, so the noise differs from [Self::generate]
    /// but is repeatable for a given chunk size.
    pub fn generate_par(
        &self,
        epochs: &[Epoch],
        chunk_size: usize,
    ) -> Result<Vec<MeasurementSample>, ODError> {
        let chunks = epochs
            .par_chunks(chunk_size.max(1))
            .enumerate()
            .map(|(i, chunk)| {
                let mut adapter = self.adapter.clone();
                let mut rng = Pcg64Mcg::seed_from_u64(self.seed.wrapping_add(i as u64));
                Self::run(adapter.as_mut(), chunk, &mut rng)
            })
            .collect::<Result<Vec<Vec<MeasurementSample>>, ODError>>()?;

        let samples = chunks.into_iter().flatten().collect::<Vec<_>>();
        info!(
            "{}: generated {} measurements in parallel",
            self.adapter.name(),
            samples.len()
        );
        Ok(samples)
    }

    fn run(
        adapter: &mut dyn TrackingAdapter,
        epochs: &[Epoch],
        rng: &mut Pcg64Mcg,
    ) -> Result<Vec<MeasurementSample>, ODError> {
        let mut samples = Vec::with_capacity(epochs.len());
        for epoch in epochs {
            adapter.set_simulation_epoch(*epoch);
            samples.push(adapter.calculate_measurement(false, None, None, true, Some(&mut *rng))?);
        }
        Ok(samples)
    }
}
