use super::scripted::*;
use crate::test_config_dir;
use nyx::linalg::Vector6;
use nyx::od::prelude::*;
use rstest::*;
use std::sync::Arc;

#[fixture]
fn ephemeris() -> Arc<dyn EphemerisProvider> {
    Arc::new(
        LinearEphemeris::new()
            .with_object(
                "White Sands",
                epoch(),
                Vector6::new(6378.5, 0.0, 0.0, 0.0, 0.465, 0.0),
            )
            .with_object(
                "TDRS8",
                epoch(),
                Vector6::new(42164.0, 100.0, 0.0, 0.0, 3.0746, 0.0),
            )
            .with_object(
                "TDRS9",
                epoch(),
                Vector6::new(36515.0, 21082.0, 0.0, -1.5373, 2.6627, 0.0),
            )
            .with_object(
                "LEO",
                epoch(),
                Vector6::new(7000.0, 1500.0, 300.0, -1.2, 7.3, 0.5),
            ),
    )
}

/// Geometric paths through the relay, with the relay oscillator on the end spacecraft path.
fn geometric_paths(station: &str, relay: &str, user: &str, frequency_mhz: f64) -> RelayPaths {
    let path = |name: &str, from: &str, to: &str| {
        Box::new(GeometricRangeAdapter::new(
            format!("{relay} {name}"),
            vec![from.to_string(), to.to_string()],
        ))
    };
    RelayPaths::new(
        Box::new(
            GeometricRangeAdapter::new(
                format!("{relay} ESC"),
                vec![relay.to_string(), user.to_string()],
            )
            .with_transmitter(Oscillator::new(
                format!("{relay} oscillator"),
                frequency_mhz,
                FrequencyBand::S,
            )),
        ),
        path("EGS", station, relay),
        path("SSC", relay, user),
        path("SGS", station, relay),
    )
}

fn scripted_sim(seed: u64) -> RelayTrackingSim {
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log)).with_error_model(
        ErrorModel::builder()
            .measurement_type(MeasurementType::SnDopplerRtn)
            .noise_sigma(0.1)
            .build(),
    );
    relay.add_noise(true);
    RelayTrackingSim::new(Box::new(relay), seed).unwrap()
}

#[test]
fn repeatable_for_a_seed() {
    let _ = pretty_env_logger::try_init();
    let epochs = RelayTrackingSim::schedule(epoch(), epoch() + 1.minutes(), 10.seconds());
    assert_eq!(epochs.len(), 7);

    let first = scripted_sim(7).generate(&epochs).unwrap();
    let again = scripted_sim(7).generate(&epochs).unwrap();
    let other = scripted_sim(8).generate(&epochs).unwrap();

    assert_eq!(first, again);
    assert_ne!(first, other);
    for (sample, epoch) in first.iter().zip(&epochs) {
        assert_eq!(sample.epoch, *epoch);
        assert!(sample.is_feasible);
    }
    // The noise differs from one epoch to the next
    assert_ne!(first[0].value, first[1].value);
}

#[rstest]
#[case(7)]
#[case(100)]
fn single_chunk_matches_sequential(#[case] chunk_size: usize) {
    let epochs = RelayTrackingSim::schedule(epoch(), epoch() + 1.minutes(), 10.seconds());
    let mut sim = scripted_sim(21);
    let sequential = sim.generate(&epochs).unwrap();
    let parallel = sim.generate_par(&epochs, chunk_size).unwrap();
    assert_eq!(sequential, parallel);
}

#[test]
fn chunked_generation() {
    let epochs = RelayTrackingSim::schedule(epoch(), epoch() + 10.minutes(), 10.seconds());
    let sim = scripted_sim(21);
    let parallel = sim.generate_par(&epochs, 8).unwrap();
    assert_eq!(parallel, sim.generate_par(&epochs, 8).unwrap());
    assert_eq!(parallel.len(), epochs.len());
    for (sample, epoch) in parallel.iter().zip(&epochs) {
        assert_eq!(sample.epoch, *epoch);
    }
    // The simulator keeps its own copy of the adapter untouched
    assert!(sim.adapter().measurement().is_none());
}

#[rstest]
fn relay_from_yaml(ephemeris: Arc<dyn EphemerisProvider>) {
    let _ = pretty_env_logger::try_init();
    let config = RelayDopplerConfig::load(test_config_dir().join("relay.yaml")).unwrap();
    assert_eq!(config.doppler_count_interval, 10.seconds());
    assert_eq!(config.error_model().noise_sigma, 0.05);

    let mut relay = RelayDopplerAdapter::from_config(
        config,
        geometric_paths("White Sands", "TDRS8", "LEO", 2287.5),
    )
    .unwrap();
    relay.set_ephemeris(ephemeris);
    assert!(relay.settings().add_noise);

    let mut sim = RelayTrackingSim::new(Box::new(relay.clone()), 0).unwrap();
    let epochs = RelayTrackingSim::schedule(epoch(), epoch() + 2.minutes(), 10.seconds());
    let samples = sim.generate(&epochs).unwrap();
    assert_eq!(samples.len(), 13);
    for sample in &samples {
        assert!(sample.is_feasible, "{sample}");
        let metadata = sample.relay.unwrap();
        assert!([ServiceAccess::SA1, ServiceAccess::SA2].contains(&metadata.service_access));
        assert_eq!(metadata.node_frequency_hz, 2287.5e6);
        assert_eq!(metadata.count_interval, 10.seconds());
        assert_eq!(sample.covariance.as_ref().unwrap()[(0, 0)], 0.05_f64.powi(2));
    }

    // Replay of recorded tracking data
    relay.initialize().unwrap();
    let observations = Observation::load_many(test_config_dir().join("observations.yaml")).unwrap();
    assert_eq!(observations.len(), 2);
    for obs in &observations {
        let context = relay
            .calculate_measurement_with_context(false, Some(obs), None, false, None)
            .unwrap();
        let fields = obs.relay_fields().unwrap();
        let metadata = context.sample.relay.unwrap();
        assert_eq!(context.sample.epoch, obs.epoch);
        assert_eq!(metadata.service_access, fields.service_access);
        assert_eq!(metadata.count_interval, fields.doppler_count_interval);
        assert_eq!(metadata.smar_id, fields.smar_id);
    }
    // Multiple access through TDRS-8 uses the SMAR channel of the record
    let combination = relay.last_context().unwrap().combination.clone().unwrap();
    assert_eq!(combination.pilot_frequency_mhz, 13420.0);
    assert_eq!(combination.pilot_derivative, 0.0);
}

#[rstest]
fn differenced_from_yaml(ephemeris: Arc<dyn EphemerisProvider>) {
    let config = DifferencedDopplerConfig::load(test_config_dir().join("dowd.yaml")).unwrap();
    let error_model = config.error_model();
    assert_eq!(error_model.pass_biases, vec![0.1, -0.1]);
    assert_eq!(error_model.pass_start_epochs[1], epoch() + 6.hours());

    let mut dowd = DifferencedDopplerAdapter::from_config(
        config,
        geometric_paths("White Sands", "TDRS8", "LEO", 2000.0),
        geometric_paths("White Sands", "TDRS9", "LEO", 2000.0),
    )
    .unwrap();
    dowd.set_ephemeris(ephemeris);

    let sim = RelayTrackingSim::new(Box::new(dowd), 42).unwrap();
    let epochs = RelayTrackingSim::schedule(epoch(), epoch() + 5.minutes(), 30.seconds());
    let samples = sim.generate_par(&epochs, 4).unwrap();
    assert_eq!(samples.len(), 11);
    for sample in &samples {
        assert_eq!(sample.measurement_type, MeasurementType::SnDowd);
        assert!(sample.is_feasible, "{sample}");
        assert_eq!(sample.value.len(), 1);
        assert_eq!(sample.relay.unwrap().service_access, ServiceAccess::SA1);
        assert_eq!(sample.reference_relay.unwrap().service_access, ServiceAccess::MA);
    }
}
