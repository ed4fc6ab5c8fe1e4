use super::scripted::*;
use anise::constants::SPEED_OF_LIGHT_KM_S;
use approx::assert_abs_diff_eq;
use nyx::linalg::Vector6;
use nyx::od::noise::BiasSolveFor;
use nyx::od::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use rstest::*;
use std::sync::Arc;

fn scenario_value() -> f64 {
    let c = SPEED_OF_LIGHT_KM_S;
    (-2000e6 / c) * 7000.0 + (2000e6 / c) * 6999.0 + (-1000e6 / c) * 7000.5 + (1000e6 / c) * 6999.4
}

fn simulate(relay: &mut RelayDopplerAdapter) -> Result<RelayCallContext, ODError> {
    relay.set_simulation_epoch(epoch());
    relay.calculate_measurement_with_context(false, None, None, true, None)
}

#[test]
fn relay_doppler_scenario() {
    let _ = pretty_env_logger::try_init();
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log));

    let context = simulate(&mut relay).unwrap();
    let sample = &context.sample;

    assert_eq!(sample.measurement_type, MeasurementType::SnDopplerRtn);
    assert!(sample.is_feasible);
    assert_eq!(sample.unfeasible_reason, UnfeasibleReason::Normal);
    assert_abs_diff_eq!(sample.value[0], scenario_value(), epsilon = 1e-6);
    assert_eq!(sample.correction, vec![0.0]);
    // Attached even without any noise
    assert_eq!(sample.covariance.as_ref().unwrap()[(0, 0)], 103.0_f64.powi(2));

    let combination = context.combination.unwrap();
    assert_eq!(combination.effective_frequency_mhz, 2000.0);
    assert_eq!(combination.pilot_frequency_mhz, 1000.0);
    assert_eq!(
        combination.multipliers.start_spacecraft,
        -combination.multipliers.end_spacecraft
    );

    let metadata = sample.relay.unwrap();
    assert_eq!(metadata.service_access, ServiceAccess::SA1);
    assert_eq!(metadata.node_frequency_hz, 2.0e9);
    assert_eq!(metadata.band, FrequencyBand::S);
    assert_eq!(metadata.count_interval, 1.seconds());

    let measured = log
        .entries()
        .into_iter()
        .filter(|entry| entry.contains("measure"))
        .collect::<Vec<_>>();
    assert_eq!(measured.len(), 4);
    for (entry, path) in measured.iter().zip(["ESC", "EGS", "SSC", "SGS"]) {
        assert!(entry.starts_with(path), "{entry} out of order");
        assert!(entry.contains("noise=false bias=false range_only=true"));
    }
}

#[test]
fn count_interval_on_start_paths_only() {
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log));
    let obs = Observation::new(
        epoch(),
        MeasurementType::SnDopplerRtn,
        relay.participants().to_vec(),
        vec![0.0],
    )
    .with_relay(relay_fields(10.seconds(), ServiceAccess::SA2));

    let context = relay
        .calculate_measurement_with_context(false, Some(&obs), None, false, None)
        .unwrap();

    let intervals = log
        .entries()
        .into_iter()
        .filter(|entry| entry.contains("count interval"))
        .collect::<Vec<_>>();
    assert_eq!(
        intervals,
        vec![
            "SSC count interval 10 s".to_string(),
            "SGS count interval 10 s".to_string()
        ]
    );

    let metadata = context.sample.relay.unwrap();
    assert_eq!(metadata.service_access, ServiceAccess::SA2);
    assert_eq!(metadata.count_interval, 10.seconds());
    assert_eq!(context.sample.epoch, epoch());
    assert_abs_diff_eq!(
        context.sample.value[0],
        scenario_value() / 10.0,
        epsilon = 1e-6
    );
}

#[rstest]
#[case(2000.0, FrequencyBand::S, ServiceAccess::SA1)]
#[case(2287.5, FrequencyBand::S, ServiceAccess::SA2)]
#[case(13775.0, FrequencyBand::K, ServiceAccess::SA1)]
#[case(2106.4, FrequencyBand::S, ServiceAccess::MA)]
fn zero_ranges_give_zero_doppler(
    #[case] frequency_mhz: f64,
    #[case] band: FrequencyBand,
    #[case] service: ServiceAccess,
) {
    let mut relay = relay_adapter([
        ScriptedAdapter::new("ESC", 0.0).with_frequency(frequency_mhz, band),
        ScriptedAdapter::new("EGS", 0.0),
        ScriptedAdapter::new("SSC", 0.0),
        ScriptedAdapter::new("SGS", 0.0),
    ])
    .with_pilots(Arc::new(SpaceNetworkPilots));
    relay.set_service_access(vec![service]);

    let sample = simulate(&mut relay).unwrap().sample;
    assert_eq!(sample.value, vec![0.0]);
    assert_eq!(sample.correction, vec![0.0]);
}

#[rstest]
#[case([false, false, false, true], "R3", -4.0)]
#[case([false, false, true, true], "R2", -3.0)]
#[case([false, true, true, false], "R1", -2.0)]
#[case([true, true, true, true], "R0", -1.0)]
#[case([false, false, false, false], "N", 42.0)]
fn feasibility_precedence(
    #[case] infeasible: [bool; 4],
    #[case] reason: &str,
    #[case] feasibility_value: f64,
) {
    let log = CallLog::default();
    let mut paths = scenario_paths(&log);
    paths[0] = paths[0].clone().with_feasibility_value(42.0);
    let paths = paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
            if infeasible[i] {
                path.infeasible(&format!("R{i}"), -(i as f64) - 1.0)
            } else {
                path
            }
        })
        .collect::<Vec<_>>();
    let paths: [ScriptedAdapter; 4] = paths.try_into().unwrap();

    let mut relay = relay_adapter(paths);
    let sample = simulate(&mut relay).unwrap().sample;

    assert_eq!(sample.is_feasible, reason == "N");
    assert_eq!(sample.unfeasible_reason.code(), reason);
    assert_eq!(sample.feasibility_value, feasibility_value);
    // The value is computed whatever the feasibility
    assert_abs_diff_eq!(sample.value[0], scenario_value(), epsilon = 1e-6);
}

#[rstest]
#[case(1.0)]
#[case(2.5)]
fn path_multiplier_factor_is_removed(#[case] factor: f64) {
    let log = CallLog::default();
    let paths = scenario_paths(&log).map(|path| path.with_factor(factor));
    let mut relay = relay_adapter(paths);
    let sample = simulate(&mut relay).unwrap().sample;
    assert_abs_diff_eq!(sample.value[0], scenario_value(), epsilon = 1e-6);
}

#[test]
fn media_corrections() {
    let log = CallLog::default();
    let mut paths = scenario_paths(&log);
    paths[0] = paths[0].clone().with_media(0.002, 0.001).with_corrections(vec![0.003]);
    let mut relay = relay_adapter(paths);
    relay.add_media_correction(true);

    let context = simulate(&mut relay).unwrap();
    let esc = context.combination.unwrap().multipliers.end_spacecraft;
    assert_abs_diff_eq!(relay.iono_correction(), esc * 0.002, epsilon = 1e-9);
    assert_abs_diff_eq!(relay.tropo_correction(), esc * 0.001, epsilon = 1e-9);
    assert_abs_diff_eq!(context.sample.correction[0], esc * 0.003, epsilon = 1e-9);
    assert!(log.entries().iter().any(|entry| entry.contains("media=true")));
}

fn noisy_error_model(relay: &RelayDopplerAdapter) -> ErrorModel {
    ErrorModel::builder()
        .measurement_type(MeasurementType::SnDopplerRtn)
        .participants(relay.participants().to_vec())
        .noise_sigma(0.5)
        .bias(3.0)
        .build()
}

#[test]
fn noise_then_bias() {
    let _ = pretty_env_logger::try_init();
    let log = CallLog::default();
    let relay = relay_adapter(scenario_paths(&log));
    let error_model = noisy_error_model(&relay);
    let mut relay = relay.with_error_model(error_model);
    let obs = Observation::new(
        epoch(),
        MeasurementType::SnDopplerRtn,
        relay.participants().to_vec(),
        vec![0.0],
    )
    .with_relay(relay_fields(1.seconds(), ServiceAccess::SA1));

    let clean = relay
        .calculate_measurement_with_context(false, Some(&obs), None, false, None)
        .unwrap();
    assert!(clean.injected.noise.is_empty());
    assert_eq!(clean.injected.bias, 0.0);

    relay.add_noise(true);
    relay.add_bias(true);
    let mut rng = Pcg64Mcg::seed_from_u64(7);
    let noisy = relay
        .calculate_measurement_with_context(false, Some(&obs), None, false, Some(&mut rng))
        .unwrap();

    let mut replay_rng = Pcg64Mcg::seed_from_u64(7);
    let expected_noise =
        WhiteNoise::constant_white_noise(0.5).sample(epoch(), &mut replay_rng);

    assert_eq!(noisy.injected.noise, vec![expected_noise]);
    assert_eq!(noisy.injected.bias, 3.0);
    assert_abs_diff_eq!(
        noisy.sample.value[0] - clean.sample.value[0],
        expected_noise + 3.0,
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(noisy.sample.correction[0], expected_noise + 3.0, epsilon = 1e-12);
    assert_eq!(noisy.sample.covariance.unwrap()[(0, 0)], 0.25);

    // Range only never corrupts the measurement
    relay.set_range_only(true);
    let range_only = relay
        .calculate_measurement_with_context(false, Some(&obs), None, false, Some(&mut rng))
        .unwrap();
    assert_eq!(range_only.sample.value, clean.sample.value);
}

#[test]
fn no_noise_on_infeasible() {
    let log = CallLog::default();
    let mut paths = scenario_paths(&log);
    paths[1] = paths[1].clone().infeasible("B", -12.0);
    let relay = relay_adapter(paths);
    let error_model = noisy_error_model(&relay);
    let mut relay = relay.with_error_model(error_model);
    relay.add_noise(true);
    relay.add_bias(true);

    let mut rng = Pcg64Mcg::seed_from_u64(7);
    relay.set_simulation_epoch(epoch());
    let context = relay
        .calculate_measurement_with_context(false, None, None, true, Some(&mut rng))
        .unwrap();
    assert!(!context.sample.is_feasible);
    assert_eq!(context.sample.unfeasible_reason, UnfeasibleReason::Blocked);
    assert!(context.injected.noise.is_empty());
    assert_abs_diff_eq!(context.sample.value[0], scenario_value(), epsilon = 1e-6);
    assert!(context.sample.covariance.is_some());
}

#[test]
fn pass_bias_of_the_current_pass() {
    let log = CallLog::default();
    let relay = relay_adapter(scenario_paths(&log));
    let error_model = ErrorModel::builder()
        .measurement_type(MeasurementType::SnDopplerRtn)
        .participants(relay.participants().to_vec())
        .noise_sigma(0.5)
        .pass_biases(vec![1.0, 2.0, 4.0])
        .pass_start_epochs(vec![
            epoch() - 2.hours(),
            epoch() - 1.hours(),
            epoch() + 1.hours(),
        ])
        .solve_fors(vec![BiasSolveFor::PassBiases])
        .build();
    let mut relay = relay.with_error_model(error_model.clone());
    relay.initialize().unwrap();
    relay.add_bias(true);

    let context = simulate(&mut relay).unwrap();
    assert_eq!(context.injected.bias, 2.0);
    assert_abs_diff_eq!(context.sample.value[0], scenario_value() + 2.0, epsilon = 1e-6);

    let partials = relay
        .calculate_measurement_derivatives(&SolveFor::PassBiases(&error_model))
        .unwrap();
    assert_eq!(partials.rows(), &[vec![0.0, 1.0, 0.0]]);
}

#[test]
fn position_partials_are_weighted_sums() {
    let log = CallLog::default();
    let [esc, egs, ssc, sgs] = scenario_paths(&log);
    let mut relay = relay_adapter([
        esc.with_partials(vec![vec![1.0, 0.0, 0.0]]),
        egs.with_partials(vec![vec![0.0, 1.0, 0.0]]),
        ssc.with_partials(vec![vec![0.0, 0.0, 1.0]]),
        sgs.with_partials(vec![vec![1.0, 1.0, 1.0]]),
    ]);
    let m = simulate(&mut relay).unwrap().combination.unwrap().multipliers;

    let partials = relay
        .calculate_measurement_derivatives(&SolveFor::Position("LEO"))
        .unwrap();
    let expected = [
        m.end_spacecraft + m.start_ground_station,
        m.end_ground_station + m.start_ground_station,
        m.start_spacecraft + m.start_ground_station,
    ];
    for (partial, expected) in partials.rows()[0].iter().zip(expected) {
        assert_abs_diff_eq!(*partial, expected, epsilon = 1e-9);
    }

    // Perturbing the range of the end spacecraft path changes the Doppler by its multiplier
    let delta = 1e-3;
    let base = relay.measurement().unwrap().value[0];
    let [_, egs, ssc, sgs] = scenario_paths(&log);
    let mut perturbed = relay_adapter([
        ScriptedAdapter::new("ESC", 7000.0 + delta).with_frequency(2000.0, FrequencyBand::S),
        egs,
        ssc,
        sgs,
    ]);
    let value = simulate(&mut perturbed).unwrap().sample.value[0];
    assert_abs_diff_eq!((value - base) / delta, m.end_spacecraft, epsilon = 1e-3);
}

#[test]
fn non_geometric_partials_come_from_end_spacecraft() {
    let log = CallLog::default();
    let [esc, egs, ssc, sgs] = scenario_paths(&log);
    let mut relay = relay_adapter([
        esc.with_partials(vec![vec![1.0, 2.0]]),
        egs.with_partials(vec![vec![9.0, 9.0]]),
        ssc.with_partials(vec![vec![9.0, 9.0]]),
        sgs.with_partials(vec![vec![9.0, 9.0]]),
    ]);
    simulate(&mut relay).unwrap();
    let partials = relay
        .calculate_measurement_derivatives(&SolveFor::Other {
            object: "TDRS8",
            parameter: "TransponderDelay",
            size: 2,
        })
        .unwrap();
    assert_eq!(partials.rows(), &[vec![1.0, 2.0]]);
}

#[test]
fn bias_partials() {
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log));
    simulate(&mut relay).unwrap();

    let strand = ErrorModel::builder()
        .measurement_type(MeasurementType::SnDopplerRtn)
        .participants(vec!["GS".to_string(), "TDRS8".to_string()])
        .build();
    let other_strand = ErrorModel::builder()
        .measurement_type(MeasurementType::SnDopplerRtn)
        .participants(vec!["GS".to_string(), "TDRS9".to_string()])
        .build();
    let other_type = ErrorModel::builder()
        .measurement_type(MeasurementType::BrtsDoppler)
        .participants(vec!["GS".to_string(), "TDRS8".to_string()])
        .build();

    for (error_model, expected) in [(&strand, 1.0), (&other_strand, 0.0), (&other_type, 0.0)] {
        let partials = relay
            .calculate_measurement_derivatives(&SolveFor::Bias(error_model))
            .unwrap();
        assert_eq!(partials.rows(), &[vec![expected]]);
    }

    // Bias partials never query the paths
    assert!(!log.entries().iter().any(|entry| entry.contains("derivatives")));
}

#[test]
fn frequency_partials() {
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log)).with_mixer_gain(2.0);
    simulate(&mut relay).unwrap();

    let oscillator = Oscillator::new("TDRS8 oscillator", 2000.0, FrequencyBand::S)
        .with_coefficients(vec![2000.0, 1e-6, 1e-9], vec![1.0, 1e-3, 1e-6])
        .with_initial_epoch(epoch() - 10.seconds());

    // The fixed pilot does not depend on the effective frequency
    let range_rate = -(7000.0 - 6999.0) / SPEED_OF_LIGHT_KM_S;

    let drift = relay
        .calculate_measurement_derivatives(&SolveFor::FrequencyDrift(&oscillator))
        .unwrap();
    let expected = 2.0 * oscillator.frequency_drift_derivative(epoch()).unwrap() * range_rate;
    assert_abs_diff_eq!(drift.rows()[0][0], expected, epsilon = 1e-12);

    let coefficients = relay
        .calculate_measurement_derivatives(&SolveFor::FrequencyPolynomialCoefficients(
            &oscillator,
        ))
        .unwrap();
    assert_eq!(coefficients.rows()[0].len(), 3);
    assert_abs_diff_eq!(coefficients.rows()[0][0], 2.0 * 1e6 * range_rate, epsilon = 1e-9);
    assert_abs_diff_eq!(
        coefficients.rows()[0][1],
        2.0 * 10.0 * 1e6 * range_rate,
        epsilon = 1e-9
    );
}

#[test]
fn derivative_size_mismatch() {
    let log = CallLog::default();
    let [esc, egs, ssc, sgs] = scenario_paths(&log);
    let mut relay = relay_adapter([
        esc,
        egs,
        ssc,
        sgs.with_partials(vec![vec![0.0; 3], vec![0.0; 3]]),
    ]);
    simulate(&mut relay).unwrap();
    let err = relay
        .calculate_measurement_derivatives(&SolveFor::Position("LEO"))
        .unwrap_err();
    assert!(matches!(err, ODError::DerivativeSize { .. }));
    assert!(format!("{err}").contains("Start-GroundStation"), "{err}");

    let [esc, egs, ssc, sgs] = scenario_paths(&log);
    let mut relay = relay_adapter([
        esc,
        egs.with_partials(vec![vec![0.0; 6]]),
        ssc,
        sgs,
    ]);
    simulate(&mut relay).unwrap();
    let err = relay
        .calculate_measurement_derivatives(&SolveFor::Velocity("LEO"))
        .unwrap_err();
    assert!(format!("{err}").contains("End-GroundStation"), "{err}");
}

#[test]
fn derivatives_before_measurement() {
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log));
    let err = relay
        .calculate_measurement_derivatives(&SolveFor::Position("LEO"))
        .unwrap_err();
    assert_eq!(
        err,
        ODError::MeasurementNotSet {
            adapter: "TDRS8 return".to_string()
        }
    );
    assert!(format!("{err}").contains("before the measurement was set"));
}

#[test]
fn ephemeris_gap() {
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log));
    relay.set_ephemeris(Arc::new(
        LinearEphemeris::new().with_coverage(epoch() + 1.days(), epoch() + 2.days()),
    ));

    let context = simulate(&mut relay).unwrap();
    assert!(!context.sample.is_feasible);
    assert_eq!(context.sample.unfeasible_reason.code(), "EGAP");
    assert!(context.sample.value.is_empty());
    assert!(context.combination.is_none());
    assert!(!log.entries().iter().any(|entry| entry.contains("measure")));

    assert!(matches!(
        relay.calculate_measurement_derivatives(&SolveFor::Position("LEO")),
        Err(ODError::DerivativesUnavailable { .. })
    ));
    // Bias partials keep a single row of the right width
    let strand = ErrorModel::from_type(MeasurementType::SnDopplerRtn);
    assert_eq!(
        relay
            .calculate_measurement_derivatives(&SolveFor::Bias(&strand))
            .unwrap()
            .rows(),
        &[vec![0.0]]
    );
    let passes = ErrorModel::builder()
        .measurement_type(MeasurementType::SnDopplerRtn)
        .pass_biases(vec![0.1, 0.2])
        .pass_start_epochs(vec![epoch() - 1.hours(), epoch() + 1.hours()])
        .solve_fors(vec![BiasSolveFor::PassBiases])
        .build();
    assert_eq!(
        relay
            .calculate_measurement_derivatives(&SolveFor::PassBiases(&passes))
            .unwrap()
            .rows(),
        &[vec![1.0, 0.0]]
    );
}

#[test]
fn failed_call_clears_the_last_measurement() {
    let log = CallLog::default();
    let mut relay = RelayDopplerAdapter::new(
        "TDRS5 return",
        MeasurementType::SnDopplerRtn,
        vec!["GS".to_string(), "TDRS5".to_string(), "LEO".to_string()],
        "TDRS5",
        scripted_paths(scenario_paths(&log)),
    )
    .with_service_access(vec![ServiceAccess::MA]);
    relay.set_ephemeris(coverage());
    relay.initialize().unwrap();

    let context = simulate(&mut relay).unwrap();
    assert_eq!(context.combination.unwrap().pilot_frequency_mhz, -2279.0);
    relay
        .calculate_measurement_derivatives(&SolveFor::Position("LEO"))
        .unwrap();

    // The paths are evaluated before the pilot lookup rejects the data flag
    let mut fields = relay_fields(1.seconds(), ServiceAccess::MA);
    fields.data_flag = 2;
    let obs = Observation::new(
        epoch() + 1.minutes(),
        MeasurementType::SnDopplerRtn,
        relay.participants().to_vec(),
        vec![0.0],
    )
    .with_relay(fields);
    assert!(matches!(
        relay.calculate_measurement_with_context(false, Some(&obs), None, false, None),
        Err(ODError::InvalidDataFlag { data_flag: 2, .. })
    ));

    assert!(relay.measurement().is_none());
    assert_eq!(
        relay
            .calculate_measurement_derivatives(&SolveFor::Position("LEO"))
            .unwrap_err(),
        ODError::MeasurementNotSet {
            adapter: "TDRS5 return".to_string()
        }
    );
}

#[test]
fn configuration_errors() {
    let log = CallLog::default();

    let mut relay = relay_adapter(scenario_paths(&log));
    relay.set_service_access(Vec::new());
    assert!(matches!(
        simulate(&mut relay),
        Err(ODError::NoServiceAccess { .. })
    ));

    let mut relay = relay_adapter(scenario_paths(&log));
    let obs = Observation::new(epoch(), MeasurementType::SnDopplerRtn, Vec::new(), vec![0.0]);
    assert!(matches!(
        relay.calculate_measurement(false, Some(&obs), None, false, None),
        Err(ODError::MissingObservationField { .. })
    ));
    let obs = obs.with_relay(relay_fields(Duration::ZERO, ServiceAccess::SA1));
    assert!(matches!(
        relay.calculate_measurement(false, Some(&obs), None, false, None),
        Err(ODError::InvalidCountInterval { .. })
    ));

    let [_, egs, ssc, sgs] = scenario_paths(&log);
    let mut relay = relay_adapter([ScriptedAdapter::new("ESC", 7000.0), egs, ssc, sgs]);
    assert!(matches!(
        simulate(&mut relay),
        Err(ODError::MissingFrequencyModel { .. })
    ));

    let [_, egs, ssc, sgs] = scenario_paths(&log);
    let mut relay = relay_adapter([
        ScriptedAdapter::new("ESC", 7000.0).with_frequency(2000.0, FrequencyBand::Unspecified),
        egs,
        ssc,
        sgs,
    ]);
    assert!(matches!(
        simulate(&mut relay),
        Err(ODError::UnsupportedBand { .. })
    ));

    let [_, egs, ssc, sgs] = scenario_paths(&log);
    let mut relay = relay_adapter([
        ScriptedAdapter::new("ESC", 7000.0).with_frequency(-1.0, FrequencyBand::S),
        egs,
        ssc,
        sgs,
    ]);
    assert!(matches!(
        simulate(&mut relay),
        Err(ODError::InvalidNodeFrequency { .. })
    ));
}

#[test]
fn signal_path_mismatch() {
    let log = CallLog::default();
    let [esc, egs, ssc, sgs] = scenario_paths(&log);
    let mut relay = relay_adapter([esc.with_values(vec![7000.0, 7001.0]), egs, ssc, sgs]);
    assert!(matches!(
        simulate(&mut relay),
        Err(ODError::SignalPathMismatch {
            path: "End-GroundStation",
            expected: 2,
            found: 1,
            ..
        })
    ));
}

#[test]
fn uninitialized_and_child_failures() {
    let log = CallLog::default();
    let mut relay = RelayDopplerAdapter::new(
        "TDRS8 return",
        MeasurementType::SnDopplerRtn,
        vec!["GS".to_string(), "TDRS8".to_string(), "LEO".to_string()],
        "TDRS8",
        scripted_paths(scenario_paths(&log)),
    );
    relay.set_ephemeris(coverage());
    assert!(matches!(
        simulate(&mut relay),
        Err(ODError::NotInitialized { .. })
    ));

    relay.initialize().unwrap();
    // The time tag participant is forwarded to every path
    assert_eq!(
        log.entries()
            .iter()
            .filter(|entry| entry.ends_with("participant 2"))
            .count(),
        4
    );

    let [esc, egs, ssc, _] = scenario_paths(&log);
    let mut relay = RelayDopplerAdapter::new(
        "TDRS8 return",
        MeasurementType::SnDopplerRtn,
        vec!["GS".to_string(), "TDRS8".to_string(), "LEO".to_string()],
        "TDRS8",
        RelayPaths::new(
            esc.boxed(),
            egs.boxed(),
            ssc.boxed(),
            Box::new(GeometricRangeAdapter::new("SGS", vec!["GS".to_string()])),
        ),
    );
    let err = relay.initialize().unwrap_err();
    assert!(matches!(err, ODError::ChildInitialization { .. }));
    assert!(format!("{err}").contains("Start-GroundStation"), "{err}");
}

#[test]
fn turnaround_ratio() {
    let log = CallLog::default();
    let relay = relay_adapter(scenario_paths(&log));
    assert_eq!(relay.turnaround_ratio().unwrap(), 240.0 / 221.0);

    let relay = relay.with_frequency_parameters(FrequencyParameters {
        band: FrequencyBand::K,
        ..Default::default()
    });
    assert!(matches!(
        relay.turnaround_ratio(),
        Err(ODError::UnsupportedBand { .. })
    ));
}

#[test]
fn deep_clone() {
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log));
    let mut copy: Box<dyn TrackingAdapter> = relay.clone_box();
    copy.add_noise(true);
    copy.set_simulation_epoch(epoch());
    copy.calculate_measurement(false, None, None, true, None)
        .unwrap();

    assert!(!relay.settings().add_noise);
    assert!(relay.measurement().is_none());
    let sample = simulate(&mut relay).unwrap().sample;
    assert_eq!(Some(&sample), copy.measurement());
}

#[test]
fn random_service_access() {
    let log = CallLog::default();
    let mut relay = relay_adapter(scenario_paths(&log));
    let candidates = vec![ServiceAccess::SA1, ServiceAccess::SA2, ServiceAccess::MA];
    relay.set_service_access(candidates.clone());
    relay.set_simulation_epoch(epoch());

    let draw = |relay: &mut RelayDopplerAdapter, seed: u64| {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        (0..20)
            .map(|_| {
                relay
                    .calculate_measurement_with_context(false, None, None, true, Some(&mut rng))
                    .unwrap()
                    .combination
                    .unwrap()
                    .service
                    .service()
                    .unwrap()
            })
            .collect::<Vec<ServiceAccess>>()
    };

    let first = draw(&mut relay, 42);
    assert_eq!(first, draw(&mut relay, 42));
    assert!(first.iter().all(|service| candidates.contains(service)));
    assert!(first.iter().any(|service| *service != first[0]));

    // Without a generator, the first candidate is used
    let context = simulate(&mut relay).unwrap();
    assert_eq!(context.sample.relay.unwrap().service_access, ServiceAccess::SA1);
}

/// End to end: the relay Doppler over geometric paths, checked against finite differences.
#[test]
fn geometric_paths_finite_differences() {
    let _ = pretty_env_logger::try_init();
    let count_interval = 10.seconds();

    let ephemeris = |leo_delta: Option<(usize, f64)>| {
        let mut ephem = LinearEphemeris::new()
            .with_object(
                "GS",
                epoch(),
                Vector6::new(6378.5, 0.0, 0.0, 0.0, 0.465, 0.0),
            )
            .with_object(
                "TDRS8",
                epoch(),
                Vector6::new(42164.0, 100.0, 0.0, 0.0, 3.0746, 0.0),
            )
            .with_object(
                "LEO",
                epoch(),
                Vector6::new(7000.0, 1500.0, 300.0, -1.2, 7.3, 0.5),
            );
        if let Some((index, delta)) = leo_delta {
            ephem.perturb("LEO", index, delta);
        }
        Arc::new(ephem) as Arc<dyn EphemerisProvider>
    };

    let relay_over = |ephem: Arc<dyn EphemerisProvider>| {
        let path = |name: &str, from: &str, to: &str| {
            GeometricRangeAdapter::new(name, vec![from.to_string(), to.to_string()])
        };
        let paths = RelayPaths::new(
            Box::new(
                path("ESC", "TDRS8", "LEO")
                    .with_transmitter(Oscillator::new("TDRS8 osc", 2000.0, FrequencyBand::S)),
            ),
            Box::new(path("EGS", "GS", "TDRS8")),
            Box::new(path("SSC", "TDRS8", "LEO")),
            Box::new(path("SGS", "GS", "TDRS8")),
        );
        let mut relay = RelayDopplerAdapter::new(
            "TDRS8 return",
            MeasurementType::SnDopplerRtn,
            vec!["GS".to_string(), "TDRS8".to_string(), "LEO".to_string()],
            "TDRS8",
            paths,
        )
        .with_service_access(vec![ServiceAccess::SA1]);
        relay.set_count_interval(count_interval);
        relay.set_ephemeris(ephem);
        relay.initialize().unwrap();
        relay
    };

    let mut relay = relay_over(ephemeris(None));
    let context = simulate(&mut relay).unwrap();
    assert!(context.sample.is_feasible, "{}", context.sample);
    let combination = context.combination.unwrap();
    // SA1 S-band pilot from the effective frequency
    assert_eq!(combination.pilot_frequency_mhz, 13677.5 - 2000.0);
    assert_eq!(combination.pilot_derivative, -1.0);

    let partials = relay
        .calculate_measurement_derivatives(&SolveFor::CartesianX("LEO"))
        .unwrap();
    assert_eq!(partials.rows()[0].len(), 6);

    for (index, step) in [(0, 1e-2), (1, 1e-2), (2, 1e-2), (3, 1e-3), (4, 1e-3), (5, 1e-3)] {
        let plus = simulate(&mut relay_over(ephemeris(Some((index, step)))))
            .unwrap()
            .sample
            .value[0];
        let minus = simulate(&mut relay_over(ephemeris(Some((index, -step)))))
            .unwrap()
            .sample
            .value[0];
        let finite_difference = (plus - minus) / (2.0 * step);
        let partial = partials.rows()[0][index];
        assert!(
            (finite_difference - partial).abs() < 1e-4 * partial.abs().max(1.0),
            "component {index}: {finite_difference} != {partial}"
        );
    }
}

#[test]
fn brts_shares_the_combination() {
    let log = CallLog::default();
    let mut brts = RelayDopplerAdapter::new(
        "BRTS TDRS8",
        MeasurementType::BrtsDoppler,
        vec!["GS".to_string(), "TDRS8".to_string(), "BRTS".to_string()],
        "TDRS8",
        scripted_paths(scenario_paths(&log)),
    )
    .with_service_access(vec![ServiceAccess::SA1])
    .with_pilots(Arc::new(FixedPilot(1000.0)));
    brts.set_ephemeris(coverage());
    brts.initialize().unwrap();
    assert_eq!(brts.error_model().measurement_type, MeasurementType::BrtsDoppler);

    brts.set_simulation_epoch(epoch());
    let sample = brts
        .calculate_measurement(false, None, None, true, None)
        .unwrap();
    assert_eq!(sample.measurement_type, MeasurementType::BrtsDoppler);
    assert_abs_diff_eq!(sample.value[0], scenario_value(), epsilon = 1e-6);
}
