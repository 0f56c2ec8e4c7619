use emg_types::{FilterSettings, FilterSettingsUpdate};
use pipeline::{Channel, FilterPipeline, FilterSettingsController, FILTER_ORDER, SAMPLE_RATE_HZ};
use proptest::prelude::*;

/// Peak output amplitude of a sinusoid once transients have died out.
fn steady_amplitude(pipeline: &mut FilterPipeline, freq_hz: f64, amplitude: f64) -> f64 {
    let warm_up = (SAMPLE_RATE_HZ as usize) * 2;
    let measure = SAMPLE_RATE_HZ as usize;
    let mut peak: f64 = 0.0;

    for n in 0..warm_up + measure {
        let t = n as f64 / SAMPLE_RATE_HZ;
        let x = amplitude * (2.0 * std::f64::consts::PI * freq_hz * t).sin();
        let y = pipeline.process_sample(Channel::One, x);
        if n >= warm_up {
            peak = peak.max(y.abs());
        }
    }
    peak
}

#[test]
fn notch_attenuates_powerline_by_at_least_20db() {
    let settings = FilterSettings::default();
    let hum = steady_amplitude(&mut FilterPipeline::new(settings).unwrap(), 60.0, 200.0);
    let muscle = steady_amplitude(&mut FilterPipeline::new(settings).unwrap(), 40.0, 200.0);

    let attenuation_db = 20.0 * (muscle / hum).log10();
    assert!(attenuation_db >= 20.0, "only {attenuation_db:.1} dB");
}

#[test]
fn without_notch_powerline_passes() {
    let settings = FilterSettings {
        notch_enabled: false,
        ..FilterSettings::default()
    };
    let hum = steady_amplitude(&mut FilterPipeline::new(settings).unwrap(), 60.0, 200.0);
    assert!(hum > 150.0, "60 Hz amplitude {hum}");
}

#[test]
fn constant_unit_input_starts_settled() {
    let mut pipeline = FilterPipeline::new(FilterSettings::default()).unwrap();
    for _ in 0..20 {
        let (a, b) = pipeline.process_frame(1.0, 1.0);
        assert!(a.abs() < 1e-6 && b.abs() < 1e-6, "transient: {a}, {b}");
    }
}

#[test]
fn reconfiguration_discards_previous_history() {
    let mut controller = FilterSettingsController::new(FilterSettings::default()).unwrap();
    for n in 0..500 {
        let x = 800.0 * (n as f64 * 0.11).sin() + 300.0;
        controller.pipeline_mut().process_frame(x, -x);
    }

    let update = FilterSettingsUpdate {
        low_pass_cutoff: Some(250.0),
        high_pass_cutoff: Some(30.0),
        notch_enabled: Some(false),
    };
    let applied = controller.apply(&update).unwrap();
    let mut fresh = FilterPipeline::new(applied).unwrap();

    for channel in Channel::ALL {
        let state = controller.pipeline().channel_state(channel);
        assert_eq!(state.low_pass.len(), FILTER_ORDER);
        assert_eq!(state.high_pass.len(), FILTER_ORDER);
    }

    let reconfigured = controller.pipeline_mut().process_frame(42.0, -7.0);
    let expected = fresh.process_frame(42.0, -7.0);
    assert_eq!(reconfigured, expected);
}

#[test]
fn lowpass_above_nyquist_is_usable() {
    let mut controller = FilterSettingsController::new(FilterSettings::default()).unwrap();
    let applied = controller
        .apply(&FilterSettingsUpdate {
            low_pass_cutoff: Some(2000.0),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(applied.low_pass_cutoff, 2000.0);

    let (a, b) = controller.pipeline_mut().process_frame(10.0, 20.0);
    assert!(a.is_finite() && b.is_finite());
}

proptest! {
    #[test]
    fn zero_input_decays_to_zero(history in prop::collection::vec(-5000.0f64..5000.0, 1..400)) {
        let mut pipeline = FilterPipeline::new(FilterSettings::default()).unwrap();
        for x in &history {
            pipeline.process_frame(*x, -*x);
        }

        let mut last = (f64::MAX, f64::MAX);
        for _ in 0..10_000 {
            last = pipeline.process_frame(0.0, 0.0);
        }
        prop_assert!(last.0.abs() < 1e-6, "channel one settled at {}", last.0);
        prop_assert!(last.1.abs() < 1e-6, "channel two settled at {}", last.1);
    }
}
