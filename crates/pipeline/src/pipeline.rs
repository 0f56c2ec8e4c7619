//! Two-channel conditioning chain: powerline notch, then low-pass, then high-pass.

use emg_types::FilterSettings;

use crate::design::{design_band_cascade, design_notch, FilterCoefficients};
use crate::error::FilterResult;
use crate::iir::IirFilter;

/// Sample rate of the wearable's ADC stream.
pub const SAMPLE_RATE_HZ: f64 = 1650.0;
/// Order of each Butterworth section.
pub const FILTER_ORDER: usize = 4;
/// Powerline frequency removed by the notch stage.
pub const NOTCH_FREQ_HZ: f64 = 60.0;
pub const NOTCH_Q: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    One,
    Two,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::One, Channel::Two];

    fn index(self) -> usize {
        match self {
            Channel::One => 0,
            Channel::Two => 1,
        }
    }
}

/// Coefficient sets derived from one `FilterSettings` value.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCoefficients {
    pub notch: FilterCoefficients,
    pub low_pass: FilterCoefficients,
    pub high_pass: FilterCoefficients,
}

impl StageCoefficients {
    pub fn design(settings: &FilterSettings) -> FilterResult<Self> {
        let notch = design_notch(NOTCH_FREQ_HZ, SAMPLE_RATE_HZ, NOTCH_Q)?;
        let (low_pass, high_pass) = design_band_cascade(
            settings.low_pass_cutoff,
            settings.high_pass_cutoff,
            SAMPLE_RATE_HZ,
            FILTER_ORDER,
        )?;
        Ok(Self {
            notch,
            low_pass,
            high_pass,
        })
    }
}

/// Read-only view of one channel's delay lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState<'a> {
    pub notch: &'a [f64],
    pub low_pass: &'a [f64],
    pub high_pass: &'a [f64],
}

#[derive(Debug, Clone)]
struct ChannelChain {
    notch: IirFilter,
    low_pass: IirFilter,
    high_pass: IirFilter,
}

impl ChannelChain {
    fn new(coeffs: &StageCoefficients) -> Self {
        Self {
            notch: IirFilter::new(coeffs.notch.clone()),
            low_pass: IirFilter::new(coeffs.low_pass.clone()),
            high_pass: IirFilter::new(coeffs.high_pass.clone()),
        }
    }

    fn run(&mut self, x: f64, notch_enabled: bool) -> f64 {
        let y = if notch_enabled { self.notch.run(x) } else { x };
        let y = self.low_pass.run(y);
        self.high_pass.run(y)
    }
}

/// Per-sample conditioning for both EMG channels.
///
/// Redesign and processing both take `&mut self`, so a reinitialization can
/// never interleave with a sample half-way through the cascade.
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    settings: FilterSettings,
    coefficients: StageCoefficients,
    chains: [ChannelChain; 2],
}

impl FilterPipeline {
    pub fn new(settings: FilterSettings) -> FilterResult<Self> {
        let coefficients = StageCoefficients::design(&settings)?;
        let chains = [
            ChannelChain::new(&coefficients),
            ChannelChain::new(&coefficients),
        ];
        Ok(Self {
            settings,
            coefficients,
            chains,
        })
    }

    /// Redesigns every stage and resets both channels to the unit-input steady
    /// state. On a design error the current configuration stays untouched.
    pub fn initialize(&mut self, settings: FilterSettings) -> FilterResult<()> {
        let coefficients = StageCoefficients::design(&settings)?;
        self.chains = [
            ChannelChain::new(&coefficients),
            ChannelChain::new(&coefficients),
        ];
        self.coefficients = coefficients;
        self.settings = settings;
        Ok(())
    }

    pub fn process_sample(&mut self, channel: Channel, raw: f64) -> f64 {
        let notch_enabled = self.settings.notch_enabled;
        self.chains[channel.index()].run(raw, notch_enabled)
    }

    /// Conditions one `(ch1, ch2)` frame.
    pub fn process_frame(&mut self, ch1: f64, ch2: f64) -> (f64, f64) {
        (
            self.process_sample(Channel::One, ch1),
            self.process_sample(Channel::Two, ch2),
        )
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn coefficients(&self) -> &StageCoefficients {
        &self.coefficients
    }

    pub fn channel_state(&self, channel: Channel) -> ChannelState<'_> {
        let chain = &self.chains[channel.index()];
        ChannelState {
            notch: chain.notch.state(),
            low_pass: chain.low_pass.state(),
            high_pass: chain.high_pass.state(),
        }
    }
}
