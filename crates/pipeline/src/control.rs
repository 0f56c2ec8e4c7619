//! Live reconfiguration of the filter pipeline.

use emg_types::{FilterSettings, FilterSettingsUpdate};
use tracing::{info, warn};

use crate::error::FilterResult;
use crate::pipeline::FilterPipeline;

/// Owns the pipeline together with its live settings and applies partial
/// updates coming from observers.
#[derive(Debug)]
pub struct FilterSettingsController {
    pipeline: FilterPipeline,
}

impl FilterSettingsController {
    pub fn new(settings: FilterSettings) -> FilterResult<Self> {
        let pipeline = FilterPipeline::new(settings)?;
        info!("{}", describe(&settings));
        Ok(Self { pipeline })
    }

    /// Merges `update` into the live settings, then redesigns and resets the
    /// pipeline. Returns the settings now in effect.
    pub fn apply(&mut self, update: &FilterSettingsUpdate) -> FilterResult<FilterSettings> {
        let next = self.pipeline.settings().merged(update);
        if let Err(e) = self.pipeline.initialize(next) {
            warn!(
                "Rejected filter settings {:?}: {}. Keeping {}",
                next,
                e,
                describe(self.pipeline.settings())
            );
            return Err(e);
        }

        info!("Filters updated: {}", describe(&next));
        Ok(next)
    }

    pub fn settings(&self) -> &FilterSettings {
        self.pipeline.settings()
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut FilterPipeline {
        &mut self.pipeline
    }
}

fn describe(settings: &FilterSettings) -> String {
    format!(
        "LP={}Hz, HP={}Hz, Notch={}",
        settings.low_pass_cutoff,
        settings.high_pass_cutoff,
        if settings.notch_enabled {
            "enabled"
        } else {
            "disabled"
        }
    )
}
