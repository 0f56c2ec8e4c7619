//! Filter configuration shared by the relay and the filtering pipeline

use serde::{Deserialize, Serialize};

/// Live filter configuration.
///
/// `low_pass_cutoff > high_pass_cutoff` is the intended relationship, but it is
/// not enforced: observers may request any combination the designer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Whether the powerline notch stage runs
    pub notch_enabled: bool,
    /// Low-pass cutoff frequency in Hz
    pub low_pass_cutoff: f64,
    /// High-pass cutoff frequency in Hz
    pub high_pass_cutoff: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            notch_enabled: true,
            low_pass_cutoff: 330.0,
            high_pass_cutoff: 20.0,
        }
    }
}

impl FilterSettings {
    /// Returns a copy with every field present in `update` replaced.
    pub fn merged(&self, update: &FilterSettingsUpdate) -> Self {
        Self {
            notch_enabled: update.notch_enabled.unwrap_or(self.notch_enabled),
            low_pass_cutoff: update.low_pass_cutoff.unwrap_or(self.low_pass_cutoff),
            high_pass_cutoff: update.high_pass_cutoff.unwrap_or(self.high_pass_cutoff),
        }
    }
}

/// A partial settings change; omitted fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSettingsUpdate {
    #[serde(default)]
    pub notch_enabled: Option<bool>,
    #[serde(default)]
    pub low_pass_cutoff: Option<f64>,
    #[serde(default)]
    pub high_pass_cutoff: Option<f64>,
}

impl FilterSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.notch_enabled.is_none()
            && self.low_pass_cutoff.is_none()
            && self.high_pass_cutoff.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_omitted_fields() {
        let current = FilterSettings::default();
        let update = FilterSettingsUpdate {
            low_pass_cutoff: Some(250.0),
            ..Default::default()
        };

        let merged = current.merged(&update);
        assert_eq!(merged.low_pass_cutoff, 250.0);
        assert_eq!(merged.high_pass_cutoff, current.high_pass_cutoff);
        assert_eq!(merged.notch_enabled, current.notch_enabled);
    }

    #[test]
    fn merge_allows_inverted_band() {
        let update = FilterSettingsUpdate {
            notch_enabled: Some(false),
            low_pass_cutoff: Some(10.0),
            high_pass_cutoff: Some(100.0),
        };
        let merged = FilterSettings::default().merged(&update);
        assert!(merged.low_pass_cutoff < merged.high_pass_cutoff);
        assert!(!merged.notch_enabled);
    }

    #[test]
    fn empty_update() {
        assert!(FilterSettingsUpdate::default().is_empty());
        assert!(!FilterSettingsUpdate {
            notch_enabled: Some(true),
            ..Default::default()
        }
        .is_empty());
    }
}
