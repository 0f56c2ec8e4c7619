use serde::Deserialize;

use crate::config::FilterSettingsUpdate;

/// Messages an observer may send to the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    FilterSettings(FilterSettingsUpdate),
}

impl ClientMessage {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filter_settings() {
        let msg = ClientMessage::parse(
            r#"{"type":"filter_settings","notch_enabled":false,"low_pass_cutoff":200.0,"high_pass_cutoff":15}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::FilterSettings(FilterSettingsUpdate {
                notch_enabled: Some(false),
                low_pass_cutoff: Some(200.0),
                high_pass_cutoff: Some(15.0),
            })
        );
    }

    #[test]
    fn partial_settings_are_accepted() {
        let msg = ClientMessage::parse(r#"{"type":"filter_settings","notch_enabled":true}"#).unwrap();
        let ClientMessage::FilterSettings(update) = msg;
        assert_eq!(update.notch_enabled, Some(true));
        assert!(update.low_pass_cutoff.is_none());
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(ClientMessage::parse(r#"{"type":"subscribe","topic":"emg"}"#).is_err());
        assert!(ClientMessage::parse(r#"{"notch_enabled":true}"#).is_err());
        assert!(ClientMessage::parse("not json").is_err());
        assert!(ClientMessage::parse(r#"{"type":"filter_settings","low_pass_cutoff":"high"}"#).is_err());
    }
}
