use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartRequest {
    pub computer_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RestartResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub refresh_interval: u64,
    pub monitoring_interval: u64,
}

/// History returned when the monitor has not recorded anything yet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyHistory {
    pub last_update: String,
    pub event_count: u64,
    pub events: Vec<serde_json::Value>,
}

impl EmptyHistory {
    /// `offset` is resolved once at startup, local offset lookup is unsound
    /// once the runtime threads exist.
    pub fn now(offset: UtcOffset) -> Self {
        let now = OffsetDateTime::now_utc().to_offset(offset);
        Self {
            last_update: now
                .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
                .unwrap_or_default(),
            event_count: 0,
            events: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_uses_given_offset() {
        let offset = UtcOffset::from_hms(5, 30, 0).unwrap();
        let stamp = EmptyHistory::now(offset).last_update;
        let expected = OffsetDateTime::now_utc().to_offset(offset);
        // minute-level check, the two clock reads are microseconds apart
        let prefix = expected
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .unwrap();
        let before = (expected - time::Duration::minutes(1))
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .unwrap();
        assert!(stamp.starts_with(&prefix) || stamp.starts_with(&before), "{stamp} vs {prefix}");
    }

    #[test]
    fn test_empty_history_shape() {
        let json = serde_json::to_value(EmptyHistory::now(UtcOffset::UTC)).unwrap();
        assert_eq!(json["eventCount"], 0);
        assert_eq!(json["events"], serde_json::json!([]));

        let stamp = json["lastUpdate"].as_str().unwrap();
        assert_eq!(stamp.len(), "2026-10-16 08:00:00".len());
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
    }

    #[test]
    fn test_restart_response_omits_absent_fields() {
        let json = serde_json::to_value(RestartResponse {
            success: false,
            message: "Computer name is required".into(),
            output: None,
            error: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "message": "Computer name is required"}));
    }
}
