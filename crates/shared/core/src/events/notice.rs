use serde::{Deserialize, Serialize};

use crate::values::{Timestamp, wire_time};

/// Severity of a system notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Operator-facing notice broadcast by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemNotice {
    #[serde(rename = "type")]
    pub level: NoticeLevel,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, with = "wire_time::option")]
    pub timestamp: Option<Timestamp>,
    /// Free-form payload attached by the server
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_notice() {
        let json = r#"{"type":"WARNING","title":"Maintenance","message":"Restart at 02:00",
            "timestamp":"2024-05-01T10:15:30","data":{"window":30}}"#;
        let notice: SystemNotice = serde_json::from_str(json).unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.timestamp.is_some());
        assert_eq!(notice.data.unwrap()["window"], 30);
    }
}
