use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// `IMF-fixdate` from RFC 7231 §7.1.1.1, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
const RFC_7231: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// A server-assigned upload location and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub key: String,
    pub location: String,
    #[serde(with = "rfc7231_serde")]
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Returns `true` once `now` has reached `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Formats a timestamp as an RFC 7231 `IMF-fixdate`.
pub fn format_rfc7231(at: DateTime<Utc>) -> String {
    at.format(RFC_7231).to_string()
}

/// Parses an RFC 7231 `IMF-fixdate`.
pub fn parse_rfc7231(s: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(s, RFC_7231)
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::Timestamp(format!("{s}: {e}")))
}

mod rfc7231_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        super::format_rfc7231(*at).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_rfc7231(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_imf_fixdate() {
        let at = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(format_rfc7231(at), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn parses_imf_fixdate() {
        let at = parse_rfc7231("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap());
    }

    #[test]
    fn rejects_other_formats() {
        assert!(parse_rfc7231("1994-11-06T08:49:37Z").is_err());
    }

    #[test]
    fn record_json_shape() {
        let record = SessionRecord {
            key: "abc123".into(),
            location: "/files/abc123".into(),
            expires_at: Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["key"], "abc123");
        assert_eq!(json["location"], "/files/abc123");
        assert_eq!(json["expires_at"], "Sat, 17 Oct 2026 12:00:00 GMT");

        let parsed: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let expires_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let record = SessionRecord {
            key: "k".into(),
            location: "/files/k".into(),
            expires_at,
        };
        assert!(!record.is_expired(expires_at - chrono::TimeDelta::seconds(1)));
        assert!(record.is_expired(expires_at));
    }
}
