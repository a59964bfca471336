//! Serde adapter for human-readable durations such as `"10s"` or `"1m 30s"`.

use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => humantime::parse_duration(text.trim())
            .map_err(|err| de::Error::custom(format!("invalid duration '{text}': {err}"))),
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(with = "super")]
        interval: Duration,
    }

    #[test]
    fn parses_humantime_and_bare_seconds() {
        let parsed: Wrapper = serde_json::from_str(r#"{"interval":"1m 30s"}"#).unwrap();
        assert_eq!(parsed.interval, Duration::from_secs(90));
        let parsed: Wrapper = serde_json::from_str(r#"{"interval":10}"#).unwrap();
        assert_eq!(parsed.interval, Duration::from_secs(10));
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"interval":"soon"}"#).is_err());
    }
}
