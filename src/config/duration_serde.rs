//! Durations in configuration files: `"30s"`, `"5m"`, or a bare number of seconds.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};
use std::time::Duration;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration<E: de::Error>(self) -> Result<Duration, E> {
        match self {
            Self::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            Self::Text(value) => humantime::parse_duration(&value)
                .map_err(|e| E::custom(format!("Invalid duration '{value}': {e}"))),
        }
    }
}

pub mod duration {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        RawDuration::deserialize(deserializer)?.into_duration()
    }
}

pub mod option_duration {
    use super::*;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<RawDuration>::deserialize(deserializer)?
            .map(RawDuration::into_duration)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Deserialize)]
    struct Timeouts {
        #[serde(with = "super::duration")]
        open: Duration,
        #[serde(default, with = "super::option_duration")]
        ttl: Option<Duration>,
    }

    #[test]
    fn test_accepts_text_and_seconds() {
        let parsed: Timeouts = toml::from_str("open = \"1m 30s\"\nttl = 600").unwrap();
        assert_eq!(parsed.open, Duration::from_secs(90));
        assert_eq!(parsed.ttl, Some(Duration::from_secs(600)));

        let parsed: Timeouts = toml::from_str("open = 5").unwrap();
        assert_eq!(parsed.open, Duration::from_secs(5));
        assert_eq!(parsed.ttl, None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(toml::from_str::<Timeouts>("open = \"soon\"").is_err());
        assert!(toml::from_str::<Timeouts>("open = -3").is_err());
    }
}
