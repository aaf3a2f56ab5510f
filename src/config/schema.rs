//! Configuration value parsing helpers

use std::time::Duration;

/// Parse a duration string like "90s", "2m", "1m30s"
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let mut total_seconds: u64 = 0;
    let mut current_num = String::new();

    for c in s.trim().chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
        } else {
            let num: u64 = current_num
                .parse()
                .map_err(|_| format!("Invalid number in duration: {}", s))?;
            current_num.clear();

            let unit: u64 = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                _ => return Err(format!("Unknown duration unit: {}", c)),
            };
            total_seconds = num
                .checked_mul(unit)
                .and_then(|secs| total_seconds.checked_add(secs))
                .ok_or_else(|| format!("Duration too large: {}", s))?;
        }
    }

    // A bare number means seconds.
    if !current_num.is_empty() {
        let num = current_num
            .parse::<u64>()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;
        total_seconds = total_seconds
            .checked_add(num)
            .ok_or_else(|| format!("Duration too large: {}", s))?;
    }

    if total_seconds == 0 {
        return Err(format!("Invalid duration: {}", s));
    }

    Ok(Duration::from_secs(total_seconds))
}

/// Serde adapter for optional duration strings.
pub mod optional_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&format!("{}s", d.as_secs())),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| super::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
