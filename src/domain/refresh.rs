// Refresh interval parsing for `<number><unit>` and `<number>+<unit>` strings
use serde::Serialize;
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshInterval {
    /// None means the search does not refresh
    pub seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RefreshInterval {
    pub fn duration(&self) -> Option<Duration> {
        self.seconds.map(Duration::from_secs)
    }

    fn none_with_warning(warning: String) -> Self {
        tracing::warn!("{}", warning);
        Self {
            seconds: None,
            warning: Some(warning),
        }
    }
}

fn unit_seconds(unit: &str) -> Option<u64> {
    match unit {
        // A bare number counts seconds
        "" | "s" => Some(1),
        "m" => Some(60),
        "h" => Some(3_600),
        "d" => Some(SECONDS_PER_DAY),
        "w" => Some(7 * SECONDS_PER_DAY),
        "mon" => Some(30 * SECONDS_PER_DAY),
        _ => None,
    }
}

/// Parse a refresh string such as `5m`, `5+m` or `1mon` into an interval.
/// Never fails: malformed input yields no interval plus a warning.
pub fn parse_refresh_interval(raw: &str) -> RefreshInterval {
    let trimmed = raw.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, rest) = trimmed.split_at(digits_end);

    if number.is_empty() {
        return RefreshInterval::none_with_warning(format!(
            "refresh '{}' does not start with a number; refresh disabled",
            raw
        ));
    }

    let unit = rest.strip_prefix('+').unwrap_or(rest).trim();
    let Some(multiplier) = unit_seconds(unit) else {
        return RefreshInterval::none_with_warning(format!(
            "refresh '{}' uses unknown unit '{}'; refresh disabled",
            raw, unit
        ));
    };

    let seconds = number
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier));
    match seconds {
        Some(0) => RefreshInterval {
            seconds: None,
            warning: None,
        },
        Some(seconds) => RefreshInterval {
            seconds: Some(seconds),
            warning: None,
        },
        None => RefreshInterval::none_with_warning(format!(
            "refresh '{}' is out of range; refresh disabled",
            raw
        )),
    }
}
