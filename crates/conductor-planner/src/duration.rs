//! Parsing of human and Go-style duration expressions found in plans.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

fn component_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        // Longer unit spellings come first: alternation is leftmost-first.
        Regex::new(
            r"(?i)(\d+(?:\.\d+)?)\s*(days|day|d|hours|hour|hrs|hr|h|minutes|minute|mins|min|ms|m|seconds|second|secs|sec|s)",
        )
        .expect("duration regex is valid")
    })
}

fn unit_seconds(unit: &str) -> f64 {
    match unit.to_ascii_lowercase().as_str() {
        "days" | "day" | "d" => 86_400.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3_600.0,
        "minutes" | "minute" | "mins" | "min" | "m" => 60.0,
        "ms" => 0.001,
        _ => 1.0,
    }
}

fn is_filler(text: &str) -> bool {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .all(|word| word.is_empty() || word.eq_ignore_ascii_case("and"))
}

/// Parse a duration expression such as `"1h30m"`, `"45m"`, `"90s"`,
/// `"2 hours"`, `"1 hour and 15 minutes"`.
///
/// A bare number is read as minutes. Returns `None` for anything else,
/// including expressions with unrecognized words between components.
pub fn parse_duration_expr(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(minutes) = text.parse::<f64>() {
        return minutes_to_duration(minutes);
    }

    let mut total = 0.0_f64;
    let mut cursor = 0;
    let mut matched = false;
    for caps in component_re().captures_iter(text) {
        let (Some(whole), Some(value), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if !is_filler(&text[cursor..whole.start()]) {
            return None;
        }
        let value: f64 = value.as_str().parse().ok()?;
        total += value * unit_seconds(unit.as_str());
        cursor = whole.end();
        matched = true;
    }

    if !matched || !is_filler(&text[cursor..]) {
        return None;
    }
    Duration::try_from_secs_f64(total).ok()
}

/// Convert a (possibly fractional) minute count; negative or non-finite values
/// are rejected.
pub fn minutes_to_duration(minutes: f64) -> Option<Duration> {
    if !minutes.is_finite() || minutes < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(minutes * 60.0).ok()
}
