//! Parsing of human-readable schedule times
//!
//! `quill-queue reschedule` accepts relative durations ("30m", "2h"),
//! natural language ("tomorrow", "next monday 10am"), and randomized
//! windows ("random:10m-20m") for organic-looking posting times.

use crate::error::{QuillcastError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

const MIN_RANDOM_SECONDS: i64 = 30;
const MAX_RANDOM_SECONDS: i64 = 30 * 24 * 3600; // 30 days

/// Parse a schedule string into a DateTime
///
/// # Errors
///
/// Returns an error if the time format is invalid or cannot be parsed.
pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>> {
    if input.is_empty() {
        return Err(QuillcastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Some(range) = input.strip_prefix("random:") {
        return parse_random_schedule(range);
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok(Utc::now() + duration);
    }

    if let Ok(dt) = parse_natural_language(input) {
        return Ok(dt);
    }

    Err(QuillcastError::InvalidInput(format!(
        "Could not parse schedule string: {}",
        input
    )))
}

fn parse_duration(input: &str) -> Result<Duration> {
    if let Ok(std_duration) = humantime::parse_duration(input) {
        let seconds = std_duration.as_secs() as i64;
        return Duration::try_seconds(seconds)
            .ok_or_else(|| QuillcastError::InvalidInput("Duration out of range".to_string()));
    }

    Err(QuillcastError::InvalidInput(format!(
        "Could not parse duration: {}",
        input
    )))
}

fn parse_natural_language(input: &str) -> Result<DateTime<Utc>> {
    chrono_english::parse_date_string(input, Utc::now(), chrono_english::Dialect::Us)
        .map_err(|e| QuillcastError::InvalidInput(format!("Could not parse time: {}", e)))
}

/// Parse "MIN-MAX" and pick a uniformly random offset from now.
fn parse_random_schedule(range: &str) -> Result<DateTime<Utc>> {
    let parts: Vec<&str> = range.split('-').collect();
    if parts.len() != 2 {
        return Err(QuillcastError::InvalidInput(
            "Random format must be MIN-MAX".to_string(),
        ));
    }

    let min = parse_duration(parts[0])?;
    let max = parse_duration(parts[1])?;
    validate_random_range(min, max)?;

    let random_secs = rand::thread_rng().gen_range(min.num_seconds()..=max.num_seconds());
    let offset = Duration::try_seconds(random_secs).unwrap_or(min);

    Ok(Utc::now() + offset)
}

fn validate_random_range(min: Duration, max: Duration) -> Result<()> {
    let min_secs = min.num_seconds();
    let max_secs = max.num_seconds();

    if min_secs < MIN_RANDOM_SECONDS {
        return Err(QuillcastError::InvalidInput(format!(
            "Minimum random interval must be at least {} seconds",
            MIN_RANDOM_SECONDS
        )));
    }

    if max_secs > MAX_RANDOM_SECONDS {
        return Err(QuillcastError::InvalidInput(format!(
            "Maximum random interval must be less than {} days",
            MAX_RANDOM_SECONDS / (24 * 3600)
        )));
    }

    if min_secs >= max_secs {
        return Err(QuillcastError::InvalidInput(
            "Minimum must be less than maximum".to_string(),
        ));
    }

    Ok(())
}
