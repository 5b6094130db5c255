//! Normalization of catalog durations into billable minutes.
//!
//! The catalog reports durations as ISO-8601 strings (`PT1H4M13S`). Billing
//! works in whole minutes and whole hours, always rounding up.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

static ISO_DURATION: OnceLock<Regex> = OnceLock::new();

fn iso_duration() -> &'static Regex {
    ISO_DURATION.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(\.\d+)?S)?)?$")
            .expect("ISO-8601 duration pattern must compile")
    })
}

/// Parse an ISO-8601 duration into whole seconds.
///
/// Fractional seconds round up. Returns `None` when the string is not a
/// duration at all, or when it does not fit in a `u64` of seconds.
pub fn duration_to_seconds(encoded: &str) -> Option<u64> {
    let caps = iso_duration().captures(encoded.trim())?;

    // absent components are 0; present ones must fit a u64
    let component = |idx: usize| -> Option<u64> {
        caps.get(idx).map_or(Some(0), |m| m.as_str().parse::<u64>().ok())
    };

    let days = component(1)?;
    let hours = component(2)?;
    let minutes = component(3)?;
    let mut seconds = component(4)?;
    if caps.get(5).is_some() {
        seconds = seconds.checked_add(1)?;
    }

    days.checked_mul(86_400)?
        .checked_add(hours.checked_mul(3_600)?)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Convert a catalog duration into whole minutes (`ceil(seconds / 60)`).
///
/// Malformed input counts as 0 minutes. The warning is the only trace of the
/// upstream problem, so keep it.
pub fn duration_to_minutes(encoded: &str) -> u32 {
    match duration_to_seconds(encoded) {
        Some(seconds) => minutes_for_seconds(seconds),
        None => {
            warn!(duration = encoded, "Unparseable catalog duration, counting as 0 minutes");
            0
        }
    }
}

/// `ceil(seconds / 60)`, saturating at `u32::MAX`.
pub fn minutes_for_seconds(seconds: u64) -> u32 {
    u32::try_from(seconds.div_ceil(60)).unwrap_or(u32::MAX)
}

/// Billable video-hours for a number of minutes (`ceil(minutes / 60)`).
pub fn hours_for_minutes(minutes: u32) -> u32 {
    minutes.div_ceil(60)
}
