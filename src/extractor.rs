//! Parses rendered calendar HTML into a normalized event list.
//!
//! The upstream page has no published schema; schedule entries live in divs
//! whose ids follow the undocumented `ccexp-` convention. Two id shapes have
//! been observed in the wild:
//!
//!   ccexp-{userId}-{year}-{month}-{day}       owner-keyed entries
//!   ccexp-{year}-{month}-{day}-{sequence}     sequence-keyed entries
//!
//! Anything that fits neither shape is dropped element-by-element; this
//! function never fails outright.

use crate::types::{sort_events, Event, EventTime, ScheduleMode};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, error, info};

const ID_MARKER: &str = "ccexp-";

static ENTRY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[id^="ccexp-"]"#).unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static TIME_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}:\d{2})\s*(.+)$").unwrap());

/// Extracts the event list for `reference_user_id` from rendered page HTML.
///
/// `today` is injected so date filtering is deterministic under test;
/// production callers pass `Local::now().date_naive()`. Events dated before
/// `today` never appear. Returns an empty list (never an error) when the
/// page has no recognizable entries.
pub fn extract(
    html: &str,
    reference_user_id: &str,
    mode: ScheduleMode,
    today: NaiveDate,
) -> Vec<Event> {
    let document = Html::parse_document(html);

    let page_title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_else(|| "(no title)".to_string());
    info!(title = %page_title, "parsing schedule page");

    let entries: Vec<_> = document.select(&ENTRY_SELECTOR).collect();
    if entries.is_empty() {
        error!("no '{ID_MARKER}' schedule containers found; page structure may have changed");
        return Vec::new();
    }
    info!(count = entries.len(), "found schedule containers");

    let mut events = Vec::new();
    for entry in entries {
        let id = entry.value().attr("id").unwrap_or_default();

        let Some(date) = parse_entry_date(id, reference_user_id) else {
            debug!(id, "skipping entry with unparseable id");
            continue;
        };
        if date < today {
            continue;
        }
        if mode == ScheduleMode::TodayOnly && date != today {
            continue;
        }

        // All descendant text, whitespace-collapsed to single spaces.
        let text = entry
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            continue;
        }

        let (time, description) = match TIME_PREFIX.captures(&text) {
            Some(caps) => (
                EventTime::At(caps[1].to_string()),
                caps[2].trim().to_string(),
            ),
            None => (EventTime::AllDay, text),
        };
        if description.is_empty() {
            continue;
        }

        use chrono::Datelike;
        events.push(Event {
            month: date.month(),
            day: date.day(),
            time,
            description,
        });
    }

    sort_events(&mut events);
    events
}

/// Resolves an entry id to its calendar date, or None when the id fits
/// neither accepted shape or names an impossible date.
fn parse_entry_date(id: &str, reference_user_id: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = id.split('-').collect();
    if parts.len() < 5 {
        return None;
    }
    let (year, month, day) = if parts[1] == reference_user_id {
        (parts[2], parts[3], parts[4])
    } else {
        (parts[1], parts[2], parts[3])
    };
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_owner_keyed_shape() {
        let date = parse_entry_date("ccexp-12345-2025-06-25", "12345").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 25).unwrap());
    }

    #[test]
    fn accepts_sequence_keyed_shape() {
        let date = parse_entry_date("ccexp-2025-06-20-1", "12345").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 20).unwrap());
    }

    #[test]
    fn rejects_short_and_garbage_ids() {
        assert!(parse_entry_date("ccexp-2025-06-20", "12345").is_none());
        assert!(parse_entry_date("ccexp-aa-bb-cc-dd", "12345").is_none());
        // February 30th is not a date
        assert!(parse_entry_date("ccexp-2025-02-30-1", "12345").is_none());
    }
}
