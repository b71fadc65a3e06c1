use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream sentinel for an event without a start time.
pub const ALL_DAY: &str = "終日";

/// Which slice of the schedule an extraction should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Only events dated exactly today.
    TodayOnly,
    /// Every event from today onward.
    AllFuture,
}

/// Start time of an event as shown on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTime {
    /// "H:MM" or "HH:MM" as it appeared at the start of the entry text.
    At(String),
    AllDay,
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::At(t) => f.write_str(t),
            EventTime::AllDay => f.write_str(ALL_DAY),
        }
    }
}

/// One calendar entry. Immutable once constructed; `Display` renders the
/// canonical line used both for user output and for change fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub month: u32,
    pub day: u32,
    pub time: EventTime,
    pub description: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🔹 {:02}/{:02} {} - {}",
            self.month, self.day, self.time, self.description
        )
    }
}

/// Sorts ascending by (month, day) and drops exact duplicates.
/// The sort is stable, so same-day events keep their page order.
pub fn sort_events(events: &mut Vec<Event>) {
    events.sort_by_key(|e| (e.month, e.day));
    let mut seen = std::collections::HashSet::new();
    events.retain(|e| seen.insert(e.clone()));
}

/// Canonical multi-line rendering of an event list; input to fingerprinting.
pub fn serialize_events(events: &[Event]) -> String {
    events
        .iter()
        .map(Event::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Public calendar page for a member id.
pub fn member_url(user_id: &str) -> String {
    format!("https://freecalend.com/open/mem{user_id}/")
}
