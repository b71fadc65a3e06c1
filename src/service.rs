//! The one entry point callers use to get a user's schedule: renders the
//! page and extracts events. `Err` means the fetch itself failed; `Ok` with
//! an empty list means the page parsed fine and holds no upcoming events.
//! The two must never be conflated downstream.

use crate::error::Result;
use crate::extractor;
use crate::renderer::PageRenderer;
use crate::types::{member_url, Event, ScheduleMode};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ScheduleService {
    renderer: Arc<dyn PageRenderer>,
}

impl ScheduleService {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self { renderer }
    }

    /// Fetches and parses the schedule for one user.
    pub async fn refresh(
        &self,
        user_id: &str,
        username: &str,
        mode: ScheduleMode,
    ) -> Result<Vec<Event>> {
        let url = member_url(user_id);
        info!(user = username, user_id, ?mode, "fetching schedule");

        let html = self.renderer.fetch(&url, username).await?;
        let today = chrono::Local::now().date_naive();
        let events = extractor::extract(&html, user_id, mode, today);

        if events.is_empty() {
            warn!(user = username, "schedule extraction returned no events");
        } else {
            info!(user = username, count = events.len(), "schedule extracted");
        }
        Ok(events)
    }
}
