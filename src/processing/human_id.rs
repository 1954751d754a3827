use crate::error::Result;
use crate::state::IncidentStore;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use std::sync::Arc;

/// `MMDDYY` for the given calendar day
pub fn date_prefix(date: NaiveDate) -> String {
    format!(
        "{:02}{:02}{:02}",
        date.month(),
        date.day(),
        date.year().rem_euclid(100)
    )
}

/// Issues `MMDDYY-INCnnn` identifiers from the store's per-day counter
#[derive(Clone)]
pub struct HumanIdGenerator {
    store: Arc<dyn IncidentStore>,
}

impl HumanIdGenerator {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self { store }
    }

    /// Next identifier for the day `now` falls on.
    ///
    /// The suffix is zero-padded to three digits and widens past 999.
    pub async fn next_human_id(&self, now: DateTime<Local>) -> Result<String> {
        let prefix = format!("{}-INC", date_prefix(now.date_naive()));
        let sequence = self.store.next_daily_sequence(&prefix).await?;
        Ok(format!("{prefix}{sequence:03}"))
    }
}
