use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;

use crate::store::{JsonStoreExt, KeyValueStore};

pub const COUNTER_PREFIX: &str = "counter:";

/// Numeric tally that resets when the calendar date changes, e.g. glasses
/// of water. The value and the date it belongs to live under separate keys.
#[derive(Clone)]
pub struct DailyCounter {
    store: Arc<dyn KeyValueStore>,
    name: String,
}

impl DailyCounter {
    pub fn new(store: Arc<dyn KeyValueStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn value_key(&self) -> String {
        format!("{COUNTER_PREFIX}{}", self.name)
    }

    fn date_key(&self) -> String {
        format!("{COUNTER_PREFIX}{}:date", self.name)
    }

    pub fn get(&self, today: NaiveDate) -> u32 {
        let stored_date: Option<NaiveDate> = self.store.get_json(&self.date_key());
        if stored_date != Some(today) {
            return 0;
        }
        self.store.get_json(&self.value_key()).unwrap_or(0)
    }

    pub fn increment(&self, today: NaiveDate) -> Result<u32> {
        self.set(today, self.get(today).saturating_add(1))
    }

    pub fn decrement(&self, today: NaiveDate) -> Result<u32> {
        self.set(today, self.get(today).saturating_sub(1))
    }

    pub fn set(&self, today: NaiveDate, value: u32) -> Result<u32> {
        self.store.set_json(&self.value_key(), &value)?;
        self.store.set_json(&self.date_key(), &today)?;
        Ok(value)
    }

    pub fn reset(&self) -> Result<()> {
        self.store.remove(&self.value_key())?;
        self.store.remove(&self.date_key())
    }
}
