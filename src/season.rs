//! Stored weekly matchups for a season
//!
//! Loads `week_<n>_matchup.json` documents into memory. Each record is parsed
//! on its own so one bad entry does not hide the rest of its week.

use crate::error::Result;
use crate::store::{documents, ResultStore};
use crate::types::MatchupRecord;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Matchup records keyed by week number
#[derive(Debug, Clone, Default)]
pub struct SeasonMatchups {
    weeks: BTreeMap<u32, Vec<MatchupRecord>>,
}

impl SeasonMatchups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the given weeks from the store; weeks without a document are left out
    pub async fn load(
        store: &dyn ResultStore,
        weeks: impl IntoIterator<Item = u32>,
    ) -> Result<Self> {
        let mut season = Self::new();

        for week in weeks {
            let name = documents::week_matchups(week);
            match store.load(&name).await? {
                Some(value) => {
                    season.insert(week, parse_week(week, value));
                }
                None => debug!("No stored matchups for week {}", week),
            }
        }

        Ok(season)
    }

    pub fn insert(&mut self, week: u32, records: Vec<MatchupRecord>) {
        self.weeks.insert(week, records);
    }

    /// Records for a week, `None` when the week has no document
    pub fn week(&self, week: u32) -> Option<&[MatchupRecord]> {
        self.weeks.get(&week).map(Vec::as_slice)
    }

    pub fn has_week(&self, week: u32) -> bool {
        self.weeks.contains_key(&week)
    }

    /// Week numbers with a document, ascending
    pub fn weeks(&self) -> impl Iterator<Item = u32> + '_ {
        self.weeks.keys().copied()
    }

    /// All records of the weeks in `range`, in week order
    pub fn records_in(
        &self,
        range: std::ops::RangeInclusive<u32>,
    ) -> impl Iterator<Item = &MatchupRecord> {
        self.weeks.range(range).flat_map(|(_, records)| records.iter())
    }

    /// Every team name appearing on either side of a record in `range`
    pub fn team_names(&self, range: std::ops::RangeInclusive<u32>) -> BTreeSet<String> {
        self.records_in(range)
            .flat_map(|r| [r.team_name.clone(), r.opponent_name.clone()])
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }
}

/// Parse a week document, skipping records that do not fit the record shape
fn parse_week(week: u32, value: Value) -> Vec<MatchupRecord> {
    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            warn!(
                "Week {} document is not a list (found {}), ignoring it",
                week,
                kind(&other)
            );
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value::<MatchupRecord>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed record {} in week {}: {}", i, week, e);
                None
            }
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
