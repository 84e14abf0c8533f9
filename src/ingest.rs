//! Matchup ingestion
//!
//! Pulls each team's weekly matchup from the data source and stores one
//! canonical record per pairing as `week_<n>_matchup.json`.

use crate::error::{LeagueError, Result};
use crate::source::LeagueDataSource;
use crate::store::{documents, load_doc, save_doc, ResultStore};
use crate::types::{MatchupRecord, Team, WeekSelector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of ingesting a single week
#[derive(Debug, Clone, PartialEq)]
pub enum WeekIngestion {
    /// Week is final and its records were stored
    Final(Vec<MatchupRecord>),
    /// The source still reports games in progress; nothing was stored
    NotFinal,
    /// Week is final but no usable record came back
    Empty,
}

impl WeekIngestion {
    pub fn is_final(&self) -> bool {
        !matches!(self, WeekIngestion::NotFinal)
    }
}

pub struct MatchupIngestor {
    source: Arc<dyn LeagueDataSource>,
    store: Arc<dyn ResultStore>,
    season_weeks: u32,
}

impl MatchupIngestor {
    pub fn new(
        source: Arc<dyn LeagueDataSource>,
        store: Arc<dyn ResultStore>,
        season_weeks: u32,
    ) -> Self {
        Self {
            source,
            store,
            season_weeks,
        }
    }

    /// Stored roster, fetched and saved on first run
    pub async fn ensure_roster(&self) -> Result<Vec<Team>> {
        match load_doc::<Vec<Team>>(self.store.as_ref(), documents::TEAMS).await {
            Ok(Some(teams)) if !teams.is_empty() => {
                check_unique_names(&teams)?;
                debug!("Loaded {} teams from {}", teams.len(), documents::TEAMS);
                Ok(teams)
            }
            Ok(_) => {
                info!("{} not found, fetching roster from {}", documents::TEAMS, self.source.name());
                self.refresh_roster().await
            }
            Err(e) if e.is_skippable() => {
                warn!("Stored roster unusable ({}), fetching it again", e);
                self.refresh_roster().await
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the roster from the source and replace the stored copy
    pub async fn refresh_roster(&self) -> Result<Vec<Team>> {
        let teams = self.source.roster().await?;
        if teams.is_empty() {
            return Err(LeagueError::MissingData(format!(
                "{} returned an empty roster",
                self.source.name()
            )));
        }
        check_unique_names(&teams)?;

        save_doc(self.store.as_ref(), documents::TEAMS, &teams).await?;
        info!("Saved {} teams to {}", teams.len(), documents::TEAMS);
        Ok(teams)
    }

    /// Ingest one week for the given roster
    pub async fn ingest_week(&self, roster: &[Team], week: u32) -> Result<WeekIngestion> {
        let mut records: Vec<MatchupRecord> = Vec::new();

        for team in roster {
            // Already covered from the opponent's side
            if records.iter().any(|r| r.involves_key(&team.team_key)) {
                debug!("Week {}: {} already recorded", week, team.team_name);
                continue;
            }

            let matchup = match self.source.team_matchup(&team.team_key, week).await {
                Ok(matchup) => matchup,
                Err(e) if e.is_skippable() => {
                    warn!("Week {}: skipping {}: {}", week, team.team_name, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !matchup.status.is_final() {
                info!("Week {} is {}, nothing stored", week, matchup.status);
                return Ok(WeekIngestion::NotFinal);
            }

            if matchup.week != week {
                warn!(
                    "Week {}: source returned week {} for {}, skipping",
                    week, matchup.week, team.team_name
                );
                continue;
            }

            records.push(MatchupRecord::from_matchup(team, &matchup));
        }

        if records.is_empty() {
            warn!("Week {}: no matchups recorded", week);
            return Ok(WeekIngestion::Empty);
        }

        let name = documents::week_matchups(week);
        save_doc(self.store.as_ref(), &name, &records).await?;
        info!("Saved {} matchups to {}", records.len(), name);

        Ok(WeekIngestion::Final(records))
    }

    /// Ingest the selected weeks; `All` stops at the first week still in progress
    pub async fn ingest(&self, selector: WeekSelector) -> Result<Vec<(u32, WeekIngestion)>> {
        let weeks = selector.weeks(self.season_weeks)?;
        let roster = self.ensure_roster().await?;
        let mut outcomes = Vec::new();

        for week in weeks {
            info!("Processing week {}", week);
            let outcome = self.ingest_week(&roster, week).await?;
            let stop = !outcome.is_final();
            outcomes.push((week, outcome));
            if stop {
                break;
            }
        }

        Ok(outcomes)
    }
}

fn check_unique_names(teams: &[Team]) -> Result<()> {
    let mut seen = HashSet::new();
    for team in teams {
        if !seen.insert(team.team_name.as_str()) {
            return Err(LeagueError::MalformedRecord(format!(
                "team name {:?} appears more than once in the roster",
                team.team_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::ScriptedSource;
    use crate::store::MemoryStore;
    use crate::types::{Margin, Winner};
    use rust_decimal_macros::dec;

    fn four_team_source() -> ScriptedSource {
        ScriptedSource::new(&["Alpha", "Bravo", "Charlie", "Delta"])
            .game(1, "Alpha", dec!(100), "Bravo", dec!(80))
            .game(1, "Charlie", dec!(95.5), "Delta", dec!(95.5))
            .game(2, "Alpha", dec!(90), "Charlie", dec!(70))
            .game(2, "Bravo", dec!(120.25), "Delta", dec!(60))
    }

    fn ingestor(source: ScriptedSource) -> (MatchupIngestor, Arc<ScriptedSource>, MemoryStore) {
        let source = Arc::new(source);
        let store = MemoryStore::new();
        let ingestor = MatchupIngestor::new(source.clone(), Arc::new(store.clone()), 17);
        (ingestor, source, store)
    }

    #[tokio::test]
    async fn test_one_record_per_pairing() {
        let (ingestor, source, _store) = ingestor(four_team_source());
        let roster = ingestor.ensure_roster().await.unwrap();

        let WeekIngestion::Final(records) = ingestor.ingest_week(&roster, 1).await.unwrap() else {
            panic!("week 1 should be final");
        };

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].team_name, "Alpha");
        assert_eq!(records[0].winning_team, Winner::Team("Alpha".into()));
        assert_eq!(records[0].margin_victory, Margin::Points(dec!(20)));
        assert_eq!(records[1].winning_team, Winner::Tie);
        // Bravo and Delta are never fetched
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_reingest_is_byte_identical() {
        let (ingestor, _source, store) = ingestor(four_team_source());
        let roster = ingestor.ensure_roster().await.unwrap();
        let name = documents::week_matchups(2);

        ingestor.ingest_week(&roster, 2).await.unwrap();
        let first = serde_json::to_string(&store.load(&name).await.unwrap()).unwrap();
        ingestor.ingest_week(&roster, 2).await.unwrap();
        let second = serde_json::to_string(&store.load(&name).await.unwrap()).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_not_final_week_stores_nothing() {
        let (ingestor, _source, store) = ingestor(four_team_source().pending_week(2));

        let outcomes = ingestor.ingest(WeekSelector::All).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].1, WeekIngestion::Final(_)));
        assert_eq!(outcomes[1].1, WeekIngestion::NotFinal);
        assert!(store.load(&documents::week_matchups(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_team_is_skipped() {
        let (ingestor, _source, _store) = ingestor(four_team_source().malformed_team("Alpha"));
        let roster = ingestor.ensure_roster().await.unwrap();

        let WeekIngestion::Final(records) = ingestor.ingest_week(&roster, 1).await.unwrap() else {
            panic!("week 1 should be final");
        };
        // Bravo's perspective replaces Alpha's
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].team_name, "Bravo");
        assert_eq!(records[0].opponent_name, "Alpha");
    }

    #[tokio::test]
    async fn test_week_without_games_is_empty() {
        let (ingestor, _source, store) = ingestor(four_team_source());
        let roster = ingestor.ensure_roster().await.unwrap();

        assert_eq!(ingestor.ingest_week(&roster, 9).await.unwrap(), WeekIngestion::Empty);
        assert!(store.load(&documents::week_matchups(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_roster_saved_on_first_run() {
        let (ingestor, _source, store) = ingestor(four_team_source());
        ingestor.ensure_roster().await.unwrap();
        ingestor.ensure_roster().await.unwrap();

        assert_eq!(store.write_log().await, vec![documents::TEAMS]);
    }

    #[tokio::test]
    async fn test_duplicate_roster_names_rejected() {
        let (ingestor, _source, _store) = ingestor(ScriptedSource::new(&["Alpha", "Alpha"]));
        assert!(matches!(
            ingestor.ensure_roster().await,
            Err(LeagueError::MalformedRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_week() {
        let (ingestor, _source, _store) = ingestor(four_team_source());
        assert!(matches!(
            ingestor.ingest(WeekSelector::Week(18)).await,
            Err(LeagueError::Config(_))
        ));
    }
}
