//! Survivor pool
//!
//! Each regular-season week the lowest scorer among the teams still alive is
//! eliminated. The last team standing collects the survivor bonus.

use super::BonusEngine;
use crate::config::Config;
use crate::error::Result;
use crate::season::SeasonMatchups;
use crate::store::{documents, load_doc, save_doc, ResultStore};
use crate::types::{SurvivorElimination, SurvivorResult, Team};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SurvivorConfig {
    pub bonus: Decimal,
    pub regular_season_weeks: u32,
}

impl From<&Config> for SurvivorConfig {
    fn from(config: &Config) -> Self {
        Self {
            bonus: config.financial.survivor_bonus,
            regular_season_weeks: config.game.regular_season_weeks,
        }
    }
}

pub struct SurvivorEngine {
    config: SurvivorConfig,
}

impl SurvivorEngine {
    pub fn new(config: SurvivorConfig) -> Self {
        Self { config }
    }

    /// Continue the pool from `prior` using the stored weeks.
    ///
    /// Ties for the lowest score eliminate the team with the smallest key.
    /// Weeks with no stored document are skipped.
    pub fn compute(
        &self,
        roster: &[Team],
        season: &SeasonMatchups,
        prior: &SurvivorResult,
    ) -> SurvivorResult {
        let mut result = prior.clone();
        if result.is_complete() {
            return result;
        }

        // key -> name, ordered so ties resolve by key
        let mut active: BTreeMap<&str, &str> = roster
            .iter()
            .filter(|t| !prior.is_eliminated(&t.team_key))
            .map(|t| (t.team_key.as_str(), t.team_name.as_str()))
            .collect();
        let key_by_name: HashMap<&str, &str> = roster
            .iter()
            .map(|t| (t.team_name.as_str(), t.team_key.as_str()))
            .collect();

        for week in self.weeks() {
            if active.len() <= 1 {
                break;
            }
            if result.eliminated_week(week) {
                continue;
            }

            let Some(records) = season.week(week) else {
                debug!("Survivor: no data for week {}, skipping", week);
                continue;
            };

            let mut lowest: Option<(Decimal, &str)> = None;
            for record in records {
                for (key, name, points) in record.sides() {
                    // Older records carry no opponent key
                    let key = if key.is_empty() {
                        match key_by_name.get(name) {
                            Some(k) => *k,
                            None => continue,
                        }
                    } else {
                        key
                    };

                    let Some((&active_key, _)) = active.get_key_value(key) else {
                        continue;
                    };
                    let candidate = (points, active_key);
                    if lowest.map_or(true, |current| candidate < current) {
                        lowest = Some(candidate);
                    }
                }
            }

            let Some((score, key)) = lowest else {
                warn!("Survivor: no active teams found in week {}", week);
                continue;
            };

            if let Some(name) = active.remove(key) {
                info!("Week {}: {} eliminated with {} points", week, name, score);
                result.eliminations.push(SurvivorElimination {
                    week,
                    team_key: key.to_string(),
                    team_name: name.to_string(),
                    score,
                });
            }
        }

        if active.len() == 1 {
            if let Some((key, name)) = active.into_iter().next() {
                info!("Survivor pool winner: {}", name);
                result.winner = Some(name.to_string());
                result.winner_key = Some(key.to_string());
                result.bonus = self.config.bonus;
            }
        }

        result
    }

    /// Resume from the stored result, then persist the updated pool
    pub async fn run(&self, store: &dyn ResultStore, roster: &[Team]) -> Result<SurvivorResult> {
        let prior = match load_doc::<SurvivorResult>(store, documents::SURVIVOR).await {
            Ok(prior) => prior.unwrap_or_default(),
            Err(e) if e.is_skippable() => {
                warn!("Ignoring unreadable survivor results: {}", e);
                SurvivorResult::default()
            }
            Err(e) => return Err(e),
        };

        let season = SeasonMatchups::load(store, self.weeks()).await?;
        let result = self.compute(roster, &season, &prior);

        save_doc(store, documents::SURVIVOR, &result).await?;
        Ok(result)
    }
}

impl BonusEngine for SurvivorEngine {
    fn weeks(&self) -> RangeInclusive<u32> {
        1..=self.config.regular_season_weeks
    }

    fn name(&self) -> &'static str {
        "Survivor Pool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{GameStatus, MatchupRecord, TeamMatchup};
    use rust_decimal_macros::dec;

    fn roster(names: &[&str]) -> Vec<Team> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Team {
                team_key: format!("k{}", i + 1),
                team_id: (i + 1).to_string(),
                team_name: name.to_string(),
            })
            .collect()
    }

    fn record(week: u32, a: &Team, a_pts: Decimal, b: &Team, b_pts: Decimal) -> MatchupRecord {
        MatchupRecord::from_matchup(
            a,
            &TeamMatchup {
                week,
                status: GameStatus::Final,
                team_points: a_pts,
                opponent_points: b_pts,
                opponent_key: b.team_key.clone(),
                opponent_name: b.team_name.clone(),
            },
        )
    }

    fn engine() -> SurvivorEngine {
        SurvivorEngine::new(SurvivorConfig {
            bonus: dec!(50),
            regular_season_weeks: 13,
        })
    }

    /// Round-robin style weeks where every team plays; scores given per team
    fn week_of(week: u32, teams: &[Team], scores: &[Decimal]) -> Vec<MatchupRecord> {
        teams
            .chunks(2)
            .zip(scores.chunks(2))
            .map(|(pair, pts)| match (pair, pts) {
                ([a, b], [pa, pb]) => record(week, a, *pa, b, *pb),
                ([a], [pa]) => record(week, a, *pa, a, *pa),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn test_lowest_scorer_eliminated_each_week() {
        let teams = roster(&["A", "B", "C", "D"]);
        let mut season = SeasonMatchups::new();
        season.insert(1, week_of(1, &teams, &[dec!(100), dec!(80), dec!(90), dec!(85)]));
        season.insert(2, vec![
            record(2, &teams[0], dec!(70), &teams[2], dec!(95)),
            record(2, &teams[3], dec!(88), &teams[1], dec!(10)),
        ]);
        season.insert(3, vec![record(3, &teams[2], dec!(60), &teams[3], dec!(61))]);

        let result = engine().compute(&teams, &season, &SurvivorResult::default());

        let eliminated: Vec<_> = result.eliminations.iter().map(|e| e.team_name.as_str()).collect();
        assert_eq!(eliminated, vec!["B", "A", "C"]);
        assert_eq!(result.winner.as_deref(), Some("D"));
        assert_eq!(result.winner_key.as_deref(), Some("k4"));
        assert_eq!(result.bonus, dec!(50));
    }

    #[test]
    fn test_eliminated_team_never_returns() {
        let teams = roster(&["A", "B", "C"]);
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, &teams[0], dec!(50), &teams[1], dec!(90))]);
        // A is already out; its low score must not matter
        season.insert(2, vec![
            record(2, &teams[0], dec!(1), &teams[1], dec!(70)),
            record(2, &teams[2], dec!(80), &teams[2], dec!(80)),
        ]);

        let result = engine().compute(&teams, &season, &SurvivorResult::default());
        assert_eq!(result.eliminations.len(), 2);
        assert_eq!(result.eliminations[0].team_name, "A");
        assert_eq!(result.eliminations[1].team_name, "B");
        assert_eq!(result.winner.as_deref(), Some("C"));
    }

    #[test]
    fn test_tie_eliminates_smallest_key() {
        let teams = roster(&["A", "B", "C"]);
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![
            record(1, &teams[2], dec!(75), &teams[1], dec!(75)),
            record(1, &teams[0], dec!(100), &teams[0], dec!(100)),
        ]);

        let result = engine().compute(&teams, &season, &SurvivorResult::default());
        assert_eq!(result.eliminations.len(), 1);
        assert_eq!(result.eliminations[0].team_key, "k2");
        assert!(result.winner.is_none());
        assert_eq!(result.bonus, Decimal::ZERO);
    }

    #[test]
    fn test_missing_week_is_skipped() {
        let teams = roster(&["A", "B", "C"]);
        let mut season = SeasonMatchups::new();
        // C on a bye in week 1, no document at all for week 2
        season.insert(1, vec![
            record(1, &teams[0], dec!(50), &teams[1], dec!(90)),
            record(1, &teams[2], dec!(95), &teams[2], dec!(95)),
        ]);
        season.insert(3, vec![record(3, &teams[1], dec!(40), &teams[2], dec!(90))]);

        let result = engine().compute(&teams, &season, &SurvivorResult::default());
        let eliminated: Vec<_> = result
            .eliminations
            .iter()
            .map(|e| (e.week, e.team_name.as_str()))
            .collect();
        assert_eq!(eliminated, vec![(1, "A"), (3, "B")]);
        assert_eq!(result.winner.as_deref(), Some("C"));
        assert_eq!(result.bonus, dec!(50));
    }

    #[test]
    fn test_resumes_from_prior_result() {
        let teams = roster(&["A", "B", "C"]);
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, &teams[0], dec!(50), &teams[1], dec!(90))]);
        season.insert(2, vec![record(2, &teams[1], dec!(40), &teams[2], dec!(90))]);

        let first = engine().compute(&teams, &season, &SurvivorResult::default());
        let again = engine().compute(&teams, &season, &first);
        assert_eq!(first, again);

        let partial = SurvivorResult {
            eliminations: first.eliminations[..1].to_vec(),
            ..SurvivorResult::default()
        };
        assert_eq!(engine().compute(&teams, &season, &partial), first);
    }

    #[test]
    fn test_week_without_active_teams_is_skipped() {
        let teams = roster(&["A", "B", "C"]);
        let stranger = Team {
            team_key: "x".into(),
            team_id: "9".into(),
            team_name: "X".into(),
        };
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, &stranger, dec!(1), &stranger, dec!(1))]);
        season.insert(2, vec![record(2, &teams[0], dec!(10), &teams[1], dec!(20))]);

        let result = engine().compute(&teams, &season, &SurvivorResult::default());
        assert_eq!(result.eliminations.len(), 1);
        assert_eq!(result.eliminations[0].week, 2);
    }

    #[tokio::test]
    async fn test_run_persists_and_is_repeatable() {
        let store = MemoryStore::new();
        let teams = roster(&["A", "B"]);
        crate::store::save_doc(
            &store,
            &documents::week_matchups(1),
            &vec![record(1, &teams[0], dec!(50), &teams[1], dec!(90))],
        )
        .await
        .unwrap();

        let first = engine().run(&store, &teams).await.unwrap();
        let second = engine().run(&store, &teams).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.winner.as_deref(), Some("B"));

        let stored: SurvivorResult = load_doc(&store, documents::SURVIVOR).await.unwrap().unwrap();
        assert_eq!(stored, first);
    }
}
