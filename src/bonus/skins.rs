//! Weekly skins pot
//!
//! The biggest qualifying margin of victory each week takes the pot. When no
//! margin qualifies the pot rolls over and grows by the weekly amount.

use super::BonusEngine;
use crate::config::Config;
use crate::error::Result;
use crate::season::SeasonMatchups;
use crate::store::{documents, save_doc, ResultStore};
use crate::types::{de_week, SkinsWin};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SkinsConfig {
    /// Starting pot, and the amount added for each week without a winner
    pub weekly_pot: Decimal,
    pub min_margin: Decimal,
    pub season_weeks: u32,
}

impl From<&Config> for SkinsConfig {
    fn from(config: &Config) -> Self {
        Self {
            weekly_pot: config.financial.skins_weekly_pot,
            min_margin: config.game.skins_min_margin,
            season_weeks: config.game.season_weeks,
        }
    }
}

/// One win as stored in `skins_winners.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinsEntry {
    #[serde(deserialize_with = "de_week")]
    pub week_number: u32,
    pub margin_victory: Decimal,
    pub pot_winnings: Decimal,
}

/// Chronological wins plus per-team totals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinsOutcome {
    pub wins: Vec<SkinsWin>,
    pub totals: BTreeMap<String, Decimal>,
    /// Pot carried into the next week
    pub carryover: Decimal,
}

impl SkinsOutcome {
    /// Stored shape: team name to its list of wins
    pub fn to_document(&self) -> BTreeMap<String, Vec<SkinsEntry>> {
        let mut doc: BTreeMap<String, Vec<SkinsEntry>> = BTreeMap::new();
        for win in &self.wins {
            doc.entry(win.team.clone()).or_default().push(SkinsEntry {
                week_number: win.week,
                margin_victory: win.margin,
                pot_winnings: win.pot,
            });
        }
        doc
    }

    pub fn weeks_won(&self, team: &str) -> usize {
        self.wins.iter().filter(|w| w.team == team).count()
    }
}

pub struct SkinsEngine {
    config: SkinsConfig,
}

impl SkinsEngine {
    pub fn new(config: SkinsConfig) -> Self {
        Self { config }
    }

    /// Scan the season in week order.
    ///
    /// Weeks without a document leave the pot unchanged. Equal margins in one
    /// week go to the record stored first.
    pub fn compute(&self, season: &SeasonMatchups) -> SkinsOutcome {
        let base = self.config.weekly_pot;
        let mut outcome = SkinsOutcome::default();
        let mut pot = base;

        for week in self.weeks() {
            let Some(records) = season.week(week) else {
                continue;
            };

            let best = records
                .iter()
                .filter_map(|r| r.decisive_margin())
                .filter(|(_, margin)| *margin >= self.config.min_margin)
                .fold(None, |best: Option<(&str, Decimal)>, (team, margin)| match best {
                    Some((_, top)) if top >= margin => best,
                    _ => Some((team, margin)),
                });

            match best {
                Some((team, margin)) => {
                    info!("Week {}: {} wins ${} skins pot by {}", week, team, pot, margin);
                    outcome.wins.push(SkinsWin {
                        week,
                        team: team.to_string(),
                        margin,
                        pot,
                    });
                    *outcome.totals.entry(team.to_string()).or_default() += pot;
                    pot = base;
                }
                None => {
                    pot += base;
                    debug!("Week {}: no qualifying margin, pot rolls to ${}", week, pot);
                }
            }
        }

        outcome.carryover = pot;
        outcome
    }

    pub async fn run(&self, store: &dyn ResultStore) -> Result<SkinsOutcome> {
        let season = SeasonMatchups::load(store, self.weeks()).await?;
        let outcome = self.compute(&season);

        save_doc(store, documents::SKINS, &outcome.to_document()).await?;
        info!(
            "Saved {} skins wins ({} carried over)",
            outcome.wins.len(),
            outcome.carryover
        );
        Ok(outcome)
    }
}

impl BonusEngine for SkinsEngine {
    fn weeks(&self) -> RangeInclusive<u32> {
        1..=self.config.season_weeks
    }

    fn name(&self) -> &'static str {
        "Skins Game"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{GameStatus, MatchupRecord, Team, TeamMatchup};
    use rust_decimal_macros::dec;

    fn team(name: &str) -> Team {
        Team {
            team_key: format!("k.{}", name),
            team_id: "0".into(),
            team_name: name.into(),
        }
    }

    fn record(week: u32, a: &str, a_pts: Decimal, b: &str, b_pts: Decimal) -> MatchupRecord {
        MatchupRecord::from_matchup(
            &team(a),
            &TeamMatchup {
                week,
                status: GameStatus::Final,
                team_points: a_pts,
                opponent_points: b_pts,
                opponent_key: format!("k.{}", b),
                opponent_name: b.into(),
            },
        )
    }

    fn engine() -> SkinsEngine {
        SkinsEngine::new(SkinsConfig {
            weekly_pot: dec!(10),
            min_margin: dec!(20),
            season_weeks: 17,
        })
    }

    #[test]
    fn test_pot_rolls_over_and_resets() {
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, "A", dec!(100), "B", dec!(80))]);
        season.insert(2, vec![record(2, "A", dec!(90), "B", dec!(95))]);
        season.insert(3, vec![record(3, "C", dec!(70), "A", dec!(68))]);
        season.insert(4, vec![record(4, "B", dec!(140), "C", dec!(100))]);
        season.insert(5, vec![record(5, "C", dec!(130), "A", dec!(100))]);

        let outcome = engine().compute(&season);

        let pots: Vec<_> = outcome.wins.iter().map(|w| (w.week, w.team.as_str(), w.pot)).collect();
        assert_eq!(
            pots,
            vec![(1, "A", dec!(10)), (4, "B", dec!(30)), (5, "C", dec!(10))]
        );
        assert_eq!(outcome.totals.get("B"), Some(&dec!(30)));
        assert_eq!(outcome.carryover, dec!(10));
    }

    #[test]
    fn test_pot_after_two_weeks_without_winner() {
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, "A", dec!(100), "B", dec!(80))]);
        season.insert(2, vec![record(2, "A", dec!(90), "B", dec!(95))]);

        let outcome = engine().compute(&season);
        assert_eq!(outcome.wins.len(), 1);
        assert_eq!(outcome.wins[0].margin, dec!(20));
        assert_eq!(outcome.carryover, dec!(20));
    }

    #[test]
    fn test_missing_weeks_do_not_grow_pot() {
        let mut season = SeasonMatchups::new();
        season.insert(6, vec![record(6, "A", dec!(150), "B", dec!(100))]);

        let outcome = engine().compute(&season);
        assert_eq!(outcome.wins[0].pot, dec!(10));
    }

    #[test]
    fn test_largest_margin_wins_first_on_tie() {
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![
            record(1, "A", dec!(120), "B", dec!(90)),
            record(1, "C", dec!(140), "D", dec!(100)),
            record(1, "E", dec!(140), "F", dec!(100)),
        ]);

        let outcome = engine().compute(&season);
        assert_eq!(outcome.wins.len(), 1);
        assert_eq!(outcome.wins[0].team, "C");
        assert_eq!(outcome.weeks_won("C"), 1);
    }

    #[test]
    fn test_ties_never_qualify() {
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, "A", dec!(100), "B", dec!(100))]);

        let outcome = engine().compute(&season);
        assert!(outcome.wins.is_empty());
        assert_eq!(outcome.carryover, dec!(20));
    }

    #[tokio::test]
    async fn test_run_writes_team_map() {
        let store = MemoryStore::new();
        save_doc(
            &store,
            &documents::week_matchups(1),
            &vec![record(1, "A", dec!(100), "B", dec!(70))],
        )
        .await
        .unwrap();

        engine().run(&store).await.unwrap();
        let doc = store.load(documents::SKINS).await.unwrap().unwrap();
        assert_eq!(doc["A"][0]["week_number"], 1);
        assert_eq!(doc["A"][0]["pot_winnings"], "10");
        assert_eq!(doc["A"][0]["margin_victory"], "30");
    }
}
