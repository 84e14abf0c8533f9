//! Highest regular-season points bonus

use super::BonusEngine;
use crate::config::Config;
use crate::error::Result;
use crate::season::SeasonMatchups;
use crate::store::ResultStore;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone)]
pub struct HighPointsConfig {
    pub bonus: Decimal,
    pub regular_season_weeks: u32,
}

impl From<&Config> for HighPointsConfig {
    fn from(config: &Config) -> Self {
        Self {
            bonus: config.financial.high_points_bonus,
            regular_season_weeks: config.game.regular_season_weeks,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighPointsWinner {
    pub team: String,
    pub points: Decimal,
    pub bonus: Decimal,
}

pub struct HighPointsEngine {
    config: HighPointsConfig,
}

impl HighPointsEngine {
    pub fn new(config: HighPointsConfig) -> Self {
        Self { config }
    }

    /// Regular-season points per team, counting both sides of each record
    pub fn totals(&self, season: &SeasonMatchups) -> BTreeMap<String, Decimal> {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for record in season.records_in(self.weeks()) {
            for (_, name, points) in record.sides() {
                if name.is_empty() {
                    continue;
                }
                *totals.entry(name.to_string()).or_default() += points;
            }
        }
        totals
    }

    /// Highest total wins; equal totals go to the alphabetically first name
    pub fn compute(&self, season: &SeasonMatchups) -> Option<HighPointsWinner> {
        let mut best: Option<(String, Decimal)> = None;
        for (team, points) in self.totals(season) {
            if best.as_ref().map_or(true, |(_, top)| points > *top) {
                best = Some((team, points));
            }
        }

        best.map(|(team, points)| HighPointsWinner {
            team,
            points,
            bonus: self.config.bonus,
        })
    }

    pub async fn run(&self, store: &dyn ResultStore) -> Result<Option<HighPointsWinner>> {
        let season = SeasonMatchups::load(store, self.weeks()).await?;
        Ok(self.compute(&season))
    }
}

impl BonusEngine for HighPointsEngine {
    fn weeks(&self) -> RangeInclusive<u32> {
        1..=self.config.regular_season_weeks
    }

    fn name(&self) -> &'static str {
        "Highest Points"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameStatus, MatchupRecord, Team, TeamMatchup};
    use rust_decimal_macros::dec;

    fn record(week: u32, a: &str, a_pts: Decimal, b: &str, b_pts: Decimal) -> MatchupRecord {
        MatchupRecord::from_matchup(
            &Team {
                team_key: format!("k.{}", a),
                team_id: "0".into(),
                team_name: a.into(),
            },
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

    fn engine() -> HighPointsEngine {
        HighPointsEngine::new(HighPointsConfig {
            bonus: dec!(50),
            regular_season_weeks: 13,
        })
    }

    #[test]
    fn test_highest_total_wins() {
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, "A", dec!(100), "B", dec!(80))]);
        season.insert(2, vec![
            record(2, "C", dec!(110), "A", dec!(90)),
            record(2, "B", dec!(95), "D", dec!(10)),
        ]);
        season.insert(3, vec![record(3, "C", dec!(100), "D", dec!(10))]);

        let winner = engine().compute(&season).unwrap();
        assert_eq!(winner.team, "C");
        assert_eq!(winner.points, dec!(210));
        assert_eq!(winner.bonus, dec!(50));

        let totals = engine().totals(&season);
        assert_eq!(totals["A"], dec!(190));
        assert_eq!(totals["B"], dec!(175));
    }

    #[test]
    fn test_playoff_weeks_ignored() {
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, "A", dec!(100), "B", dec!(90))]);
        season.insert(14, vec![record(14, "B", dec!(300), "A", dec!(0))]);

        assert_eq!(engine().compute(&season).unwrap().team, "A");
    }

    #[test]
    fn test_tie_goes_to_first_name() {
        let mut season = SeasonMatchups::new();
        season.insert(1, vec![record(1, "Zulu", dec!(100), "Mike", dec!(100))]);

        assert_eq!(engine().compute(&season).unwrap().team, "Mike");
    }

    #[test]
    fn test_no_data() {
        assert!(engine().compute(&SeasonMatchups::new()).is_none());
    }
}
