//! Season bonus engines
//!
//! Each engine is a pure computation over stored matchups plus a `run` that
//! loads its inputs from the store and persists its output where it has one.

pub mod high_points;
pub mod skins;
pub mod survivor;

pub use high_points::{HighPointsConfig, HighPointsEngine, HighPointsWinner};
pub use skins::{SkinsConfig, SkinsEngine, SkinsEntry, SkinsOutcome};
pub use survivor::{SurvivorConfig, SurvivorEngine};

use crate::config::Config;
use crate::error::Result;
use crate::store::ResultStore;
use crate::types::{SurvivorResult, Team};
use std::ops::RangeInclusive;
use tracing::info;

/// Common surface of the bonus engines
pub trait BonusEngine {
    /// Weeks the engine reads
    fn weeks(&self) -> RangeInclusive<u32>;

    /// Engine name for display
    fn name(&self) -> &'static str;
}

/// Runs every enabled bonus engine
pub struct BonusRunner {
    pub survivor: Option<SurvivorEngine>,
    pub skins: Option<SkinsEngine>,
    pub high_points: HighPointsEngine,
}

impl BonusRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            survivor: config
                .game
                .survivor_pool_enabled
                .then(|| SurvivorEngine::new(SurvivorConfig::from(config))),
            skins: config
                .game
                .skins_game_enabled
                .then(|| SkinsEngine::new(SkinsConfig::from(config))),
            high_points: HighPointsEngine::new(HighPointsConfig::from(config)),
        }
    }

    /// Run all enabled engines against the stored season
    pub async fn run_all(&self, store: &dyn ResultStore, roster: &[Team]) -> Result<BonusResults> {
        let skins = match &self.skins {
            Some(engine) => {
                info!("Running {} over weeks {:?}", engine.name(), engine.weeks());
                Some(engine.run(store).await?)
            }
            None => None,
        };

        let survivor = match &self.survivor {
            Some(engine) => {
                info!("Running {} over weeks {:?}", engine.name(), engine.weeks());
                Some(engine.run(store, roster).await?)
            }
            None => None,
        };

        let high_points = self.high_points.run(store).await?;

        Ok(BonusResults {
            skins,
            survivor,
            high_points,
        })
    }
}

/// Output of a full bonus run
#[derive(Debug, Clone)]
pub struct BonusResults {
    pub skins: Option<SkinsOutcome>,
    pub survivor: Option<SurvivorResult>,
    pub high_points: Option<HighPointsWinner>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::sample_config;
    use crate::store::{documents, save_doc, MemoryStore};
    use crate::types::{GameStatus, MatchupRecord, TeamMatchup};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn team(n: u32, name: &str) -> Team {
        Team {
            team_key: format!("k{}", n),
            team_id: n.to_string(),
            team_name: name.into(),
        }
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

    #[test]
    fn test_disabled_engines_are_skipped() {
        let mut config = sample_config();
        config.game.skins_game_enabled = false;
        let runner = BonusRunner::new(&config);
        assert!(runner.skins.is_none());
        assert!(runner.survivor.is_some());
    }

    #[tokio::test]
    async fn test_run_all_persists_results() {
        let store = MemoryStore::new();
        let (a, b) = (team(1, "Alpha"), team(2, "Bravo"));
        save_doc(
            &store,
            &documents::week_matchups(1),
            &vec![record(1, &a, dec!(130), &b, dec!(90))],
        )
        .await
        .unwrap();

        let runner = BonusRunner::new(&sample_config());
        let results = runner.run_all(&store, &[a, b]).await.unwrap();

        let skins = results.skins.unwrap();
        assert_eq!(skins.totals.get("Alpha"), Some(&dec!(10)));
        let survivor = results.survivor.unwrap();
        assert_eq!(survivor.winner.as_deref(), Some("Alpha"));
        assert_eq!(results.high_points.unwrap().team, "Alpha");

        assert!(store.load(documents::SKINS).await.unwrap().is_some());
        assert!(store.load(documents::SURVIVOR).await.unwrap().is_some());
    }
}
