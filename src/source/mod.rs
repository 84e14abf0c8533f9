//! League data sources
//!
//! A source answers three questions: who is in the league, what happened in a
//! team's matchup for a given week, and how the league finished.

pub mod yahoo;

pub use yahoo::YahooClient;

use crate::error::Result;
use crate::types::{StandingsEntry, Team, TeamMatchup};
use async_trait::async_trait;

#[async_trait]
pub trait LeagueDataSource: Send + Sync {
    /// Confirm credentials grant access to the league
    async fn verify_access(&self) -> Result<()>;

    /// Every team in the league
    async fn roster(&self) -> Result<Vec<Team>>;

    /// One team's matchup for a week
    async fn team_matchup(&self, team_key: &str, week: u32) -> Result<TeamMatchup>;

    /// Top `top_n` teams of the final standings, best rank first
    async fn final_standings(&self, top_n: usize) -> Result<Vec<StandingsEntry>>;

    /// Source name for display
    fn name(&self) -> &'static str;
}
