//! Fantasy Football League Ledger
//!
//! Tracks a fantasy football league's weekly results and settles its money:
//!
//! 1. **Ingestion**: pull final matchups from the league source and store one
//!    record per pairing per week.
//! 2. **Bonuses**: skins pot, survivor pool and highest regular-season points,
//!    computed from the stored weeks.
//! 3. **Accounting**: playoff payouts plus bonuses against each team's buy-in,
//!    and a ledger of dues collected.

pub mod accounting;
pub mod bonus;
pub mod config;
pub mod error;
pub mod ingest;
pub mod report;
pub mod season;
pub mod source;
pub mod store;
pub mod types;

pub use accounting::{BalanceSheet, BalanceStatus, FinancialReport, LeagueAccounting, WinningsLedger};
pub use bonus::{BonusRunner, HighPointsEngine, SkinsEngine, SurvivorEngine};
pub use config::Config;
pub use error::{LeagueError, Result};
pub use ingest::{MatchupIngestor, WeekIngestion};
pub use season::SeasonMatchups;
pub use source::{LeagueDataSource, YahooClient};
pub use store::{open_store, GitHubStore, LocalStore, MemoryStore, ResultStore};
pub use types::{MatchupRecord, Team, WeekSelector};
