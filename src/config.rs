//! Configuration management for the league ledger
//!
//! League rules and payouts come from a YAML file. Credentials come from the
//! environment (optionally via a `.env` file) so they never land in the config
//! that gets committed alongside league data.

use crate::error::LeagueError;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Ledger configuration loaded from the YAML config file and environment
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub league: LeagueConfig,

    pub financial: FinancialConfig,

    #[serde(default)]
    pub game: GameConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Secrets, never read from the YAML file
    #[serde(skip)]
    pub credentials: Credentials,
}

/// League identity
#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    /// Yahoo league id (the number after `.l.` in a league key)
    pub league_id: String,
    /// Yahoo game key for the season; fetched from the API when absent
    #[serde(default)]
    pub game_key: Option<String>,
    /// Number of teams in the league (default: 12)
    #[serde(default = "default_num_teams")]
    pub num_teams: u32,
}

impl LeagueConfig {
    /// Full league key, e.g. `449.l.410864`
    pub fn league_key(&self, game_key: &str) -> String {
        format!("{}.l.{}", game_key, self.league_id)
    }
}

/// Dues and payouts, all in league currency
#[derive(Debug, Clone, Deserialize)]
pub struct FinancialConfig {
    pub buy_in: Decimal,
    pub first_place: Decimal,
    pub second_place: Decimal,
    pub third_place: Decimal,
    pub survivor_bonus: Decimal,
    pub high_points_bonus: Decimal,
    /// Base skins pot, also the amount added for each rolled-over week
    pub skins_weekly_pot: Decimal,
}

impl FinancialConfig {
    /// Total of all fixed payouts (skins excluded, it depends on the season)
    pub fn total_guaranteed_payouts(&self) -> Decimal {
        self.first_place
            + self.second_place
            + self.third_place
            + self.survivor_bonus
            + self.high_points_bonus
    }

    /// Payout for a final playoff rank, if that rank is paid
    pub fn playoff_payout(&self, rank: u32) -> Option<Decimal> {
        match rank {
            1 => Some(self.first_place),
            2 => Some(self.second_place),
            3 => Some(self.third_place),
            _ => None,
        }
    }

    fn amounts(&self) -> [(&'static str, Decimal); 7] {
        [
            ("buy_in", self.buy_in),
            ("first_place", self.first_place),
            ("second_place", self.second_place),
            ("third_place", self.third_place),
            ("survivor_bonus", self.survivor_bonus),
            ("high_points_bonus", self.high_points_bonus),
            ("skins_weekly_pot", self.skins_weekly_pot),
        ]
    }
}

/// Side-game rules
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Minimum margin of victory that qualifies for the skins pot (default: 20)
    #[serde(default = "default_skins_min_margin")]
    pub skins_min_margin: Decimal,
    #[serde(default = "default_true")]
    pub survivor_pool_enabled: bool,
    #[serde(default = "default_true")]
    pub skins_game_enabled: bool,
    /// Last regular-season week (default: 13)
    #[serde(default = "default_regular_season_weeks")]
    pub regular_season_weeks: u32,
    /// Last week of the fantasy season, playoffs included (default: 17)
    #[serde(default = "default_season_weeks")]
    pub season_weeks: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            skins_min_margin: default_skins_min_margin(),
            survivor_pool_enabled: true,
            skins_game_enabled: true,
            regular_season_weeks: default_regular_season_weeks(),
            season_weeks: default_season_weeks(),
        }
    }
}

/// Which persistence backend holds league documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    GitHub,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the local backend (default: league_data)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Backup generations kept per document (default: 5)
    #[serde(default = "default_backup_generations")]
    pub backup_generations: usize,
    #[serde(default)]
    pub github: Option<GitHubStorageConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            data_dir: default_data_dir(),
            backup_generations: default_backup_generations(),
            github: None,
        }
    }
}

/// Repository that mirrors league documents
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubStorageConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub branch: Option<String>,
    /// Directory inside the repository, e.g. `seasons/2024`
    #[serde(default)]
    pub path_prefix: Option<String>,
}

/// Secrets loaded from the environment
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub yahoo_client_id: Option<String>,
    pub yahoo_client_secret: Option<String>,
    pub yahoo_token_file: PathBuf,
    pub github_token: Option<String>,
}

impl Credentials {
    /// Load credentials from environment variables
    pub fn from_env() -> Self {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self {
            yahoo_client_id: non_empty_var("YAHOO_CLIENT_ID"),
            yahoo_client_secret: non_empty_var("YAHOO_CLIENT_SECRET"),
            yahoo_token_file: env::var("YAHOO_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("token.json")),
            github_token: non_empty_var("GITHUB_TOKEN"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file plus environment credentials
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        config.credentials = Credentials::from_env();

        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> std::result::Result<(), LeagueError> {
        if self.league.league_id.trim().is_empty() {
            return Err(LeagueError::Config("League ID must be specified".into()));
        }

        if self.league.num_teams < 2 {
            return Err(LeagueError::Config(format!(
                "num_teams must be at least 2, got {}",
                self.league.num_teams
            )));
        }

        for (name, amount) in self.financial.amounts() {
            if amount.is_sign_negative() {
                return Err(LeagueError::Config(format!(
                    "financial.{} must not be negative, got {}",
                    name, amount
                )));
            }
        }

        if self.game.skins_min_margin.is_sign_negative() {
            return Err(LeagueError::Config(
                "game.skins_min_margin must not be negative".into(),
            ));
        }

        if self.game.season_weeks == 0 {
            return Err(LeagueError::Config("game.season_weeks must be positive".into()));
        }

        if self.game.regular_season_weeks == 0
            || self.game.regular_season_weeks > self.game.season_weeks
        {
            return Err(LeagueError::Config(format!(
                "game.regular_season_weeks must be between 1 and {}, got {}",
                self.game.season_weeks, self.game.regular_season_weeks
            )));
        }

        if self.storage.backend == StorageBackend::GitHub {
            match &self.storage.github {
                Some(gh) if !gh.owner.is_empty() && !gh.repo.is_empty() => {}
                _ => {
                    return Err(LeagueError::Config(
                        "storage.github.owner and storage.github.repo are required for the github backend"
                            .into(),
                    ))
                }
            }
        }

        Ok(())
    }
}

/// Yahoo Fantasy Sports API configuration
pub struct YahooApi;

impl YahooApi {
    pub const BASE_URL: &'static str = "https://fantasysports.yahooapis.com/fantasy/v2";
    pub const AUTH_URL: &'static str = "https://api.login.yahoo.com/oauth2/request_auth";
    pub const TOKEN_URL: &'static str = "https://api.login.yahoo.com/oauth2/get_token";
    pub const REDIRECT_URI: &'static str = "oob";
    pub const SCOPE: &'static str = "fspt-r";

    pub fn resource_url(endpoint: &str) -> String {
        format!("{}/{}", Self::BASE_URL, endpoint)
    }
}

/// GitHub REST API configuration
pub struct GitHubApi;

impl GitHubApi {
    pub const BASE_URL: &'static str = "https://api.github.com";

    pub fn contents_url(owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/{}/contents/{}", Self::BASE_URL, owner, repo, path)
    }

    pub fn commits_url(owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}/commits", Self::BASE_URL, owner, repo)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn default_num_teams() -> u32 {
    12
}

fn default_skins_min_margin() -> Decimal {
    Decimal::from(20)
}

fn default_true() -> bool {
    true
}

fn default_regular_season_weeks() -> u32 {
    13
}

fn default_season_weeks() -> u32 {
    17
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("league_data")
}

fn default_backup_generations() -> usize {
    5
}
