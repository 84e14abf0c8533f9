//! Yahoo Fantasy Sports API client
//!
//! Uses the OAuth2 out-of-band flow: the user opens the printed authorization
//! URL and pastes the code back. Tokens are cached in a JSON file and refreshed
//! when they expire.

use super::LeagueDataSource;
use crate::config::{Config, LeagueConfig, YahooApi};
use crate::error::{LeagueError, Result};
use crate::types::{GameStatus, StandingsEntry, Team, TeamMatchup};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Seconds before `expires_at` at which a token is treated as expired
const EXPIRY_BUFFER_SECS: i64 = 300;

/// Cached OAuth2 token
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OAuthToken {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    expires_at: i64,
}

impl OAuthToken {
    fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at - EXPIRY_BUFFER_SECS
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

pub struct YahooClient {
    client: Client,
    client_id: String,
    client_secret: String,
    token_file: PathBuf,
    token: Mutex<Option<OAuthToken>>,
    league: LeagueConfig,
    game_key: Mutex<Option<String>>,
}

impl YahooClient {
    /// Build a client from config credentials; missing credentials are fatal
    pub fn from_config(config: &Config) -> Result<Self> {
        let creds = &config.credentials;
        let client_id = creds
            .yahoo_client_id
            .clone()
            .ok_or_else(|| LeagueError::Config("YAHOO_CLIENT_ID must be set".into()))?;
        let client_secret = creds
            .yahoo_client_secret
            .clone()
            .ok_or_else(|| LeagueError::Config("YAHOO_CLIENT_SECRET must be set".into()))?;

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let token = load_token(&creds.yahoo_token_file);

        Ok(Self {
            client,
            client_id,
            client_secret,
            token_file: creds.yahoo_token_file.clone(),
            token: Mutex::new(token),
            league: config.league.clone(),
            game_key: Mutex::new(config.league.game_key.clone()),
        })
    }

    /// Authorization URL the user must visit to grant read access
    pub fn authorization_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            YahooApi::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(YahooApi::REDIRECT_URI),
            urlencoding::encode(YahooApi::SCOPE)
        )
    }

    /// Current game key, fetched from `game/nfl` on first use if not configured
    pub async fn game_key(&self) -> Result<String> {
        if let Some(key) = self.game_key.lock().await.clone() {
            return Ok(key);
        }

        let response = self.get_json("game/nfl").await?;
        let key = parse_game_key(&response)?;
        info!("Retrieved game key: {}", key);
        *self.game_key.lock().await = Some(key.clone());
        Ok(key)
    }

    /// Return a usable access token, refreshing or re-authorizing as needed
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = guard.as_ref() {
            if !token.is_expired(now) {
                return Ok(token.access_token.clone());
            }
        }

        let refreshed = self.renew(guard.as_ref()).await?;
        let access = refreshed.access_token.clone();
        *guard = Some(refreshed);
        Ok(access)
    }

    /// Discard the current access token and obtain a new one
    async fn reauthenticate(&self) -> Result<()> {
        let mut guard = self.token.lock().await;
        let renewed = self.renew(guard.as_ref()).await?;
        *guard = Some(renewed);
        Ok(())
    }

    /// Try the refresh grant first, then the interactive flow
    async fn renew(&self, current: Option<&OAuthToken>) -> Result<OAuthToken> {
        if let Some(refresh_token) = current.and_then(|t| t.refresh_token.clone()) {
            let params = [
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("redirect_uri", YahooApi::REDIRECT_URI),
            ];
            match self.exchange(&params).await {
                Ok(token) => {
                    info!("Refreshed Yahoo access token");
                    return Ok(token);
                }
                Err(e) => warn!("Token refresh failed, re-authorizing: {}", e),
            }
        }

        self.authorize_interactively().await
    }

    async fn authorize_interactively(&self) -> Result<OAuthToken> {
        println!("\n[*] Please authorize at:");
        println!("{}", self.authorization_url());
        println!("\n[?] Enter code: ");

        let mut code = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut code)
            .await?;
        let code = code.trim();
        if code.is_empty() {
            return Err(LeagueError::Authentication(
                "no authorization code entered".into(),
            ));
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", YahooApi::REDIRECT_URI),
        ];
        self.exchange(&params).await
    }

    /// POST to the token endpoint and persist the result
    async fn exchange(&self, params: &[(&str, &str)]) -> Result<OAuthToken> {
        let response = self
            .client
            .post(YahooApi::TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .await
            .map_err(|e| LeagueError::SourceUnavailable(format!("token endpoint: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LeagueError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let grant: TokenResponse = response.json().await?;
        let token = OAuthToken {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: Utc::now().timestamp() + grant.expires_in,
        };

        let serialized = serde_json::to_string_pretty(&token)?;
        if let Err(e) = tokio::fs::write(&self.token_file, serialized).await {
            warn!("Failed to save token to {}: {}", self.token_file.display(), e);
        }

        Ok(token)
    }

    /// GET a resource as JSON, re-authenticating once on 401
    async fn get_json(&self, endpoint: &str) -> Result<Value> {
        let url = YahooApi::resource_url(endpoint);
        let mut reauthenticated = false;

        loop {
            let token = self.access_token().await?;
            debug!("Fetching {}", url);

            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .query(&[("format", "json")])
                .send()
                .await
                .map_err(|e| LeagueError::SourceUnavailable(format!("{}: {}", endpoint, e)))?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                warn!("Yahoo rejected token for {}, re-authenticating", endpoint);
                self.reauthenticate().await?;
                reauthenticated = true;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LeagueError::from_response(status.as_u16(), &body));
            }

            return response
                .json()
                .await
                .map_err(|e| LeagueError::MalformedRecord(format!("{}: {}", endpoint, e)));
        }
    }
}

#[async_trait]
impl LeagueDataSource for YahooClient {
    async fn verify_access(&self) -> Result<()> {
        let response = self
            .get_json("users;use_login=1/games;game_keys=nfl/leagues")
            .await?;

        match response.pointer("/fantasy_content/users") {
            Some(users) if !users.is_null() => Ok(()),
            _ => Err(LeagueError::Authentication(
                "league access verification returned no users".into(),
            )),
        }
    }

    async fn roster(&self) -> Result<Vec<Team>> {
        let game_key = self.game_key().await?;
        let mut teams = Vec::new();

        let league_key = self.league.league_key(&game_key);
        for index in 1..=self.league.num_teams {
            let team_key = format!("{}.t.{}", league_key, index);
            let result = match self.get_json(&format!("team/{}", team_key)).await {
                Ok(response) => parse_team(&response),
                Err(e) => Err(e),
            };

            match result {
                Ok(team) => {
                    info!("Added {}", team.team_name);
                    teams.push(team);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Error processing team {}: {}", team_key, e),
            }
        }

        Ok(teams)
    }

    async fn team_matchup(&self, team_key: &str, week: u32) -> Result<TeamMatchup> {
        let response = self.get_json(&format!("team/{}/matchups", team_key)).await?;
        parse_matchup(&response, team_key, week)
    }

    async fn final_standings(&self, top_n: usize) -> Result<Vec<StandingsEntry>> {
        let game_key = self.game_key().await?;
        let league_key = self.league.league_key(&game_key);
        let response = self
            .get_json(&format!("league/{}/standings", league_key))
            .await?;
        parse_standings(&response, top_n)
    }

    fn name(&self) -> &'static str {
        "Yahoo Fantasy Sports"
    }
}

fn load_token(path: &Path) -> Option<OAuthToken> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<OAuthToken>(&text) {
        Ok(token) => Some(token),
        Err(e) => {
            warn!("Ignoring unreadable token file {}: {}", path.display(), e);
            None
        }
    }
}

fn malformed(what: &str) -> LeagueError {
    LeagueError::MalformedRecord(format!("missing or invalid {}", what))
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    value_to_string(value).and_then(|s| Decimal::from_str(s.trim()).ok())
}

/// Yahoo packs team metadata as an array of single-key objects; find a key in it
fn meta_field<'a>(meta: &'a Value, key: &str) -> Option<&'a Value> {
    meta.as_array()?
        .iter()
        .find_map(|entry| entry.as_object().and_then(|obj| obj.get(key)))
}

fn parse_game_key(response: &Value) -> Result<String> {
    response
        .pointer("/fantasy_content/game/0/game_id")
        .and_then(value_to_string)
        .ok_or_else(|| malformed("game_id"))
}

fn parse_team_meta(meta: &Value) -> Result<Team> {
    let team_key = meta_field(meta, "team_key")
        .and_then(value_to_string)
        .ok_or_else(|| malformed("team_key"))?;
    let team_id = meta_field(meta, "team_id")
        .and_then(value_to_string)
        .unwrap_or_default();
    let team_name = meta_field(meta, "name")
        .and_then(value_to_string)
        .ok_or_else(|| malformed("team name"))?;

    Ok(Team {
        team_key,
        team_id,
        team_name,
    })
}

fn parse_team(response: &Value) -> Result<Team> {
    let meta = response
        .pointer("/fantasy_content/team/0")
        .ok_or_else(|| malformed("team metadata"))?;
    parse_team_meta(meta)
}

fn parse_matchup(response: &Value, team_key: &str, week: u32) -> Result<TeamMatchup> {
    let index = week
        .checked_sub(1)
        .ok_or_else(|| malformed("week number"))?;
    let matchup = response
        .pointer(&format!("/fantasy_content/team/1/matchups/{}/matchup", index))
        .ok_or_else(|| malformed(&format!("matchup for week {}", week)))?;

    let status = matchup
        .get("status")
        .and_then(Value::as_str)
        .map(GameStatus::from_source)
        .ok_or_else(|| malformed("matchup status"))?;

    let reported_week = matchup
        .get("week")
        .and_then(value_to_string)
        .and_then(|w| w.parse::<u32>().ok())
        .unwrap_or(week);

    let teams = matchup
        .pointer("/0/teams")
        .ok_or_else(|| malformed("matchup teams"))?;

    let side = |slot: &str| -> Result<(Team, Decimal)> {
        let team = teams
            .pointer(&format!("/{}/team", slot))
            .ok_or_else(|| malformed(&format!("matchup team {}", slot)))?;
        let meta = team.get(0).ok_or_else(|| malformed("matchup team metadata"))?;
        let points = team
            .pointer("/1/team_points/total")
            .and_then(value_to_decimal)
            .ok_or_else(|| malformed("team_points"))?;
        Ok((parse_team_meta(meta)?, points))
    };

    let first = side("0")?;
    let second = side("1")?;

    // Slot 0 is normally the requesting team, but do not rely on it
    let ((_, team_points), (opponent, opponent_points)) = if first.0.team_key == team_key {
        (first, second)
    } else if second.0.team_key == team_key {
        (second, first)
    } else {
        return Err(LeagueError::MalformedRecord(format!(
            "week {} matchup does not include {}",
            week, team_key
        )));
    };

    Ok(TeamMatchup {
        week: reported_week,
        status,
        team_points,
        opponent_points,
        opponent_key: opponent.team_key,
        opponent_name: opponent.team_name,
    })
}

fn parse_standings(response: &Value, top_n: usize) -> Result<Vec<StandingsEntry>> {
    let teams = response
        .pointer("/fantasy_content/league/1/standings/0/teams")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("standings teams"))?;

    let mut entries = Vec::new();
    for (slot, entry) in teams {
        if slot == "count" {
            continue;
        }

        let parsed = entry
            .get("team")
            .ok_or_else(|| malformed("standings team"))
            .and_then(|team| {
                let meta = team.get(0).ok_or_else(|| malformed("standings metadata"))?;
                let parsed = parse_team_meta(meta)?;
                let rank = team
                    .as_array()
                    .and_then(|parts| {
                        parts
                            .iter()
                            .find_map(|p| p.pointer("/team_standings/rank"))
                    })
                    .and_then(value_to_string)
                    .and_then(|r| r.parse::<u32>().ok())
                    .ok_or_else(|| malformed("standings rank"))?;
                Ok(StandingsEntry {
                    rank,
                    team_key: parsed.team_key,
                    team_name: parsed.team_name,
                })
            });

        match parsed {
            Ok(standing) => entries.push(standing),
            Err(e) => warn!("Error processing standings entry {}: {}", slot, e),
        }
    }

    entries.sort_by_key(|e| e.rank);
    entries.truncate(top_n);
    Ok(entries)
}
