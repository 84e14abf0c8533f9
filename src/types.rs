//! Core types for the league ledger

use crate::error::{LeagueError, Result};
use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Sentinel stored in place of a margin or winner when scores are equal
pub const TIE: &str = "tie";

/// A team on the league roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_key: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub team_id: String,
    pub team_name: String,
}

/// Whether the source considers a matchup finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Final,
    /// Raw status reported by the source, e.g. `midevent`
    Pending(String),
}

impl GameStatus {
    /// Map a Yahoo matchup status string
    pub fn from_source(status: &str) -> Self {
        if status == "postevent" {
            GameStatus::Final
        } else {
            GameStatus::Pending(status.to_string())
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, GameStatus::Final)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Final => write!(f, "final"),
            GameStatus::Pending(raw) => write!(f, "not final ({})", raw),
        }
    }
}

/// One team's view of its matchup for a week, as returned by the data source
#[derive(Debug, Clone, PartialEq)]
pub struct TeamMatchup {
    pub week: u32,
    pub status: GameStatus,
    pub team_points: Decimal,
    pub opponent_points: Decimal,
    pub opponent_key: String,
    pub opponent_name: String,
}

/// A row of the final league standings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsEntry {
    pub rank: u32,
    pub team_key: String,
    pub team_name: String,
}

/// Margin of victory for a matchup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Margin {
    Points(Decimal),
    Tie,
}

impl Margin {
    /// Absolute score difference rounded to 2 decimal places
    pub fn between(a: Decimal, b: Decimal) -> Self {
        if a == b {
            Margin::Tie
        } else {
            Margin::Points(
                (a - b)
                    .abs()
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            )
        }
    }

    pub fn points(&self) -> Option<Decimal> {
        match self {
            Margin::Points(p) => Some(*p),
            Margin::Tie => None,
        }
    }
}

impl fmt::Display for Margin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Margin::Points(p) => write!(f, "{}", p),
            Margin::Tie => write!(f, "{}", TIE),
        }
    }
}

impl From<Margin> for String {
    fn from(margin: Margin) -> Self {
        margin.to_string()
    }
}

impl Serialize for Margin {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Margin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Older documents stored margins as bare numbers
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(Decimal),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(d) => Ok(Margin::Points(d)),
            Repr::Text(s) if s.eq_ignore_ascii_case(TIE) => Ok(Margin::Tie),
            Repr::Text(s) => Decimal::from_str(s.trim())
                .map(Margin::Points)
                .map_err(|e| serde::de::Error::custom(format!("invalid margin {:?}: {}", s, e))),
        }
    }
}

/// Winner of a matchup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Winner {
    Team(String),
    Tie,
}

impl Winner {
    pub fn team(&self) -> Option<&str> {
        match self {
            Winner::Team(name) => Some(name),
            Winner::Tie => None,
        }
    }
}

impl From<String> for Winner {
    fn from(value: String) -> Self {
        if value == TIE {
            Winner::Tie
        } else {
            Winner::Team(value)
        }
    }
}

impl From<Winner> for String {
    fn from(winner: Winner) -> Self {
        match winner {
            Winner::Team(name) => name,
            Winner::Tie => TIE.to_string(),
        }
    }
}

/// Canonical record of one matchup in one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupRecord {
    pub team_key: String,
    pub team_name: String,
    #[serde(deserialize_with = "de_week")]
    pub week: u32,
    pub team_points: Decimal,
    pub opponent_points: Decimal,
    pub opponent_name: String,
    #[serde(default)]
    pub opponent_team_key: String,
    pub margin_victory: Margin,
    pub winning_team: Winner,
}

impl MatchupRecord {
    /// Build the record from one team's perspective of its matchup
    pub fn from_matchup(team: &Team, matchup: &TeamMatchup) -> Self {
        let margin = Margin::between(matchup.team_points, matchup.opponent_points);
        let winner = if matchup.team_points > matchup.opponent_points {
            Winner::Team(team.team_name.clone())
        } else if matchup.opponent_points > matchup.team_points {
            Winner::Team(matchup.opponent_name.clone())
        } else {
            Winner::Tie
        };

        Self {
            team_key: team.team_key.clone(),
            team_name: team.team_name.clone(),
            week: matchup.week,
            team_points: matchup.team_points,
            opponent_points: matchup.opponent_points,
            opponent_name: matchup.opponent_name.clone(),
            opponent_team_key: matchup.opponent_key.clone(),
            margin_victory: margin,
            winning_team: winner,
        }
    }

    /// Whether either side of this record is the given team key
    pub fn involves_key(&self, team_key: &str) -> bool {
        self.team_key == team_key
            || (!self.opponent_team_key.is_empty() && self.opponent_team_key == team_key)
    }

    /// Whether either side of this record is the given team name
    pub fn involves_name(&self, team_name: &str) -> bool {
        self.team_name == team_name || self.opponent_name == team_name
    }

    /// Both sides as (key, name, points)
    pub fn sides(&self) -> [(&str, &str, Decimal); 2] {
        [
            (&self.team_key, &self.team_name, self.team_points),
            (
                &self.opponent_team_key,
                &self.opponent_name,
                self.opponent_points,
            ),
        ]
    }

    /// Winning team name and margin, when the matchup was not a tie
    pub fn decisive_margin(&self) -> Option<(&str, Decimal)> {
        match (&self.winning_team, self.margin_victory) {
            (Winner::Team(name), Margin::Points(margin)) => Some((name.as_str(), margin)),
            _ => None,
        }
    }
}

/// A weekly skins pot award
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinsWin {
    pub week: u32,
    pub team: String,
    pub margin: Decimal,
    pub pot: Decimal,
}

/// A team removed from the survivor pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivorElimination {
    pub week: u32,
    pub team_key: String,
    pub team_name: String,
    pub score: Decimal,
}

/// Persisted survivor pool state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SurvivorResult {
    #[serde(default)]
    pub eliminations: Vec<SurvivorElimination>,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub winner_key: Option<String>,
    #[serde(default)]
    pub bonus: Decimal,
}

impl SurvivorResult {
    pub fn is_complete(&self) -> bool {
        self.winner.is_some()
    }

    pub fn eliminated_week(&self, week: u32) -> bool {
        self.eliminations.iter().any(|e| e.week == week)
    }

    pub fn is_eliminated(&self, team_key: &str) -> bool {
        self.eliminations.iter().any(|e| e.team_key == team_key)
    }
}

/// Which weeks a command should process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekSelector {
    Week(u32),
    All,
}

impl WeekSelector {
    /// Expand to concrete week numbers, validating against the season length
    pub fn weeks(&self, season_weeks: u32) -> Result<Vec<u32>> {
        match *self {
            WeekSelector::All => Ok((1..=season_weeks).collect()),
            WeekSelector::Week(w) if (1..=season_weeks).contains(&w) => Ok(vec![w]),
            WeekSelector::Week(w) => Err(LeagueError::Config(format!(
                "Weeks should be 1 - {} only, got {}",
                season_weeks, w
            ))),
        }
    }
}

impl FromStr for WeekSelector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") || s.eq_ignore_ascii_case("a") {
            return Ok(WeekSelector::All);
        }
        s.parse::<u32>()
            .map(WeekSelector::Week)
            .map_err(|_| format!("expected a week number or 'all', got {:?}", s))
    }
}

impl fmt::Display for WeekSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekSelector::Week(w) => write!(f, "{}", w),
            WeekSelector::All => write!(f, "all"),
        }
    }
}

pub(crate) fn de_week<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u32),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(n) => Ok(n),
        Repr::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid week {:?}", s))),
    }
}

fn de_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(s) => s,
        Repr::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn team(key: &str, name: &str) -> Team {
        Team {
            team_key: key.into(),
            team_id: "1".into(),
            team_name: name.into(),
        }
    }

    fn matchup(team_points: Decimal, opponent_points: Decimal) -> TeamMatchup {
        TeamMatchup {
            week: 3,
            status: GameStatus::Final,
            team_points,
            opponent_points,
            opponent_key: "b".into(),
            opponent_name: "Bravo".into(),
        }
    }

    #[test]
    fn test_record_picks_higher_scorer() {
        let record = MatchupRecord::from_matchup(&team("a", "Alpha"), &matchup(dec!(80.5), dec!(101.25)));
        assert_eq!(record.winning_team, Winner::Team("Bravo".into()));
        assert_eq!(record.margin_victory, Margin::Points(dec!(20.75)));
        assert_eq!(record.decisive_margin(), Some(("Bravo", dec!(20.75))));
    }

    #[test]
    fn test_record_tie() {
        let record = MatchupRecord::from_matchup(&team("a", "Alpha"), &matchup(dec!(90), dec!(90)));
        assert_eq!(record.winning_team, Winner::Tie);
        assert_eq!(record.margin_victory, Margin::Tie);
        assert!(record.decisive_margin().is_none());
    }

    #[test]
    fn test_margin_rounds_to_two_places() {
        assert_eq!(Margin::between(dec!(100.125), dec!(80)), Margin::Points(dec!(20.13)));
    }

    #[test]
    fn test_record_json_shape() {
        let record = MatchupRecord::from_matchup(&team("a", "Alpha"), &matchup(dec!(90), dec!(90)));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["margin_victory"], "tie");
        assert_eq!(value["winning_team"], "tie");
        assert_eq!(value["team_points"], "90");
        assert_eq!(value["opponent_team_key"], "b");
    }

    #[test]
    fn test_reads_legacy_record() {
        let legacy = serde_json::json!({
            "team_key": "449.l.1.t.1",
            "team_name": "Alpha",
            "week": "2",
            "team_points": "101.3",
            "opponent_points": "88.1",
            "opponent_name": "Bravo",
            "margin_victory": 13.2,
            "winning_team": "Alpha"
        });
        let record: MatchupRecord = serde_json::from_value(legacy).unwrap();
        assert_eq!(record.week, 2);
        assert_eq!(record.margin_victory, Margin::Points(dec!(13.2)));
        assert_eq!(record.opponent_team_key, "");
        assert!(!record.involves_key(""));
    }

    #[test]
    fn test_week_selector_parsing() {
        assert_eq!("all".parse::<WeekSelector>(), Ok(WeekSelector::All));
        assert_eq!("7".parse::<WeekSelector>(), Ok(WeekSelector::Week(7)));
        assert!("seven".parse::<WeekSelector>().is_err());
        assert!(WeekSelector::Week(18).weeks(17).is_err());
        assert_eq!(WeekSelector::All.weeks(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_game_status_from_source() {
        assert!(GameStatus::from_source("postevent").is_final());
        assert_eq!(
            GameStatus::from_source("midevent"),
            GameStatus::Pending("midevent".into())
        );
    }
}
