//! League accounting
//!
//! Turns standings and bonus results into per-team winnings, reconciles them
//! against the buy-in, and tracks dues actually collected.

use crate::bonus::{BonusEngine, BonusRunner, HighPointsWinner, SkinsEntry};
use crate::config::{Config, FinancialConfig};
use crate::error::{LeagueError, Result};
use crate::season::SeasonMatchups;
use crate::source::LeagueDataSource;
use crate::store::{documents, load_doc, save_doc, ResultStore};
use crate::types::{SkinsWin, SurvivorResult, Team};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Team name to amount won
pub type WinningsLedger = BTreeMap<String, Decimal>;

/// Whether a team is owed money or owes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceStatus {
    DueToReceive,
    NeedsToPay,
}

impl fmt::Display for BalanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceStatus::DueToReceive => write!(f, "DUE TO RECEIVE"),
            BalanceStatus::NeedsToPay => write!(f, "NEEDS TO PAY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRow {
    pub team: String,
    pub dues: Decimal,
    pub winnings: Decimal,
    pub balance: Decimal,
    pub status: BalanceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSheet {
    pub rows: Vec<BalanceRow>,
    pub total_dues: Decimal,
    pub total_winnings: Decimal,
}

impl BalanceSheet {
    /// One row per team, in name order
    pub fn build<'a>(
        teams: impl IntoIterator<Item = &'a String>,
        winnings: &WinningsLedger,
        buy_in: Decimal,
    ) -> Self {
        let mut teams: Vec<&String> = teams.into_iter().collect();
        teams.sort();
        teams.dedup();

        let rows: Vec<BalanceRow> = teams
            .into_iter()
            .map(|team| {
                let won = winnings.get(team).copied().unwrap_or_default();
                let balance = won - buy_in;
                BalanceRow {
                    team: team.clone(),
                    dues: buy_in,
                    winnings: won,
                    balance,
                    status: if balance > Decimal::ZERO {
                        BalanceStatus::DueToReceive
                    } else {
                        BalanceStatus::NeedsToPay
                    },
                }
            })
            .collect();

        let total_dues = rows.iter().map(|r| r.dues).sum();
        let total_winnings = rows.iter().map(|r| r.winnings).sum();

        Self {
            rows,
            total_dues,
            total_winnings,
        }
    }

    pub fn net(&self) -> Decimal {
        self.total_winnings - self.total_dues
    }
}

/// A team's skins haul
#[derive(Debug, Clone, PartialEq)]
pub struct SkinsStanding {
    pub team: String,
    pub amount: Decimal,
    pub weeks_won: usize,
}

/// Everything the season-end report shows
#[derive(Debug, Clone)]
pub struct FinancialReport {
    /// Largest amount first
    pub skins: Vec<SkinsStanding>,
    pub survivor: Option<(String, Decimal)>,
    pub high_points: Option<HighPointsWinner>,
    pub winnings: WinningsLedger,
}

impl FinancialReport {
    pub fn total_payouts(&self) -> Decimal {
        self.winnings.values().copied().sum()
    }
}

pub struct LeagueAccounting {
    store: Arc<dyn ResultStore>,
    source: Option<Arc<dyn LeagueDataSource>>,
    financial: FinancialConfig,
    bonuses: BonusRunner,
}

impl LeagueAccounting {
    pub fn new(
        config: &Config,
        store: Arc<dyn ResultStore>,
        source: Option<Arc<dyn LeagueDataSource>>,
    ) -> Self {
        Self {
            store,
            source,
            financial: config.financial.clone(),
            bonuses: BonusRunner::new(config),
        }
    }

    pub fn financial(&self) -> &FinancialConfig {
        &self.financial
    }

    /// Payouts for the top three final standings
    pub async fn playoff_winnings(&self) -> Result<WinningsLedger> {
        let mut winnings = WinningsLedger::new();
        let Some(source) = &self.source else {
            debug!("No league source attached, skipping playoff payouts");
            return Ok(winnings);
        };

        let standings = match source.final_standings(3).await {
            Ok(standings) => standings,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Could not fetch final standings: {}", e);
                return Ok(winnings);
            }
        };

        for entry in standings {
            match self.financial.playoff_payout(entry.rank) {
                Some(payout) => {
                    *winnings.entry(entry.team_name).or_default() += payout;
                }
                None => warn!(
                    "Ignoring standings entry for {} with unpaid rank {}",
                    entry.team_name, entry.rank
                ),
            }
        }

        Ok(winnings)
    }

    /// Stored skins wins in week order, computing them first if none are stored
    pub async fn skins_wins(&self) -> Result<Vec<SkinsWin>> {
        let Some(engine) = &self.bonuses.skins else {
            debug!("Skins game disabled");
            return Ok(Vec::new());
        };

        let mut wins = match self.store.load(documents::SKINS).await? {
            None => {
                info!("{} not found, running {}", documents::SKINS, engine.name());
                engine.run(self.store.as_ref()).await?.wins
            }
            Some(Value::Object(map)) => parse_skins(map),
            Some(_) => {
                warn!("{} is not a team map, ignoring it", documents::SKINS);
                Vec::new()
            }
        };

        wins.sort_by_key(|w| w.week);
        Ok(wins)
    }

    /// Total skins winnings per team
    pub async fn skins_winnings(&self) -> Result<WinningsLedger> {
        let mut totals = WinningsLedger::new();
        for win in self.skins_wins().await? {
            *totals.entry(win.team).or_default() += win.pot;
        }
        Ok(totals)
    }

    /// Stored survivor winner, running the pool when no winner is stored
    pub async fn survivor_winner(&self) -> Result<Option<String>> {
        let Some(engine) = &self.bonuses.survivor else {
            debug!("Survivor pool disabled");
            return Ok(None);
        };

        match load_doc::<SurvivorResult>(self.store.as_ref(), documents::SURVIVOR).await {
            Ok(Some(result)) if result.winner.is_some() => return Ok(result.winner),
            Ok(_) => {}
            Err(e) if e.is_skippable() => warn!("Ignoring unreadable survivor results: {}", e),
            Err(e) => return Err(e),
        }

        let roster = match load_doc::<Vec<Team>>(self.store.as_ref(), documents::TEAMS).await {
            Ok(Some(teams)) => teams,
            Ok(None) => {
                warn!("No teams info found, survivor pool cannot run");
                return Ok(None);
            }
            Err(e) if e.is_skippable() => {
                warn!("Unreadable teams info, survivor pool cannot run: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(engine.run(self.store.as_ref(), &roster).await?.winner)
    }

    pub async fn highest_points_winner(&self) -> Result<Option<HighPointsWinner>> {
        self.bonuses.high_points.run(self.store.as_ref()).await
    }

    /// Every payout owed, summed per team
    pub async fn calculate_all_winnings(&self) -> Result<WinningsLedger> {
        Ok(self.financial_report().await?.winnings)
    }

    /// Dues against winnings for every team in the regular season
    pub async fn balance_sheet(&self) -> Result<BalanceSheet> {
        let winnings = self.calculate_all_winnings().await?;
        let weeks = self.bonuses.high_points.weeks();
        let season = SeasonMatchups::load(self.store.as_ref(), weeks.clone()).await?;
        let teams = season.team_names(weeks);

        Ok(BalanceSheet::build(&teams, &winnings, self.financial.buy_in))
    }

    pub async fn financial_report(&self) -> Result<FinancialReport> {
        let mut winnings = self.playoff_winnings().await?;

        let skins_totals = self.skins_winnings().await?;
        let wins = self.skins_wins().await?;
        let mut skins: Vec<SkinsStanding> = skins_totals
            .iter()
            .map(|(team, amount)| SkinsStanding {
                team: team.clone(),
                amount: *amount,
                weeks_won: wins.iter().filter(|w| &w.team == team).count(),
            })
            .collect();
        skins.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.team.cmp(&b.team)));
        for (team, amount) in skins_totals {
            *winnings.entry(team).or_default() += amount;
        }

        let survivor = self
            .survivor_winner()
            .await?
            .map(|team| (team, self.financial.survivor_bonus));
        if let Some((team, bonus)) = &survivor {
            *winnings.entry(team.clone()).or_default() += *bonus;
        }

        let high_points = self.highest_points_winner().await?;
        if let Some(winner) = &high_points {
            *winnings.entry(winner.team.clone()).or_default() += winner.bonus;
        }

        Ok(FinancialReport {
            skins,
            survivor,
            high_points,
            winnings,
        })
    }

    /// Recorded payments: team name to cumulative amount paid
    pub async fn payments(&self) -> Result<BTreeMap<String, Decimal>> {
        let mut payments = BTreeMap::new();
        let map = match self.store.load(documents::PAYMENTS).await? {
            None => return Ok(payments),
            Some(Value::Object(map)) => map,
            Some(_) => {
                warn!("{} is not a team map, ignoring it", documents::PAYMENTS);
                return Ok(payments);
            }
        };

        for (team, value) in map {
            let amount = match &value {
                Value::String(s) => Decimal::from_str(s.trim()).ok(),
                Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                _ => None,
            };
            match amount {
                Some(amount) => {
                    payments.insert(team, amount);
                }
                None => warn!("Skipping unreadable payment for {}: {}", team, value),
            }
        }

        Ok(payments)
    }

    /// Set a team's cumulative amount paid; returns the new total collected
    pub async fn record_payment(&self, team: &str, amount: Decimal) -> Result<Decimal> {
        if team.trim().is_empty() {
            return Err(LeagueError::MalformedRecord("payment needs a team name".into()));
        }
        if amount < Decimal::ZERO {
            return Err(LeagueError::MalformedRecord(format!(
                "payment for {} must not be negative: {}",
                team, amount
            )));
        }

        let mut payments = self.payments().await?;
        payments.insert(team.to_string(), amount);

        let stored: BTreeMap<&String, String> =
            payments.iter().map(|(k, v)| (k, v.to_string())).collect();
        save_doc(self.store.as_ref(), documents::PAYMENTS, &stored).await?;
        info!("Recorded payment of ${} for {}", amount, team);

        Ok(payments.values().copied().sum())
    }

    pub async fn total_collected(&self) -> Result<Decimal> {
        Ok(self.payments().await?.values().copied().sum())
    }
}

fn parse_skins(map: serde_json::Map<String, Value>) -> Vec<SkinsWin> {
    let mut wins = Vec::new();

    for (team, entries) in map {
        let Value::Array(entries) = entries else {
            warn!("Skipping malformed skins entry for {}", team);
            continue;
        };

        for entry in entries {
            match serde_json::from_value::<SkinsEntry>(entry) {
                Ok(entry) => wins.push(SkinsWin {
                    week: entry.week_number,
                    team: team.clone(),
                    margin: entry.margin_victory,
                    pot: entry.pot_winnings,
                }),
                Err(e) => warn!("Skipping malformed skins win for {}: {}", team, e),
            }
        }
    }

    wins
}
