//! Plain-text reports for the terminal

use crate::accounting::{BalanceSheet, BalanceStatus, FinancialReport};
use crate::bonus::SkinsOutcome;
use crate::ingest::WeekIngestion;
use crate::types::{MatchupRecord, SkinsWin, SurvivorResult, Team, Winner};
use colored::Colorize;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

const WIDE: usize = 80;
const NARROW: usize = 60;

/// Banner lines; the leading empty line separates reports
fn header(title: &str, width: usize) -> Vec<String> {
    vec![String::new(), "=".repeat(width), title.to_string(), "=".repeat(width)]
}

/// One line per matchup, winners in green and ties in red
pub fn matchup_line(record: &MatchupRecord) -> String {
    let result = match &record.winning_team {
        Winner::Team(name) => format!("{} by {}", name.green().bold(), record.margin_victory),
        Winner::Tie => "tie".red().bold().to_string(),
    };
    format!(
        "  {} ({:.2}) vs {} ({:.2}) -> {}",
        record.team_name, record.team_points, record.opponent_name, record.opponent_points, result
    )
}

pub fn week_summary(week: u32, outcome: &WeekIngestion) -> String {
    match outcome {
        WeekIngestion::Final(records) => {
            let mut lines = vec![format!("Week {}: {} matchups", week, records.len())];
            lines.extend(records.iter().map(matchup_line));
            lines.join("\n")
        }
        WeekIngestion::NotFinal => format!("Week {}: {}", week, "not final yet".yellow()),
        WeekIngestion::Empty => format!("Week {}: no matchups found", week),
    }
}

pub fn roster(teams: &[Team]) -> String {
    let mut lines = header("LEAGUE ROSTER", NARROW);
    lines.push(format!("{:<20} {:<8} {}", "Key", "Id", "Team"));
    lines.push("-".repeat(NARROW));
    for team in teams {
        lines.push(format!("{:<20} {:<8} {}", team.team_key, team.team_id, team.team_name));
    }
    lines.join("\n")
}

/// Chronological wins followed by totals, largest first
pub fn skins_breakdown(wins: &[SkinsWin]) -> String {
    let mut lines = vec![String::new(), "SKINS BREAKDOWN:".to_string(), "-".repeat(20)];

    if wins.is_empty() {
        lines.push("No skins winners recorded".to_string());
        return lines.join("\n");
    }

    for win in wins {
        lines.push(format!(
            "Week {}: {} (margin: {:.2}, pot: ${:.2})",
            win.week, win.team, win.margin, win.pot
        ));
    }

    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for win in wins {
        *totals.entry(win.team.as_str()).or_default() += win.pot;
    }
    let mut totals: Vec<_> = totals.into_iter().collect();
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    lines.push(String::new());
    lines.push("TOTAL SKINS WINNINGS:".to_string());
    for (team, total) in totals {
        lines.push(format!("{}: ${:.2}", team, total));
    }
    lines.join("\n")
}

pub fn skins_outcome(outcome: &SkinsOutcome) -> String {
    format!(
        "{}\n\nPot carried into next week: ${:.2}",
        skins_breakdown(&outcome.wins),
        outcome.carryover
    )
}

pub fn survivor(result: &SurvivorResult) -> String {
    let mut lines = vec![
        String::new(),
        format!("{} Survivor Results {}", "*".repeat(40), "*".repeat(40)),
    ];
    for elimination in &result.eliminations {
        lines.push(format!(
            "Week {} eliminated: {} with {:.2} points",
            elimination.week, elimination.team_name, elimination.score
        ));
    }
    lines.push(match &result.winner {
        Some(winner) => format!(
            "Survivor bonus winner: {} (${:.2})",
            winner.green().bold(),
            result.bonus
        ),
        None => "Survivor pool still running".to_string(),
    });
    lines.join("\n")
}

pub fn financial_report(report: &FinancialReport) -> String {
    let mut lines = header("LEAGUE FINANCIAL REPORT", NARROW);
    lines.extend([String::new(), "REGULAR SEASON BONUSES:".to_string(), "-".repeat(20)]);

    if !report.skins.is_empty() {
        lines.extend([String::new(), "Skins Winners:".to_string()]);
        for standing in &report.skins {
            let unit = if standing.weeks_won == 1 { "week" } else { "weeks" };
            lines.push(format!(
                "  {}: ${:.2} ({} {})",
                standing.team, standing.amount, standing.weeks_won, unit
            ));
        }
    }

    if let Some((team, bonus)) = &report.survivor {
        lines.push(String::new());
        lines.push(format!("Survivor Bonus Winner: {} (${:.2})", team, bonus));
    }

    if let Some(winner) = &report.high_points {
        lines.push(String::new());
        lines.push(format!(
            "Highest Points Winner: {} - {:.2} points (${:.2})",
            winner.team, winner.points, winner.bonus
        ));
    }

    lines.extend([String::new(), "FINAL WINNINGS:".to_string(), "-".repeat(20)]);
    let mut winnings: Vec<_> = report.winnings.iter().collect();
    winnings.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (team, amount) in winnings {
        lines.push(format!("{:<25} ${:>10.2}", team, amount));
    }
    lines.push(String::new());
    lines.push(format!("Total Payouts: ${:.2}", report.total_payouts()));
    lines.join("\n")
}

pub fn balance_sheet(sheet: &BalanceSheet) -> String {
    let mut lines = header("LEAGUE BALANCE SHEET", WIDE);
    lines.push(String::new());
    lines.push(format!(
        "{:<25} {:>12} {:>12} {:>12} {:>15}",
        "Team", "Dues", "Winnings", "Balance", "Status"
    ));
    lines.push("-".repeat(WIDE));

    for row in &sheet.rows {
        let status = format!("{:>15}", row.status.to_string());
        let status = match row.status {
            BalanceStatus::DueToReceive => status.green(),
            BalanceStatus::NeedsToPay => status.red(),
        };
        lines.push(format!(
            "{:<25} {:>12.2} {:>12.2} {:>12.2} {}",
            row.team, row.dues, row.winnings, row.balance, status
        ));
    }

    lines.push("-".repeat(WIDE));
    lines.push(format!(
        "{:<25} {:>12.2} {:>12.2} {:>12.2}",
        "TOTALS",
        sheet.total_dues,
        sheet.total_winnings,
        sheet.net()
    ));

    lines.push(String::new());
    lines.push("SUMMARY:".to_string());
    lines.push(format!("Total League Dues: ${:.2}", sheet.total_dues));
    lines.push(format!("Total Payouts: ${:.2}", sheet.total_winnings));
    lines.push(format!("Net Balance: ${:.2}", sheet.net()));
    lines.join("\n")
}

pub fn payments(payments: &BTreeMap<String, Decimal>, total: Decimal, buy_in: Decimal) -> String {
    let mut lines = header("PAYMENT STATUS", NARROW);
    if payments.is_empty() {
        lines.push("No payments recorded".to_string());
    }
    for (team, paid) in payments {
        let outstanding = (buy_in - *paid).max(Decimal::ZERO);
        lines.push(format!(
            "{:<25} {:>12.2} (outstanding: ${:.2})",
            team, paid, outstanding
        ));
    }
    lines.push("-".repeat(NARROW));
    lines.push(format!("{:<25} {:>12.2}", "TOTAL COLLECTED", total));
    lines.join("\n")
}
