//! Fantasy Football League Ledger CLI
//!
//! Ingests weekly results, runs the season bonuses, and settles league money.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ffb_ledger::bonus::BonusRunner;
use ffb_ledger::store::{documents, export_season, load_doc};
use ffb_ledger::types::Team;
use ffb_ledger::{
    open_store, report, Config, LeagueAccounting, LeagueDataSource, MatchupIngestor, ResultStore,
    WeekSelector, YahooClient,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "ffb-ledger")]
#[command(about = "Fantasy football league ledger: results, side games, and dues")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the league config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest weeks, run enabled side games, and export the season
    Run {
        /// Week number (1-17) or "all"
        #[arg(short, long)]
        week: WeekSelector,
    },

    /// Ingest weekly matchups only
    Ingest {
        /// Week number (1-17) or "all"
        #[arg(short, long)]
        week: WeekSelector,
    },

    /// Show the stored roster
    Roster {
        /// Fetch the roster from Yahoo again
        #[arg(long)]
        refresh: bool,
    },

    /// Run the skins game over stored weeks
    Skins,

    /// Run the survivor pool over stored weeks
    Survivor,

    /// Financial report, skins breakdown, and balance sheet
    Report,

    /// Record a team's cumulative payment
    Pay {
        /// Team name as shown in the roster
        team: String,

        /// Total amount the team has paid so far
        amount: Decimal,
    },

    /// Show recorded payments
    Payments,

    /// Write the season export document
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::load(&cli.config)?;
    let store = open_store(&config)
        .await
        .context("Failed to open league data store")?;

    match cli.command {
        Commands::Run { week } => run_week(&config, store, week).await?,
        Commands::Ingest { week } => ingest(&config, store, week).await.map(|_| ())?,
        Commands::Roster { refresh } => show_roster(&config, store, refresh).await?,
        Commands::Skins => run_skins(&config, store).await?,
        Commands::Survivor => run_survivor(&config, store).await?,
        Commands::Report => show_report(&config, store).await?,
        Commands::Pay { team, amount } => record_payment(&config, store, &team, amount).await?,
        Commands::Payments => show_payments(&config, store).await?,
        Commands::Export => {
            let name = export_season(store.as_ref(), &config).await?;
            println!("Season data exported to {}", name);
        }
    }

    Ok(())
}

/// Yahoo client with verified league access
async fn connect(config: &Config) -> Result<Arc<dyn LeagueDataSource>> {
    let client = YahooClient::from_config(config)?;
    client
        .verify_access()
        .await
        .context("Could not verify Yahoo league access")?;
    info!("Connected to {}", client.name());
    Ok(Arc::new(client))
}

async fn ingest(
    config: &Config,
    store: Arc<dyn ResultStore>,
    week: WeekSelector,
) -> Result<Vec<Team>> {
    println!("\n{}", "=".repeat(70));
    println!("  MATCHUP INGESTION - Week {}", week);
    println!("  Storage: {}", store.describe());
    println!("{}\n", "=".repeat(70));

    let source = connect(config).await?;
    let ingestor = MatchupIngestor::new(source, store, config.game.season_weeks);

    let outcomes = ingestor.ingest(week).await?;
    for (week, outcome) in &outcomes {
        println!("{}\n", report::week_summary(*week, outcome));
    }

    Ok(ingestor.ensure_roster().await?)
}

async fn run_week(config: &Config, store: Arc<dyn ResultStore>, week: WeekSelector) -> Result<()> {
    let roster = ingest(config, store.clone(), week).await?;

    let runner = BonusRunner::new(config);
    let results = runner.run_all(store.as_ref(), &roster).await?;

    if let Some(skins) = &results.skins {
        println!("{}", report::skins_outcome(skins));
    }
    if let Some(survivor) = &results.survivor {
        println!("{}", report::survivor(survivor));
    }
    if let Some(winner) = &results.high_points {
        println!(
            "\nPoints leader: {} with {:.2} points",
            winner.team, winner.points
        );
    }

    let name = export_season(store.as_ref(), config).await?;
    println!("\nSeason data exported to {}", name);
    Ok(())
}

async fn show_roster(config: &Config, store: Arc<dyn ResultStore>, refresh: bool) -> Result<()> {
    let teams = if refresh {
        let source = connect(config).await?;
        MatchupIngestor::new(source, store, config.game.season_weeks)
            .refresh_roster()
            .await?
    } else {
        match load_doc::<Vec<Team>>(store.as_ref(), documents::TEAMS).await? {
            Some(teams) => teams,
            None => {
                println!("No roster stored yet. Run with --refresh to fetch it.");
                return Ok(());
            }
        }
    };

    println!("{}", report::roster(&teams));
    Ok(())
}

async fn run_skins(config: &Config, store: Arc<dyn ResultStore>) -> Result<()> {
    let Some(engine) = BonusRunner::new(config).skins else {
        println!("Skins game is disabled in the config");
        return Ok(());
    };

    let outcome = engine.run(store.as_ref()).await?;
    println!("{}", report::skins_outcome(&outcome));
    Ok(())
}

async fn run_survivor(config: &Config, store: Arc<dyn ResultStore>) -> Result<()> {
    let Some(engine) = BonusRunner::new(config).survivor else {
        println!("Survivor pool is disabled in the config");
        return Ok(());
    };

    let roster = load_doc::<Vec<Team>>(store.as_ref(), documents::TEAMS)
        .await?
        .context("No roster stored yet; run `ingest` or `roster --refresh` first")?;

    let result = engine.run(store.as_ref(), &roster).await?;
    println!("{}", report::survivor(&result));
    Ok(())
}

async fn show_report(config: &Config, store: Arc<dyn ResultStore>) -> Result<()> {
    // Standings are optional; bonuses still report without Yahoo access
    let source = match connect(config).await {
        Ok(source) => Some(source),
        Err(e) => {
            warn!("Playoff payouts unavailable: {:#}", e);
            None
        }
    };

    let accounting = LeagueAccounting::new(config, store, source);

    let financial = accounting.financial_report().await?;
    println!("{}", report::financial_report(&financial));

    let wins = accounting.skins_wins().await?;
    println!("{}", report::skins_breakdown(&wins));

    let sheet = accounting.balance_sheet().await?;
    println!("{}", report::balance_sheet(&sheet));
    Ok(())
}

async fn record_payment(
    config: &Config,
    store: Arc<dyn ResultStore>,
    team: &str,
    amount: Decimal,
) -> Result<()> {
    let accounting = LeagueAccounting::new(config, store, None);
    let total = accounting.record_payment(team, amount).await?;

    println!("Recorded ${:.2} paid by {}", amount, team);
    println!("Total collected: ${:.2}", total);
    Ok(())
}

async fn show_payments(config: &Config, store: Arc<dyn ResultStore>) -> Result<()> {
    let accounting = LeagueAccounting::new(config, store, None);
    let payments = accounting.payments().await?;
    let total = accounting.total_collected().await?;

    println!(
        "{}",
        report::payments(&payments, total, accounting.financial().buy_in)
    );
    Ok(())
}
