use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use schemaheal_catalog::{redact_url, CatalogAdapter, MockAdapter, PostgresAdapter};
use schemaheal_core::{Config, CycleReport, Issue, IssueStatus, RiskClass};
use schemaheal_engine::{HealthMonitor, IssueStore, IssueView, JsonFileStore};

const CONFIG_FILE: &str = "schemaheal.toml";

/// SchemaHeal - keeps a database schema in line with the code that uses it
#[derive(Parser)]
#[command(name = "schemaheal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: schemaheal.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run one healing cycle and print the issues found
    Scan {
        /// Output file for the cycle report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Apply safe fixes during this cycle
        #[arg(long)]
        apply: bool,

        /// Run against an empty in-memory catalog instead of the database
        #[arg(long)]
        mock: bool,
    },

    /// Run the monitor loop with the HTTP control surface
    Serve {
        /// Address to bind (overrides [server].bind)
        #[arg(short, long)]
        bind: Option<String>,

        /// Run against an empty in-memory catalog instead of the database
        #[arg(long)]
        mock: bool,
    },

    /// Print the persisted issues
    Issues {
        /// Include resolved, applied and rejected issues
        #[arg(short, long)]
        all: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    if let Commands::Init { force } = cli.command {
        return init_command(&config_path, force);
    }

    let config = if config_path.exists() {
        Config::from_file(&config_path).with_context(|| format!("failed to load {}", config_path.display()))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if cli.verbose {
        eprintln!("{} {}", "Source root:".cyan(), config.source_path().display());
        eprintln!("{} {}", "State directory:".cyan(), config.state_path().display());
    }

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Scan { output, apply, mock } => scan_command(&config, &output, apply, mock, cli.verbose).await,
        Commands::Serve { bind, mock } => serve_command(&config, bind, mock).await,
        Commands::Issues { all, json } => issues_command(&config, all, json),
    }
}

fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default()
        .save_to_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("{} {}", "✓ Wrote".green(), path.display());
    Ok(())
}

async fn scan_command(config: &Config, output: &Path, apply: bool, mock: bool, verbose: bool) -> Result<()> {
    let monitor = build_monitor(config, mock).await?;
    if apply {
        monitor.set_auto_apply(true);
    }

    if verbose {
        eprintln!("{}", "Running healing cycle...".cyan());
    }

    let report = monitor.run_cycle().await.context("healing cycle failed")?;
    report
        .save_to_file(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), output.display());
    }

    print_cycle_summary(&report, &monitor.issues(false));

    if !report.is_healthy() {
        std::process::exit(1);
    }

    Ok(())
}

async fn serve_command(config: &Config, bind: Option<String>, mock: bool) -> Result<()> {
    let monitor = build_monitor(config, mock).await?;
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());

    let runner = monitor.clone();
    let loop_handle = tokio::spawn(async move { runner.run().await });

    let signals = monitor.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
        }
        signals.shutdown();
    });

    eprintln!("{} http://{}", "Control surface on".green(), addr);
    let served = schemaheal_server::serve(monitor.clone(), &addr).await;

    monitor.shutdown();
    loop_handle.await.context("monitor loop panicked")?;
    served.context("control surface failed")?;
    Ok(())
}

fn issues_command(config: &Config, all: bool, json: bool) -> Result<()> {
    let store = JsonFileStore::open(config.state_path())?;
    let issues: Vec<Issue> = store
        .load_issues()?
        .into_iter()
        .filter(|issue| all || issue.is_open())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
        return Ok(());
    }

    if issues.is_empty() {
        println!("{}", "✓ No issues recorded".green());
        return Ok(());
    }

    println!("{} {}", "Issues:".bold(), issues.len());
    println!();
    for issue in &issues {
        print_issue(issue, None);
    }
    Ok(())
}

async fn build_monitor(config: &Config, mock: bool) -> Result<HealthMonitor> {
    let adapter: Arc<dyn CatalogAdapter> = if mock {
        tracing::info!("using in-memory catalog");
        Arc::new(MockAdapter::new().with_default_schema(config.database.schema.clone()))
    } else {
        if let Some(url) = config.database.resolve_url() {
            tracing::info!(url = %redact_url(&url), "connecting to database");
        }
        Arc::new(
            PostgresAdapter::connect(&config.database)
                .await
                .context("failed to connect to database")?,
        )
    };

    let store: Arc<dyn IssueStore> = Arc::new(JsonFileStore::open(config.state_path())?);
    Ok(HealthMonitor::new(config, adapter, store)?)
}

fn print_cycle_summary(report: &CycleReport, issues: &[IssueView]) {
    let summary = &report.summary;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "SchemaHeal Cycle Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    println!("{} {}", "Cycle:".bold(), report.cycle_id);
    println!(
        "{} {} files, {} statements",
        "Scanned:".bold(),
        summary.files_scanned,
        summary.statements
    );
    if summary.scan_errors > 0 {
        println!("{} {}", "Scan errors:".bold(), summary.scan_errors.to_string().yellow());
    }
    println!();

    if issues.is_empty() {
        println!("{}", "✓ Schema matches code usage".green());
    } else {
        println!(
            "{} {} ({} additive, {} destructive)",
            "Open issues:".bold(),
            summary.total.to_string().red(),
            summary.additive,
            summary.destructive
        );
        println!();
        for view in issues {
            print_issue(&view.issue, view.suggested_fix_preview.as_deref());
        }
    }

    if !report.conflicts.is_empty() {
        println!("{}", "Type conflicts (manual review):".bold().yellow());
        for conflict in &report.conflicts {
            println!(
                "  {} {}.{}: {}",
                "⚠".yellow(),
                conflict.table,
                conflict.column,
                conflict.candidates.join(" vs ")
            );
        }
        println!();
    }

    let applied = report.executions.iter().filter(|e| e.success).count();
    let failed = report.executions.len() - applied;
    if !report.executions.is_empty() {
        println!("{} {} applied, {} failed", "Fixes:".bold(), applied.to_string().green(), failed.to_string().red());
    }

    println!("{}", "=".repeat(60).bright_blue());
}

fn print_issue(issue: &Issue, preview: Option<&str>) {
    let marker = match issue.risk_class {
        RiskClass::Additive => "●".yellow(),
        RiskClass::Destructive => "✗".red(),
    };
    let status = match issue.status {
        IssueStatus::Rejected => issue.status.to_string().red(),
        IssueStatus::Applied => issue.status.to_string().green(),
        _ => issue.status.to_string().normal(),
    };

    println!(
        "  {} {} {} [{}] {}",
        marker,
        issue.issue_type.as_str().bold(),
        issue.target(),
        issue.risk_class,
        status
    );
    println!("      {}", issue.justification().dimmed());
    for site in &issue.evidence.sites {
        println!("      at {}", site);
    }
    if let Some(reason) = &issue.rejection_reason {
        println!("      {} {}", "rejected:".red(), reason);
    }
    if let Some(error) = &issue.last_error {
        println!("      {} {}", "last error:".red(), error);
    }
    if let Some(ddl) = preview {
        println!("      {} {}", "fix:".cyan(), ddl);
    }
    println!();
}
