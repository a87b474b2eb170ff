use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::{error, info, warn};

use alohomora::auth::AuthConfig;
use alohomora::config::Config;
use alohomora::duration;
use alohomora::sweeper::ExpirationSweeper;
use alohomora::validation::{sanitize_label, validate_ip};
use alohomora::{web, Alohomora};

#[derive(Parser)]
#[command(name = "alohomora")]
#[command(author, version, about = "Time-limited IP allow-list for a reverse proxy")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web interface and the expiration updater
    Serve,

    /// Allow an IP address
    Add {
        /// IPv4 address to allow
        ip: String,

        /// Free-form label
        #[arg(short, long, default_value = "")]
        label: String,

        /// Lifetime such as "3 hours", "2 days", "1 week" or "forever"
        #[arg(short, long, default_value = "forever")]
        expiration: String,
    },

    /// Remove an entry by id
    Remove {
        /// Entry id as shown by `list`
        id: i64,
    },

    /// List entries
    List {
        /// Output format (table, json, simple)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Rewrite the proxy fragment from the store
    Render {
        /// Print the fragment instead of writing it
        #[arg(long)]
        stdout: bool,
    },

    /// Delete expired entries now
    Sweep,

    /// Generate default configuration
    GenConfig {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Table row for entry list
#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Expires")]
    expires: String,
}

/// Load the configuration file and apply environment overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides()?;
    Ok(config)
}

pub async fn run_command(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve => cmd_serve(config).await,
        Commands::Add {
            ip,
            label,
            expiration,
        } => cmd_add(config, ip, label, expiration),
        Commands::Remove { id } => cmd_remove(config, id),
        Commands::List { format } => cmd_list(config, format),
        Commands::Render { stdout } => cmd_render(config, stdout),
        Commands::Sweep => cmd_sweep(config),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

fn open(config: Config) -> Result<Alohomora> {
    let db_path = config.db_path();
    Alohomora::new(config)
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

async fn cmd_serve(config: Config) -> Result<()> {
    let auth = AuthConfig::from_env();
    if !auth.is_configured() {
        warn!("ALOHOMORA_TOKEN is not set, nobody will be able to log in");
    }

    let http = config.http.clone();
    let interval = config.sweeper.interval();
    let app = Arc::new(open(config)?);

    let sweeper = ExpirationSweeper::new(app.clone(), interval).start();

    let result = web::serve(&http, app, auth, shutdown_signal()).await;

    info!("Shutting down...");
    sweeper.stop().await;

    result
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn cmd_add(config: Config, ip: String, label: String, expiration: String) -> Result<()> {
    let ip = validate_ip(ip.trim())?.to_string();
    let label = sanitize_label(&label);
    let expiration = duration::parse_now(&expiration);

    let app = open(config)?;
    let id = app.add(&ip, &label, expiration)?;

    println!(
        "{} {} as #{} ({})",
        "Allowed".green().bold(),
        ip,
        id,
        describe_expiration(expiration)
    );
    Ok(())
}

fn cmd_remove(config: Config, id: i64) -> Result<()> {
    let app = open(config)?;

    if app.remove(id)? {
        println!("{} #{}", "Removed".green().bold(), id);
    } else {
        println!("{} #{} does not exist", "Note:".yellow().bold(), id);
    }
    Ok(())
}

fn cmd_list(config: Config, format: String) -> Result<()> {
    let app = open(config)?;
    let entries = app.list()?;

    if entries.is_empty() {
        println!("No entries");
        return Ok(());
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        "simple" => {
            for entry in &entries {
                println!("{}", entry.ip);
            }
        }
        _ => {
            let now = Utc::now().timestamp();
            let rows: Vec<EntryRow> = entries
                .iter()
                .map(|e| EntryRow {
                    id: e.id,
                    ip: e.ip.clone(),
                    label: e.label.clone(),
                    expires: if e.is_expired(now) {
                        format!("{} (expired)", describe_expiration(e.expiration))
                    } else {
                        describe_expiration(e.expiration)
                    },
                })
                .collect();

            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

fn cmd_render(config: Config, stdout: bool) -> Result<()> {
    let app = open(config)?;

    if stdout {
        println!("{}", app.render()?);
    } else {
        app.refresh()?;
        println!(
            "Configuration written to {}",
            app.allow_conf_path().display()
        );
    }
    Ok(())
}

fn cmd_sweep(config: Config) -> Result<()> {
    let app = open(config)?;
    let removed = app.sweep_now()?;

    if removed > 0 {
        println!("{} {} expired entries", "Removed".green().bold(), removed);
    } else {
        println!("No expired entries");
    }
    Ok(())
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let config = Config::default();
    let toml_str = toml::to_string_pretty(&config)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &toml_str)?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

fn describe_expiration(expiration: i64) -> String {
    if expiration == alohomora::models::NEVER {
        return "never".to_string();
    }
    DateTime::<Utc>::from_timestamp(expiration, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| expiration.to_string())
}
