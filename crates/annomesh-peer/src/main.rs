//! annomesh command-line entry point.
//!
//! The engine itself is a library driven by a front end.  This binary gives
//! it a home on the command line for trying things out without one:
//!
//! ```text
//! annomesh [--config <PATH>] <COMMAND>
//!
//! Commands:
//!   simulate   Run a host and N joiners over the in-memory network
//!   code       Generate or validate share codes
//!   config     Show, locate, or initialise the config file
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Description                             |
//! |-------------------|-----------------------------------------|
//! | `ANNOMESH_CONFIG` | Config file path (overrides platform)   |
//! | `RUST_LOG`        | Log filter (overrides `log_level`)      |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use annomesh_core::{Point, ShareCode, Style, Tool};
use annomesh_peer::application::events::SessionState;
use annomesh_peer::infrastructure::simulation::Simulation;
use annomesh_peer::infrastructure::storage::config::{
    config_file_path, load_config_from, save_config_to, AppConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Peer-to-peer collaborative annotation engine.
#[derive(Debug, Parser)]
#[command(name = "annomesh", about = "Peer-to-peer collaborative annotation engine", version)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "ANNOMESH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a host and several joiners over the in-memory network and report
    /// whether every canvas converged.
    Simulate {
        /// Number of joiners.
        #[arg(long, default_value_t = 2)]
        joiners: usize,

        /// Strokes each participant draws.
        #[arg(long, default_value_t = 3)]
        strokes: usize,

        /// Simulated seconds to run after drawing.
        #[arg(long, default_value_t = 5)]
        seconds: u64,

        /// Seed for share codes and stroke placement.
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Share code utilities.
    Code {
        #[command(subcommand)]
        action: CodeAction,
    },
    /// Config file utilities.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum CodeAction {
    /// Print fresh share codes.
    Generate {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Normalise and validate a typed code.
    Check { code: String },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the config file location.
    Path,
    /// Write the defaults to the config file unless it exists.
    Init,
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("could not determine the config directory"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli.config_path()?;
    let config = load_config_from(path.clone())
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.session.log_level)),
        )
        .init();

    match cli.command {
        Command::Simulate {
            joiners,
            strokes,
            seconds,
            seed,
        } => simulate(&config, joiners, strokes, Duration::from_secs(seconds), seed).await,
        Command::Code { action } => code(action),
        Command::Config { action } => config_command(action, &config, path),
    }
}

// ── simulate ──────────────────────────────────────────────────────────────────

async fn simulate(
    config: &AppConfig,
    joiners: usize,
    strokes: usize,
    duration: Duration,
    seed: u64,
) -> anyhow::Result<()> {
    let session_config = config
        .session_config()
        .context("invalid canvas settings")?;
    let mut sim = Simulation::new();

    let code = sim
        .add_peer("host", session_config.clone(), seed)
        .start_hosting()
        .context("host could not start")?;
    sim.run_until_idle();
    info!(%code, "host waiting for joiners");

    for i in 0..joiners {
        let name = format!("joiner-{i}");
        sim.add_peer(&name, session_config.clone(), seed.wrapping_add(i as u64 + 1))
            .join_with_code(code.as_str())
            .with_context(|| format!("{name} could not join"))?;
    }
    sim.run_until_idle();

    for name in sim.peer_names() {
        let state = sim.peer(&name).map(|p| p.state());
        if state != Some(SessionState::Active) {
            warn!(%name, ?state, "peer not active after joining");
        }
    }

    for (index, name) in sim.peer_names().into_iter().enumerate() {
        let Some(peer) = sim.peer_mut(&name) else {
            continue;
        };
        for stroke in 0..strokes {
            let offset = (index * strokes + stroke) as f64 * 20.0;
            let id = peer.begin_element(
                Tool::Pencil,
                Style::default(),
                Point::new(10.0 + offset, 10.0),
            );
            peer.extend_element(&id, Point::new(40.0 + offset, 60.0));
            peer.extend_element(&id, Point::new(70.0 + offset, 30.0));
            peer.end_element(&id);
        }
        sim.run_until_idle();
    }

    tokio::select! {
        _ = sim.run_paced(duration, Duration::from_millis(100)) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("received Ctrl+C, stopping early");
        }
    }

    let converged = sim.converged();
    for name in sim.peer_names() {
        if let Some(peer) = sim.peer(&name) {
            println!(
                "{name:<10} state={:?} peers={} elements={}",
                peer.state(),
                peer.connected_peers().len(),
                peer.replicator().all_elements().len()
            );
        }
    }
    println!("converged: {converged}");

    for name in sim.peer_names() {
        if let Some(peer) = sim.peer_mut(&name) {
            peer.stop();
        }
    }
    sim.run_until_idle();

    if !converged {
        bail!("canvases diverged");
    }
    Ok(())
}

// ── code ──────────────────────────────────────────────────────────────────────

fn code(action: CodeAction) -> anyhow::Result<()> {
    match action {
        CodeAction::Generate { count } => {
            let mut rng = rand::thread_rng();
            for _ in 0..count {
                println!("{}", ShareCode::generate(&mut rng));
            }
        }
        CodeAction::Check { code } => {
            let parsed =
                ShareCode::parse(&code).with_context(|| format!("'{code}' is not a share code"))?;
            println!("{parsed}");
        }
    }
    Ok(())
}

// ── config ────────────────────────────────────────────────────────────────────

fn config_command(action: ConfigAction, config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let text = toml::to_string_pretty(config).context("failed to render config")?;
            print!("{text}");
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init => {
            if path.exists() {
                println!("{} already exists", path.display());
            } else {
                save_config_to(&AppConfig::default(), path.clone())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("wrote {}", path.display());
            }
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_defaults() {
        // Arrange: parse with no options (all defaults apply)
        let cli = Cli::parse_from(["annomesh", "simulate"]);

        // Assert
        match cli.command {
            Command::Simulate {
                joiners, strokes, ..
            } => {
                assert_eq!(joiners, 2);
                assert_eq!(strokes, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let cli = Cli::parse_from(["annomesh", "--config", "/tmp/a.toml", "config", "path"]);
        assert_eq!(cli.config_path().unwrap(), PathBuf::from("/tmp/a.toml"));
    }

    #[test]
    fn test_simulate_small_session_converges() {
        let result = tokio_test::block_on(simulate(
            &AppConfig::default(),
            1,
            2,
            Duration::from_millis(300),
            4,
        ));
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn test_code_check_rejects_short_code() {
        let result = code(CodeAction::Check { code: "AB".into() });
        assert!(result.is_err());
    }
}
