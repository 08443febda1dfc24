//! Command-line front-end for the strata daemon
//!
//! Every subcommand except `serve` and `init` is a thin HTTP call against
//! the control plane. Exit codes: 0 ok, 1 generic failure, 2 daemon
//! unreachable.

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

mod client;

use client::{ClientError, DaemonClient, EXIT_UNREACHABLE};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Cognitive archaeology over your file tree")]
#[command(version, long_about = None)]
struct Cli {
    /// Daemon host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Daemon port
    #[arg(long, default_value_t = 7777)]
    port: u16,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon in the foreground
    Serve {
        /// State directory (defaults to ~/.strata)
        #[arg(short, long)]
        state_dir: Option<PathBuf>,
    },
    /// Ask the daemon to shut down gracefully
    Stop,
    /// Check that the daemon is up
    Ping,
    /// Daemon status rollup
    Status,
    /// Daemon health endpoint
    Health,
    /// Create the state directory and write a default config
    Init {
        /// State directory (defaults to ~/.strata)
        #[arg(short, long)]
        state_dir: Option<PathBuf>,
        /// Root directories to watch
        #[arg(short, long)]
        root: Vec<PathBuf>,
    },
    /// Semantic search over indexed chunks
    Query {
        /// Query text
        q: String,
        /// Results to return
        #[arg(short, long, default_value_t = 10)]
        k: usize,
    },
    /// List surfaced discoveries
    Discoveries,
    /// Confirm or dismiss a discovery
    Feedback {
        /// Discovery id
        id: uuid::Uuid,
        /// confirm or dismiss
        #[arg(value_parser = ["confirm", "dismiss"])]
        action: String,
        /// Optional note recorded on the discovery
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// List consolidated entities
    Entities,
    /// List detected patterns
    Patterns,
    /// Run correlation
    Correlate {
        /// Wait for the run and print its report
        #[arg(long)]
        wait: bool,
    },
    /// Enqueue a batch extraction scan
    Excavate {
        /// Restrict the scan to one root
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
    /// Show queue state
    Jobs,
    /// Print the tail of the daemon log
    Logs {
        /// State directory (defaults to ~/.strata)
        #[arg(short, long)]
        state_dir: Option<PathBuf>,
        /// Lines to print
        #[arg(short, long, default_value_t = 50)]
        lines: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(ClientError::Unreachable(message)) => {
            eprintln!("Error: daemon unreachable: {message}");
            ExitCode::from(EXIT_UNREACHABLE)
        }
        Err(ClientError::Other(e)) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> client::ClientResult<()> {
    let daemon = DaemonClient::new(&cli.host, cli.port);

    match cli.command {
        Commands::Serve { state_dir } => {
            let config =
                strata_daemon::load_config(state_dir).map_err(into_other)?;
            let daemon = strata_daemon::Daemon::build(config)
                .await
                .map_err(into_other)?;
            daemon.run().await.map_err(into_other)?;
            Ok(())
        }
        Commands::Stop => {
            let body = daemon.post("/shutdown", None).await?;
            emit(cli.format, &body, |_| "Daemon shutting down".to_string());
            Ok(())
        }
        Commands::Ping => {
            let body = daemon.get("/health").await?;
            emit(cli.format, &body, |b| {
                format!("pong ({})", b["version"].as_str().unwrap_or("?"))
            });
            Ok(())
        }
        Commands::Health => {
            let body = daemon.get("/health").await?;
            emit(cli.format, &body, |b| {
                format!("{}", b["status"].as_str().unwrap_or("unknown"))
            });
            Ok(())
        }
        Commands::Status => {
            let body = daemon.get("/status").await?;
            emit(cli.format, &body, render_status);
            Ok(())
        }
        Commands::Init { state_dir, root } => {
            init(state_dir, root).map_err(into_other)?;
            Ok(())
        }
        Commands::Query { q, k } => {
            let path = format!(
                "/query?q={}&k={k}",
                urlencode(&q)
            );
            let body = daemon.get(&path).await?;
            emit(cli.format, &body, render_hits);
            Ok(())
        }
        Commands::Discoveries => {
            let body = daemon.get("/discoveries").await?;
            emit(cli.format, &body, render_discoveries);
            Ok(())
        }
        Commands::Feedback { id, action, notes } => {
            let body = daemon
                .post(
                    &format!("/discoveries/{id}/feedback"),
                    Some(json!({"action": action, "notes": notes})),
                )
                .await?;
            emit(cli.format, &body, |b| {
                format!(
                    "{} -> {}",
                    b["discovery"]["title"].as_str().unwrap_or("?"),
                    b["discovery"]["status"].as_str().unwrap_or("?")
                )
            });
            Ok(())
        }
        Commands::Entities => {
            let body = daemon.get("/entities").await?;
            emit(cli.format, &body, render_entities);
            Ok(())
        }
        Commands::Patterns => {
            let body = daemon.get("/patterns").await?;
            emit(cli.format, &body, |b| {
                format!(
                    "{} patterns from the last correlation run",
                    b["patterns"].as_array().map_or(0, Vec::len)
                )
            });
            Ok(())
        }
        Commands::Correlate { wait } => {
            if wait {
                let body = daemon.post("/correlate/run", None).await?;
                emit(cli.format, &body, |b| {
                    format!(
                        "correlated: {} entities, {} patterns, {} new discoveries",
                        b["report"]["consolidated_entities"],
                        b["report"]["patterns"],
                        b["report"]["discoveries_created"]
                    )
                });
            } else {
                let body = daemon.post("/correlate", None).await?;
                emit(cli.format, &body, |b| {
                    format!("correlation queued as job {}", b["job_id"])
                });
            }
            Ok(())
        }
        Commands::Excavate { root } => {
            let body = daemon
                .post(
                    "/excavate",
                    Some(json!({
                        "root": root.map(|r| r.to_string_lossy().into_owned())
                    })),
                )
                .await?;
            emit(cli.format, &body, |b| {
                format!("excavation queued as job {}", b["job_id"])
            });
            Ok(())
        }
        Commands::Jobs => {
            let body = daemon.get("/jobs").await?;
            emit(cli.format, &body, render_jobs);
            Ok(())
        }
        Commands::Logs { state_dir, lines } => {
            logs(state_dir, lines).map_err(into_other)?;
            Ok(())
        }
    }
}

fn into_other(e: strata_core::Error) -> ClientError {
    ClientError::Other(anyhow::anyhow!(e))
}

fn emit(format: OutputFormat, body: &Value, human: impl Fn(&Value) -> String) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(body).unwrap_or_default());
        }
        OutputFormat::Human => println!("{}", human(body)),
    }
}

fn urlencode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn render_status(body: &Value) -> String {
    format!(
        "files: {} ({} indexed, {} failed)\nchunks: {}\nentities: {} occurrences, {} consolidated\ndiscoveries: {}\nqueue: {} pending, {} running\nuptime: {}s",
        body["catalog"]["files_total"],
        body["catalog"]["files_indexed"],
        body["catalog"]["files_failed"],
        body["catalog"]["chunks"],
        body["catalog"]["occurrences"],
        body["catalog"]["consolidated_entities"],
        body["catalog"]["discoveries"],
        body["queue"]["pending"],
        body["queue"]["running"],
        body["uptime_secs"],
    )
}

fn render_hits(body: &Value) -> String {
    let Some(hits) = body.as_array() else {
        return "no results".to_string();
    };
    if hits.is_empty() {
        return "no results".to_string();
    }
    hits.iter()
        .map(|hit| {
            format!(
                "{:.3}  {}  {}",
                hit["score"].as_f64().unwrap_or(0.0),
                hit["file_id"].as_str().unwrap_or("?"),
                hit["preview"].as_str().unwrap_or("").replace('\n', " ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_discoveries(body: &Value) -> String {
    let Some(discoveries) = body["discoveries"].as_array() else {
        return "no discoveries".to_string();
    };
    if discoveries.is_empty() {
        return "no discoveries".to_string();
    }
    discoveries
        .iter()
        .map(|d| {
            format!(
                "[{}] {:.2}  {}  ({})",
                d["status"].as_str().unwrap_or("?"),
                d["confidence"].as_f64().unwrap_or(0.0),
                d["title"].as_str().unwrap_or("?"),
                d["discovery_id"].as_str().unwrap_or("?"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_entities(body: &Value) -> String {
    let Some(entities) = body["entities"].as_array() else {
        return "no entities".to_string();
    };
    entities
        .iter()
        .take(50)
        .map(|e| {
            format!(
                "{:<10} {}  ({} occurrences in {} files)",
                e["entity_type"].as_str().unwrap_or("?"),
                e["canonical"].as_str().unwrap_or("?"),
                e["occurrence_count"],
                e["file_count"],
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_jobs(body: &Value) -> String {
    let pending = body["pending"].as_array().map_or(0, Vec::len);
    let recent = body["recent"].as_array().map_or(0, Vec::len);
    // Payloads are externally tagged; the variant name is the single key
    let current = body["current"]["payload"]
        .as_object()
        .and_then(|payload| payload.keys().next().cloned())
        .unwrap_or_else(|| "idle".to_string());
    format!("current: {current}\npending: {pending}\nrecent: {recent}")
}

/// Create the state directory and write a default config
fn init(state_dir: Option<PathBuf>, roots: Vec<PathBuf>) -> strata_core::Result<()> {
    let mut config = strata_daemon::load_config(state_dir)?;
    for root in roots {
        if !config.watch_roots.contains(&root) {
            config.watch_roots.push(root);
        }
    }
    config.save()?;
    println!("Initialized {}", config.state_dir.display());
    Ok(())
}

/// Print the tail of the rolling log
fn logs(state_dir: Option<PathBuf>, lines: usize) -> strata_core::Result<()> {
    let config = strata_daemon::load_config(state_dir)?;
    let path = config.log_path();
    let content = std::fs::read_to_string(&path).map_err(|e| {
        strata_core::Error::NotFound(format!("log file {}: {}", path.display(), e))
    })?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{line}");
    }
    Ok(())
}
