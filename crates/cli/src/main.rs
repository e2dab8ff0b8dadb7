//! Nexus CLI - Command-line interface for the Nexus Field Ops orchestrator

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9627";
const ERROR_PREVIEW_CHARS: usize = 48;

#[derive(Parser)]
#[command(name = "nexus")]
#[command(about = "Nexus Field Ops AI orchestrator CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "NEXUS_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the AI assistant
    Ask {
        /// The question or instruction
        prompt: String,

        /// Task type
        #[arg(short, long, value_enum, default_value_t = TaskKind::Report)]
        task: TaskKind,

        /// Retries after the first attempt
        #[arg(short, long, default_value = "3")]
        retries: u32,

        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Inspect and manage the offline queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum QueueAction {
    /// List queued requests
    List,
    /// Count pending requests
    Pending,
    /// Reset a failed request
    Retry { id: String },
    /// Reset every failed request
    RetryAll,
    /// Remove one request
    Remove { id: String },
    /// Remove every request
    Clear,
    /// Replay the queue now
    Process,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Drop every cached response
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TaskKind {
    Diagnostic,
    Map,
    Report,
}

impl TaskKind {
    fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Diagnostic => "diagnostic",
            TaskKind::Map => "map",
            TaskKind::Report => "report",
        }
    }
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Tabled)]
struct QueueRow {
    id: String,
    state: String,
    task: String,
    attempts: String,
    last_error: String,
}

impl QueueRow {
    fn from_json(request: &Value) -> Self {
        let last_error = request["last_error"].as_str().unwrap_or("-");
        let last_error = if last_error.chars().count() > ERROR_PREVIEW_CHARS {
            let preview: String = last_error.chars().take(ERROR_PREVIEW_CHARS).collect();
            format!("{preview}…")
        } else {
            last_error.to_string()
        };

        Self {
            id: request["id"].as_str().unwrap_or("?").to_string(),
            state: request["state"].as_str().unwrap_or("?").to_uppercase(),
            task: request["payload"]["task_type"]
                .as_str()
                .unwrap_or("?")
                .to_string(),
            attempts: format!(
                "{}/{}",
                request["attempt_count"].as_u64().unwrap_or(0),
                request["max_attempts"].as_u64().unwrap_or(0)
            ),
            last_error,
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to orchestrator")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_ai_response(response: &Value) {
    let text = response["text"].as_str().unwrap_or_default();

    match response["error"].as_str() {
        None => {
            let cached = response["metadata"]["cached"].as_bool().unwrap_or(false);
            println!("{}", text);
            println!();
            let mut footer = format!(
                "model {} · attempt {}",
                response["metadata"]["model"].as_str().unwrap_or("?"),
                response["metadata"]["attempt"]
            );
            if cached {
                footer.push_str(" · cached");
            }
            println!("{}", footer.dimmed());
        }
        Some("OFFLINE_QUEUED") => {
            println!("{}", text.yellow());
            if let Some(id) = response["metadata"]["queueId"].as_str() {
                println!("  {} {}", "Queue ID:".bold(), id);
            }
        }
        Some(tag) => {
            println!("{} {}", format!("✗ [{tag}]").red().bold(), text);
            if let Some(detail) = response["metadata"]["detail"].as_str() {
                println!("  {} {}", "Detail:".bold(), detail);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            prompt,
            task,
            retries,
            no_cache,
        } => {
            let params = json!({
                "prompt": prompt,
                "task_type": task.as_str(),
                "max_retries": retries,
                "use_cache": !no_cache,
            });

            let response = call_rpc(&cli.rpc_url, "ai.execute.v1", params).await?;
            print_ai_response(&response);
        }

        Commands::Queue { action } => run_queue_action(&cli.rpc_url, action).await?,

        Commands::Cache {
            action: CacheAction::Clear,
        } => {
            call_rpc(&cli.rpc_url, "cache.clear.v1", json!({})).await?;
            println!("{}", "✓ Response cache cleared".green().bold());
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    let online = if stats["online"].as_bool().unwrap_or(false) {
                        "ONLINE".green()
                    } else {
                        "OFFLINE".yellow()
                    };
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Network:".bold(), online);
                    println!("  {} {}", "Model:".bold(), stats["model"].as_str().unwrap_or("?"));
                    if !stats["configured"].as_bool().unwrap_or(false) {
                        println!("  {} {}", "API key:".bold(), "NOT CONFIGURED".red());
                    }
                    println!();
                    println!("  {} {}", "Queued:".bold(), stats["queue"]["total"]);
                    println!("  {} {}", "Pending:".bold(), stats["queue"]["pending"]);
                    println!("  {} {}", "Failed:".bold(), stats["queue"]["failed"]);
                    println!();
                    println!(
                        "  {} {} in memory, {} durable",
                        "Cache:".bold(),
                        stats["cache"]["memory_entries"],
                        stats["cache"]["durable_entries"]
                    );
                    println!("  {} {}", "Errors logged:".bold(), stats["errors"]["total"]);
                    let failures = stats["failure_count"].as_u64().unwrap_or(0);
                    if stats["needs_escalation"].as_bool().unwrap_or(false) {
                        println!(
                            "  {} {} (contact supervisor)",
                            "Failures:".bold(),
                            failures.to_string().red()
                        );
                    } else {
                        println!("  {} {}", "Failures:".bold(), failures);
                    }
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}

async fn run_queue_action(rpc_url: &str, action: QueueAction) -> Result<()> {
    match action {
        QueueAction::List => {
            let result = call_rpc(rpc_url, "queue.list.v1", json!({})).await?;
            let rows: Vec<QueueRow> = result["requests"]
                .as_array()
                .map(|requests| requests.iter().map(QueueRow::from_json).collect())
                .unwrap_or_default();

            if rows.is_empty() {
                println!("{}", "Offline queue is empty".dimmed());
            } else {
                println!("{}", Table::new(rows));
            }
        }
        QueueAction::Pending => {
            let result = call_rpc(rpc_url, "queue.pending_count.v1", json!({})).await?;
            println!("{} pending", result["pending"]);
        }
        QueueAction::Retry { id } => {
            let result = call_rpc(rpc_url, "queue.retry.v1", json!({ "id": id })).await?;
            if result["retried"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Request {} reset for retry", id).green().bold());
            } else {
                println!("{}", format!("○ Request {} is not failed", id).yellow());
            }
        }
        QueueAction::RetryAll => {
            let result = call_rpc(rpc_url, "queue.retry_all.v1", json!({})).await?;
            println!("{}", format!("✓ {} request(s) reset", result["retried"]).green().bold());
        }
        QueueAction::Remove { id } => {
            let result = call_rpc(rpc_url, "queue.remove.v1", json!({ "id": id })).await?;
            if result["removed"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Request {} removed", id).green().bold());
            } else {
                println!("{}", format!("○ Request {} not queued", id).yellow());
            }
        }
        QueueAction::Clear => {
            let result = call_rpc(rpc_url, "queue.clear.v1", json!({})).await?;
            println!("{}", format!("✓ {} request(s) cleared", result["cleared"]).green().bold());
        }
        QueueAction::Process => {
            let result = call_rpc(rpc_url, "queue.process.v1", json!({})).await?;
            if let Some(reason) = result["skipped"].as_str() {
                println!("{}", format!("○ Replay skipped: {}", reason).yellow());
            } else {
                println!("{}", "✓ Replay finished".green().bold());
                println!(
                    "  attempted {} · succeeded {} · failed {} · exhausted {} · removed {}",
                    result["attempted"],
                    result["succeeded"],
                    result["failed"],
                    result["exhausted"],
                    result["removed"]
                );
            }
        }
    }

    Ok(())
}
