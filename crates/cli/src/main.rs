//! Snippet Run CLI - run files through the local agent and manage it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use snippet_run_sdk::{FileSpec, OutputStream, RunEvent, SessionInfo, SnippetRunClient};
use std::io::{SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::{Table, Tabled};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const DEFAULT_HOME: &str = "~/.snippet-run";
const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "snippet-run")]
#[command(about = "Snippet Run CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Agent home directory (session file, rules, logs)
    #[arg(long, env = "SNIPPET_RUN_HOME", default_value = DEFAULT_HOME)]
    home: String,

    /// Agent URL (defaults to the one in the session file)
    #[arg(long, env = "SNIPPET_RUN_URL")]
    url: Option<String>,

    /// Session token (defaults to the one in the session file)
    #[arg(long, env = "SNIPPET_RUN_TOKEN")]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a file and stream its output; exits with the file's exit code
    Run {
        /// File to run
        path: PathBuf,

        /// Channel name (defaults to one derived from this process)
        #[arg(short, long)]
        channel: Option<String>,

        /// File type hint (defaults to the extension)
        #[arg(short = 't', long)]
        filetype: Option<String>,
    },

    /// Stop the run on a channel
    Stop {
        /// Channel name
        channel: String,
    },

    /// List rules in evaluation order
    Rules,

    /// Check that the agent is up and the token is accepted
    Handshake,

    /// Open the user rule file ($EDITOR, else the system's default app)
    Config {
        /// Open the file with this editor
        #[arg(short, long)]
        editor: Option<String>,

        /// Only print the file path
        #[arg(long)]
        path: bool,
    },

    /// Show the last lines of the agent log
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "25")]
        lines: usize,

        /// Keep printing lines as they are appended (Ctrl+C to quit)
        #[arg(short, long)]
        follow: bool,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct RuleRow {
    index: usize,
    label: String,
}

/// Where to reach the agent
struct Connection {
    url: String,
    token: String,
}

impl Connection {
    fn resolve(cli: &Cli, home: &Path) -> Result<Self> {
        if let (Some(url), Some(token)) = (&cli.url, &cli.token) {
            return Ok(Self {
                url: url.clone(),
                token: token.clone(),
            });
        }
        let session = SessionInfo::load(&home.join("agent.json"))?;
        Ok(Self {
            url: cli.url.clone().unwrap_or(session.url),
            token: cli.token.clone().unwrap_or(session.token),
        })
    }

    /// Same port, plain HTTP, for unary calls
    fn http_url(&self) -> String {
        match self.url.strip_prefix("ws://") {
            Some(rest) => format!("http://{}", rest),
            None => self.url.clone(),
        }
    }
}

async fn call_rpc(
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> Result<serde_json::Value> {
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
        .context("Failed to connect to agent")?
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

fn expand_home(home: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(home).as_ref())
}

fn default_channel(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("cli-{}-{}", std::process::id(), name)
}

fn filetype_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Program and arguments opening `file`
///
/// An explicit editor wins, then `$EDITOR`, then the platform opener. Editor
/// strings may carry arguments (`code -w`).
fn opener_for(editor: Option<&str>, env_editor: Option<&str>, file: &Path) -> (String, Vec<String>) {
    let file = file.display().to_string();
    let editor = editor.or(env_editor).map(str::trim).filter(|e| !e.is_empty());

    if let Some(editor) = editor {
        let mut parts = editor.split_whitespace().map(str::to_string);
        if let Some(program) = parts.next() {
            let mut args: Vec<String> = parts.collect();
            args.push(file);
            return (program, args);
        }
    }

    if cfg!(target_os = "macos") {
        ("open".to_string(), vec![file])
    } else if cfg!(windows) {
        (
            "cmd".to_string(),
            vec!["/C".to_string(), "start".to_string(), String::new(), file],
        )
    } else {
        ("xdg-open".to_string(), vec![file])
    }
}

/// Text appended to `path` since byte `offset`, and the new offset
///
/// A file shorter than `offset` was truncated or rotated and is read from
/// the start.
async fn read_appended(path: &Path, offset: u64) -> Result<(String, u64)> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let len = file.metadata().await?.len();
    let start = if len < offset { 0 } else { offset };

    file.seek(SeekFrom::Start(start)).await?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await?;

    let end = start + bytes.len() as u64;
    Ok((String::from_utf8_lossy(&bytes).into_owned(), end))
}

/// Print what gets appended to `path` until Ctrl+C
async fn follow_log(path: &Path, mut offset: u64) -> Result<()> {
    let mut ticker = tokio::time::interval(FOLLOW_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (text, next) = read_appended(path, offset).await?;
                offset = next;
                if !text.is_empty() {
                    print!("{}", text);
                    std::io::stdout().flush()?;
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Last `n` lines of `text`
fn tail(text: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}

async fn run_file(
    connection: &Connection,
    path: &Path,
    channel: Option<String>,
    filetype: Option<String>,
) -> Result<i32> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Path has no file name")?;
    let filetype = filetype.unwrap_or_else(|| filetype_of(path));
    let channel = channel.unwrap_or_else(|| default_channel(path));

    let client = SnippetRunClient::connect(&connection.url, connection.token.clone()).await?;
    let mut run = client
        .run(channel.clone(), FileSpec::new(filename, filetype, content))
        .await?;

    let mut stop_sent = false;
    loop {
        let event = tokio::select! {
            event = run.next() => event,
            _ = tokio::signal::ctrl_c(), if !stop_sent => {
                stop_sent = true;
                client.stop(channel.clone()).await?;
                eprintln!("{}", format!("Stopping {}...", channel).yellow());
                continue;
            }
        };

        match event {
            Some(Ok(RunEvent::Output { data, stream })) => match stream {
                OutputStream::Stdout => {
                    print!("{}", data);
                    std::io::stdout().flush()?;
                }
                OutputStream::Stderr => eprint!("{}", data.red()),
            },
            Some(Ok(RunEvent::Exit { code })) => return Ok(code),
            Some(Err(e)) => return Err(e.into()),
            None => anyhow::bail!("Connection closed before the run finished"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let home = expand_home(&cli.home);

    match &cli.command {
        Commands::Run {
            path,
            channel,
            filetype,
        } => {
            let connection = Connection::resolve(&cli, &home)?;
            let code = run_file(&connection, path, channel.clone(), filetype.clone()).await?;
            std::process::exit(code);
        }

        Commands::Stop { channel } => {
            let connection = Connection::resolve(&cli, &home)?;
            let params = json!({ "token": connection.token, "channel": channel });
            let result = call_rpc(&connection.http_url(), "command.stop.v1", params).await?;

            if result["stopped"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Stopped {}", channel).green().bold());
            } else {
                println!("{}", format!("Nothing running on {}", channel).yellow());
            }
        }

        Commands::Rules => {
            let connection = Connection::resolve(&cli, &home)?;
            let params = json!({ "token": connection.token });
            let result = call_rpc(&connection.http_url(), "rules.list.v1", params).await?;
            let rows: Vec<RuleRow> = serde_json::from_value(result["rules"].clone())?;

            println!("{}", "Rules (first match wins)".cyan().bold());
            println!();
            println!("{}", Table::new(rows));
        }

        Commands::Handshake => {
            let connection = Connection::resolve(&cli, &home)?;
            let params = json!({ "token": connection.token });

            match call_rpc(&connection.http_url(), "handshake.v1", params).await {
                Ok(result) => {
                    println!("  {} {}", "URL:".bold(), connection.url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!(
                        "  {} {}",
                        "Version:".bold(),
                        result["version"].as_str().unwrap_or("unknown")
                    );
                    println!("  {} {} seconds", "Uptime:".bold(), result["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Config { editor, path } => {
            let rules_file = home.join("rules.toml");
            if *path {
                println!("{}", rules_file.display());
                return Ok(());
            }

            let env_editor = std::env::var("EDITOR").ok();
            let (program, args) = opener_for(editor.as_deref(), env_editor.as_deref(), &rules_file);
            let status = tokio::process::Command::new(&program)
                .args(&args)
                .status()
                .await
                .with_context(|| format!("Failed to start {}", program))?;
            if !status.success() {
                anyhow::bail!("{} exited with {}", program, status);
            }
        }

        Commands::Logs { lines, follow } => {
            let log_file = home.join("logs").join("agent.log");
            let (text, offset) = read_appended(&log_file, 0).await.with_context(|| {
                format!("No agent log at {} (is log_to_file enabled?)", log_file.display())
            })?;
            for line in tail(&text, *lines) {
                println!("{}", line);
            }
            if *follow {
                follow_log(&log_file, offset).await?;
            }
        }
    }

    Ok(())
}
