//! Agent Chat - Terminal Host for Conversation Sessions
//!
//! A line-oriented surface over `agent-chat-core`: every line typed on stdin
//! is sent to the agent, replies are printed as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the default agent
//! agent-chat
//!
//! # Pick an agent and a server
//! agent-chat --agent finance --api-url http://agents.internal:8000
//!
//! # Show the diagnostics log as it grows
//! agent-chat --show-logs
//!
//! # List the agents the server offers
//! agent-chat --list-agents --remote
//!
//! # Verbose logging
//! RUST_LOG=debug agent-chat
//! ```
//!
//! # Commands
//!
//! - `/logs`: Show or hide the diagnostics log
//! - `/quit`: Close the session and exit
//!
//! # Signals
//!
//! - `SIGINT`: Close the session and exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use agent_chat_core::config::{default_config_path, load_config_from_path};
use agent_chat_core::transport::HttpTransport;
use agent_chat_core::{
    find_agent, AgentTransport, ChannelNotifier, ClientConfig, ConfigOverrides, LogEntry,
    SessionController, SessionIntent, KNOWN_AGENTS,
};

/// Shown when a line arrives while the previous message is still being sent
const LINE_IGNORED_NOTICE: &str = "(still sending the previous message, line ignored)";

/// Agent Chat - talk to a remote agent from the terminal
#[derive(Parser, Debug)]
#[command(name = "agent-chat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Agent to talk to (defaults to the configured default agent)
    #[arg(short = 'a', long, value_name = "ID")]
    agent: Option<String>,

    /// Display name for the agent (defaults to the catalog name)
    #[arg(short = 'n', long, value_name = "NAME")]
    name: Option<String>,

    /// Base URL of the agent service
    #[arg(short = 'u', long, value_name = "URL")]
    api_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "AGENT_CHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Give up waiting for a reply after this many milliseconds (0 waits forever)
    #[arg(long, value_name = "MS")]
    reply_timeout_ms: Option<u64>,

    /// Start with the diagnostics log visible
    #[arg(long)]
    show_logs: bool,

    /// List known agents and exit
    #[arg(long)]
    list_agents: bool,

    /// With --list-agents, ask the server instead of the built-in catalog
    #[arg(long, requires = "list_agents")]
    remote: bool,

    /// Print the final session snapshot as JSON on exit
    #[arg(long)]
    dump_snapshot: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.api_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(ms) = self.reply_timeout_ms {
            overrides = overrides.with_reply_timeout_ms(ms);
        }
        if let Some(ref agent) = self.agent {
            overrides = overrides.with_default_agent(agent.clone());
        }
        overrides
    }
}

/// How much of the session has already been printed
#[derive(Default)]
struct Transcript {
    messages_shown: usize,
    logs_shown: usize,
    log_view_visible: bool,
    awaiting_shown: bool,
}

impl Transcript {
    fn render(&mut self, session: &SessionController<HttpTransport>, agent_name: &str) {
        let store = session.store();

        for message in store.messages().get(self.messages_shown..).unwrap_or_default() {
            if message.is_assistant() {
                println!("{agent_name}: {}", message.content);
            }
        }
        self.messages_shown = store.messages().len();

        let awaiting = store.is_awaiting_reply();
        if awaiting && !self.awaiting_shown {
            println!("  ({agent_name} is thinking...)");
        }
        self.awaiting_shown = awaiting;

        let visible = session.log_view_visible();
        if visible && !self.log_view_visible {
            println!("--- logs ({} entries) ---", session.log().len());
            self.logs_shown = 0;
        } else if !visible && self.log_view_visible {
            println!("--- logs hidden ---");
        }
        self.log_view_visible = visible;

        if visible {
            for entry in session.log().entries_since(self.logs_shown) {
                println!("{}", format_log_entry(entry));
            }
        }
        self.logs_shown = session.log().len();
    }
}

fn format_log_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "[{}] {:<8} {}",
        entry.timestamp.format("%H:%M:%S"),
        entry.kind.label(),
        entry.message
    );
    if let Some(ref details) = entry.details {
        line.push_str("  ");
        line.push_str(&details.to_string());
    }
    line
}

/// Submit a typed line; returns a notice when it was dropped because a send
/// is still in flight
fn submit_line<T: AgentTransport + ?Sized + 'static>(
    session: &mut SessionController<T>,
    text: &str,
) -> Option<&'static str> {
    let busy = session.store().is_submitting();
    if session.submit(text).is_none() && busy && !text.trim().is_empty() {
        return Some(LINE_IGNORED_NOTICE);
    }
    None
}

async fn list_agents(config: &ClientConfig, remote: bool) -> Result<()> {
    if remote {
        let transport = HttpTransport::new(config.api.clone())?;
        let agents = transport
            .list_agents()
            .await
            .with_context(|| format!("Failed to list agents from {}", config.api.base_url))?;
        for agent in agents {
            match agent.description {
                Some(description) => println!("{:<16} {:<24} {description}", agent.id, agent.name),
                None => println!("{:<16} {}", agent.id, agent.name),
            }
        }
    } else {
        for agent in KNOWN_AGENTS {
            println!("{:<16} {:<24} {}", agent.id, agent.name, agent.description);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so the transcript stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agent_chat=info".parse()?)
                .add_directive("agent_chat_core=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path)
        .context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid command-line option")?;
    info!(source = %config.source(), api = %config.api.base_url, "Configuration loaded");

    if args.list_agents {
        return list_agents(&config, args.remote).await;
    }

    let agent_id = config.default_agent.clone();
    let agent_name = args.name.clone().unwrap_or_else(|| {
        find_agent(&agent_id).map_or_else(|| agent_id.clone(), |a| a.name.to_string())
    });

    let transport = HttpTransport::new(config.api.clone())?;
    let (notifier, mut notifications) = ChannelNotifier::new();
    let mut session = SessionController::new(
        Arc::new(transport),
        Arc::new(notifier),
        config.session.clone(),
    );

    session
        .start(agent_id.clone(), agent_name.clone())
        .await
        .with_context(|| format!("Could not reach {}", config.api.base_url))?;
    if args.show_logs {
        session.toggle_log_view();
    }

    println!("Connected to {agent_name} ({agent_id}). Type /logs to toggle the log, /quit to exit.");

    let mut transcript = Transcript::default();
    transcript.render(&session, &agent_name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match SessionIntent::from_input_line(&line) {
                    SessionIntent::Close => break,
                    SessionIntent::Submit { text } => {
                        if let Some(notice) = submit_line(&mut session, &text) {
                            eprintln!("  {notice}");
                        }
                    }
                    intent => session.handle_intent(intent).await?,
                }
            }
            _ = session.next_event() => {}
            Some(notification) = notifications.recv() => {
                eprintln!("! {}", notification.message);
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
        }
        transcript.render(&session, &agent_name);
    }

    session.close().await;
    transcript.render(&session, &agent_name);

    if args.dump_snapshot {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    }

    Ok(())
}
