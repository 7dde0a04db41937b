//! SuperAI CLI
//!
//! Talk to the SuperAI assistants from a terminal.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use superai_client::{logging, paths, ChatClient, ClientConfig, SendOutcome};
use superai_protocol::{AssistantApp, Attachment, ChatUpdate, MessageStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "superai", version)]
#[command(about = "Chat with the SuperAI assistants", long_about = None)]
struct Cli {
    /// Data directory (defaults to SUPERAI_DATA_DIR or ~/.superai)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to SUPERAI_CONFIG or <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API base URL, e.g. http://localhost:8123/api
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, global = true)]
    token: Option<String>,

    /// Assistant to talk to: fitness, love, manus, health
    #[arg(long, short, global = true)]
    app: Option<AssistantApp>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a reply. Without a message, start an interactive session.
    Chat {
        message: Option<String>,

        /// Attachment name to forward with the message (repeatable)
        #[arg(long = "attach")]
        attachments: Vec<String>,
    },
    /// Send one message and print the full reply
    Ask { message: String },
    /// Print the assistant endpoint table
    Endpoints,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = paths::resolve_data_dir(cli.data_dir.as_deref())?;
    paths::ensure_dirs(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    let log_handle = logging::init_logging(&data_dir)?;

    let mut config = ClientConfig::load(cli.config.as_deref(), &data_dir)?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(token) = cli.token {
        config.auth_token = Some(token);
    }
    if let Some(app) = cli.app {
        config.default_app = app;
    }

    info!(
        component = "cli",
        event = "cli.started",
        run_id = %log_handle.run_id,
        base_url = %config.base_url,
        app = %config.default_app,
        "SuperAI CLI started"
    );

    match cli.command {
        Command::Endpoints => {
            print_endpoints(&config);
            Ok(())
        }
        Command::Ask { message } => {
            let client = ChatClient::new(config)?;
            match client.ask(&message, Vec::new()).await {
                Ok(reply) => {
                    println!("{reply}");
                    Ok(())
                }
                Err(err) => {
                    eprintln!("{} {}", style("error:").red().bold(), err);
                    Err(err.into())
                }
            }
        }
        Command::Chat {
            message: Some(message),
            attachments,
        } => {
            let client = ChatClient::new(config)?;
            let attachments = attachments.into_iter().map(Attachment::named).collect();
            stream_reply(&client, &message, attachments).await
        }
        Command::Chat { message: None, .. } => {
            let client = ChatClient::new(config)?;
            interactive(&client).await
        }
    }
}

fn print_endpoints(config: &ClientConfig) {
    for app in AssistantApp::ALL {
        let endpoint = config.endpoints.get(app);
        println!(
            "{:<8} {:<20} {:<10} {}  (unary {})",
            style(app.slug()).cyan().bold(),
            app.display_name(),
            format!("{:?}", endpoint.transport).to_lowercase(),
            endpoint.stream_path,
            endpoint.unary_path,
        );
    }
}

/// Send one message and print fragments as they arrive.
async fn stream_reply(
    client: &ChatClient,
    message: &str,
    attachments: Vec<Attachment>,
) -> anyhow::Result<()> {
    let mut sub = client.subscribe().await?;
    let ticket = match client.send_stream(message, attachments).await? {
        SendOutcome::Started(ticket) => ticket,
        SendOutcome::Duplicate => {
            println!("{}", style("Same request already in flight").dim());
            return Ok(());
        }
    };

    let mut stdout = std::io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            update = sub.updates.recv() => match update {
                Ok(ChatUpdate::MessageUpdated { message_id, changes }) if message_id == ticket.reply_id => {
                    if let Some(fragment) = changes.appended {
                        print!("{fragment}");
                        stdout.flush()?;
                    }
                    match changes.status {
                        Some(MessageStatus::Received) => {
                            println!();
                            break;
                        }
                        Some(MessageStatus::Error) => {
                            println!();
                            let text = changes.content.unwrap_or_default();
                            eprintln!("{}", style(text).red());
                            break;
                        }
                        _ => {}
                    }
                }
                Ok(ChatUpdate::SessionReset { .. }) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        component = "cli",
                        event = "cli.updates_lagged",
                        skipped,
                        "Update receiver lagged"
                    );
                }
            },
            _ = &mut ctrl_c => {
                client.disconnect_all();
                println!();
                println!("{}", style("Cancelled").yellow());
                break;
            }
        }
    }

    ticket.wait().await;
    Ok(())
}

async fn interactive(client: &ChatClient) -> anyhow::Result<()> {
    let app = client.snapshot().state.app;
    println!(
        "{} {}",
        style(app.display_name()).cyan().bold(),
        style("(/new, /recent, /app <name>, /quit)").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();

        match input.split_once(' ').map_or((input, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("", _) => continue,
            ("/quit", _) | ("/exit", _) => break,
            ("/new", _) => {
                client.new_session().await?;
                println!("{}", style("Started a new conversation").dim());
            }
            ("/recent", _) => {
                let recent = client.recent().await?;
                if recent.is_empty() {
                    println!("{}", style("No recent conversations").dim());
                }
                for entry in recent {
                    println!(
                        "{} {} {}",
                        style(entry.app.slug()).cyan(),
                        style(&entry.title).bold(),
                        style(&entry.preview).dim()
                    );
                }
            }
            ("/app", name) => match name.parse::<AssistantApp>() {
                Ok(app) => {
                    client.switch_app(app).await?;
                    println!("{}", style(app.display_name()).cyan().bold());
                }
                Err(err) => eprintln!("{}", style(err).red()),
            },
            _ => {
                if let Err(err) = stream_reply(client, input, Vec::new()).await {
                    eprintln!("{} {}", style("error:").red().bold(), err);
                }
            }
        }
    }

    client.disconnect_all();
    Ok(())
}
