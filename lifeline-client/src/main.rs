//! Lifeline Console Client
//!
//! Connects the protocol core to the real world: the WebSocket push
//! channel, the REST backend, reverse geocoding for alert notifications,
//! and a line-oriented console for browsing rooms and chatting.
//!
//! All room state lives in one [`Reconciler`] owned by the event loop;
//! push events, history completions and console commands are applied in
//! arrival order through that single dispatch point.

mod config;
mod geocode;
mod notify_term;
mod push;
mod rest;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use geocode::Geocoder;
use lifeline_protocol::{
    view, ChatMessage, HistoryTicket, Location, LocalUser, Packet, Reconciler, Refresh,
};
use notify_term::TermNotifier;
use push::{PushChannel, PushUpdate};
use rest::{RaiseAlertRequest, RestClient};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lifeline-client", about = "Lifeline emergency-response console")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the signed-in user id
    #[arg(long, global = true)]
    user_id: Option<i64>,

    /// Override the signed-in user name
    #[arg(long, global = true)]
    user_name: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the push channel and run the console (default)
    Run,

    /// Raise a seek-help alert
    RaiseAlert {
        /// Emergency type; repeat for multiple types
        #[arg(long = "type", required = true)]
        alert_types: Vec<String>,

        /// Free-text details
        #[arg(long, default_value = "Need help!!")]
        details: String,

        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lng: f64,
    },

    /// Report yourself safe; the backend closes your room
    MarkSafe,

    /// Write the default configuration file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)?;

    if let Some(id) = cli.user_id {
        config.user.id = id;
    }
    if let Some(name) = cli.user_name.clone() {
        config.user.name = name;
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::RaiseAlert {
            alert_types,
            details,
            lat,
            lng,
        } => {
            let rest = rest_client(&config)?;
            let ack = rest
                .raise_alert(&RaiseAlertRequest {
                    alert_type: alert_types.join(", "),
                    details,
                    location: Location { lat, lng },
                    user_id: config.user.id,
                })
                .await?;
            println!("{}", ack.message.unwrap_or(ack.status));
            Ok(())
        }
        Command::MarkSafe => {
            let rest = rest_client(&config)?;
            let ack = rest.mark_safe(config.user.id).await?;
            println!("{}", ack.message.unwrap_or(ack.status));
            Ok(())
        }
        Command::InitConfig => {
            config.save(&config_path)?;
            println!("Wrote {}", config_path.display());
            Ok(())
        }
    }
}

fn rest_client(config: &Config) -> Result<RestClient> {
    RestClient::new(
        config.server.rest_url.clone(),
        Duration::from_secs(config.network.request_timeout_secs),
    )
}

/// Console commands typed by the user
#[derive(Debug, Clone, PartialEq)]
enum ConsoleCommand {
    Help,
    List,
    Open(String),
    Close,
    Send(String),
    Responses,
    Quit,
}

fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word {
        "/help" => Some(ConsoleCommand::Help),
        "/list" => Some(ConsoleCommand::List),
        "/open" if !rest.is_empty() => Some(ConsoleCommand::Open(rest.to_string())),
        "/close" => Some(ConsoleCommand::Close),
        "/responses" => Some(ConsoleCommand::Responses),
        "/quit" => Some(ConsoleCommand::Quit),
        _ if word.starts_with('/') => None,
        // A bare line is a message into the open room
        _ => Some(ConsoleCommand::Send(line.to_string())),
    }
}

async fn run(config: Config) -> Result<()> {
    if config.user.id == 0 {
        anyhow::bail!(
            "No user identity configured; set [user] in the config file or pass --user-id"
        );
    }

    let local = LocalUser {
        id: config.user.id,
        name: config.user.name.clone(),
    };
    info!(user_id = local.id, user_name = %local.name, "starting console");

    let geocoder = Geocoder::new(
        config.server.geocode_url.clone(),
        Duration::from_secs(config.network.request_timeout_secs),
    )?;
    let notifier = TermNotifier::new(geocoder);
    let mut reconciler = Reconciler::new(local, config.policies, Box::new(notifier));

    let rest = rest_client(&config)?;

    let (update_tx, mut update_rx) = mpsc::channel::<PushUpdate>(64);
    let (outbound_tx, outbound_rx) = mpsc::channel::<Packet>(64);
    let (history_tx, mut history_rx) =
        mpsc::channel::<(HistoryTicket, Result<Vec<ChatMessage>>)>(8);

    let channel = PushChannel::new(
        config.server.push_url.clone(),
        config.user.id,
        Duration::from_secs(config.network.reconnect_initial_secs),
        Duration::from_secs(config.network.reconnect_max_secs),
    );
    let push_task = tokio::spawn(channel.run(update_tx, outbound_rx));

    let (line_tx, mut line_rx) = mpsc::channel::<String>(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    println!("Lifeline console ready. /help for commands.");

    loop {
        tokio::select! {
            update = update_rx.recv() => {
                let Some(update) = update else { break };
                match update {
                    PushUpdate::Connected => {
                        // Resync the open room after a reconnect
                        if let Some(room_id) = reconciler.current_room().map(str::to_string) {
                            open_room(&mut reconciler, &room_id, &outbound_tx, &rest, &history_tx)
                                .await;
                        }
                    }
                    PushUpdate::Disconnected => {
                        println!("! push channel lost, reconnecting...");
                    }
                    PushUpdate::Event(event) => {
                        let refresh = reconciler.apply(event);
                        render(&reconciler, refresh);
                    }
                }
            }

            completed = history_rx.recv() => {
                let Some((ticket, result)) = completed else { break };
                match result {
                    Ok(messages) => {
                        if reconciler.apply_history(&ticket, messages) {
                            render(&reconciler, Refresh::Transcript);
                        } else {
                            debug!(room_id = %ticket.room_id(), "history arrived stale");
                        }
                    }
                    Err(e) => {
                        // Keep rendering the in-memory log
                        warn!(room_id = %ticket.room_id(), "history fetch failed: {:#}", e);
                        render(&reconciler, Refresh::Transcript);
                    }
                }
            }

            line = line_rx.recv() => {
                let Some(line) = line else { break };
                let Some(command) = parse_command(&line) else {
                    println!("Unknown command; /help for commands.");
                    continue;
                };
                match command {
                    ConsoleCommand::Help => print_help(),
                    ConsoleCommand::List => render(&reconciler, Refresh::RoomList),
                    ConsoleCommand::Open(room_id) => {
                        open_room(&mut reconciler, &room_id, &outbound_tx, &rest, &history_tx)
                            .await;
                    }
                    ConsoleCommand::Close => {
                        reconciler.clear_current();
                        println!("Left the chat pane.");
                    }
                    ConsoleCommand::Send(text) => {
                        match reconciler.send_message(&text) {
                            Ok(packet) => {
                                if outbound_tx.send(packet).await.is_err() {
                                    break;
                                }
                                render(&reconciler, Refresh::Transcript);
                            }
                            Err(e) => println!("! {}", e.user_message()),
                        }
                    }
                    ConsoleCommand::Responses => render_responses(&reconciler),
                    ConsoleCommand::Quit => break,
                }
            }
        }
    }

    push_task.abort();
    Ok(())
}

/// Open a room: mark current, join, and fetch authoritative history
async fn open_room(
    reconciler: &mut Reconciler,
    room_id: &str,
    outbound: &mpsc::Sender<Packet>,
    rest: &RestClient,
    history_tx: &mpsc::Sender<(HistoryTicket, Result<Vec<ChatMessage>>)>,
) {
    let Some(opened) = reconciler.open_room(room_id) else {
        println!("! Unknown room: {}", room_id);
        return;
    };

    if outbound.send(opened.join).await.is_err() {
        return;
    }

    // Render what we hold now; the history completion re-renders
    render(reconciler, Refresh::Transcript);

    let rest = rest.clone();
    let history_tx = history_tx.clone();
    let room_id = room_id.to_string();
    tokio::spawn(async move {
        let result = rest.message_history(&room_id).await;
        let _ = history_tx.send((opened.ticket, result)).await;
    });
}

fn render(reconciler: &Reconciler, refresh: Refresh) {
    match refresh {
        Refresh::None => {}
        Refresh::RoomList => render_room_list(reconciler),
        Refresh::Transcript => render_transcript(reconciler),
    }
}

fn render_room_list(reconciler: &Reconciler) {
    let list = view::room_list(reconciler.registry(), reconciler.current_room());
    let badge = view::unread_total(reconciler.registry());

    println!("-- alerts ({} unread) --", badge);
    if list.is_empty() {
        println!("   no active emergency alerts");
        return;
    }
    for entry in list {
        let marker = if entry.is_current { ">" } else { " " };
        let badge = if entry.unread > 0 {
            format!(" [{}]", entry.unread)
        } else {
            String::new()
        };
        let closed = if entry.closed { " (closed)" } else { "" };
        println!(
            "{} {} {} — {}{}{}",
            marker,
            entry.room_id,
            entry.alert_type.as_deref().unwrap_or("unknown"),
            entry.summary,
            badge,
            closed,
        );
    }
}

fn render_transcript(reconciler: &Reconciler) {
    let Some(room_id) = reconciler.current_room() else {
        return;
    };
    let Some(view) = view::transcript(reconciler.registry(), room_id, reconciler.local_user())
    else {
        return;
    };

    println!("-- room {} --", view.room_id);
    for entry in &view.entries {
        match entry.class {
            view::MessageClass::System => println!("  * {}", entry.text),
            view::MessageClass::Own => println!("  me: {}", entry.text),
            view::MessageClass::Victim => println!(
                "  {} (victim): {}",
                entry.sender_name.as_deref().unwrap_or("Victim"),
                entry.text
            ),
            view::MessageClass::Other => println!(
                "  {}: {}",
                entry.sender_name.as_deref().unwrap_or("Helper"),
                entry.text
            ),
        }
    }
    if !view.compose_enabled {
        println!("  (room closed; messages disabled)");
    }
}

fn render_responses(reconciler: &Reconciler) {
    let Some(room_id) = reconciler.current_room() else {
        println!("! Open a room first.");
        return;
    };
    let Some(room) = reconciler.registry().get(room_id) else {
        return;
    };

    if room.responses().is_empty() {
        println!("No services have responded yet.");
        return;
    }
    for response in room.responses() {
        println!(
            "{} ({}) — {}",
            response.service_name,
            response.service_type,
            response.phone.as_deref().unwrap_or("no phone"),
        );
    }
}

fn print_help() {
    println!("/list            show active alerts");
    println!("/open <room>     open an emergency room");
    println!("/close           leave the chat pane");
    println!("/responses       show service responses for the open room");
    println!("/quit            exit");
    println!("<text>           send a message into the open room");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("/help"), Some(ConsoleCommand::Help));
        assert_eq!(parse_command("/list"), Some(ConsoleCommand::List));
        assert_eq!(
            parse_command("/open room-1"),
            Some(ConsoleCommand::Open("room-1".to_string()))
        );
        assert_eq!(parse_command("/close"), Some(ConsoleCommand::Close));
        assert_eq!(parse_command("/quit"), Some(ConsoleCommand::Quit));
    }

    #[test]
    fn test_bare_line_is_a_message() {
        assert_eq!(
            parse_command("on my way"),
            Some(ConsoleCommand::Send("on my way".to_string()))
        );
    }

    #[test]
    fn test_open_without_room_is_rejected() {
        assert_eq!(parse_command("/open"), None);
        assert_eq!(parse_command("/open   "), None);
    }

    #[test]
    fn test_unknown_slash_command() {
        assert_eq!(parse_command("/frobnicate"), None);
    }

    #[test]
    fn test_blank_line_ignored() {
        assert_eq!(parse_command("   "), None);
    }
}
