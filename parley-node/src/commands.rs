//! Interactive peer commands.
//!
//! ```text
//! /msg <id> <text>        send a message
//! /discover               fetch live peers and connect to new ones
//! /block <id>             block a peer
//! /unblock <id>           lift a block
//! /mute <id> [seconds]    mute a peer (default duration, or "forever")
//! /unmute <id>            lift a mute
//! /peers                  list connections and restrictions
//! /help                   show this list
//! /exit                   leave
//! ```

use std::fmt::Write as _;
use std::time::Duration;

use parley_p2p::{ModerationKind, P2pError, PeerNode, SendOutcome};
use thiserror::Error;

/// Usage text printed by `/help`.
pub const HELP: &str = "\
/msg <id> <text>      send a message
/discover             fetch live peers and connect to new ones
/block <id>           block a peer
/unblock <id>         lift a block
/mute <id> [seconds]  mute a peer (seconds, or \"forever\")
/unmute <id>          lift a mute
/peers                list connections and restrictions
/exit                 leave";

/// How long a `/mute` lasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MuteDuration {
    /// The configured default.
    Default,
    /// Never expires.
    Indefinite,
    /// Expires after the given time.
    For(Duration),
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Msg { target: String, text: String },
    Discover,
    Block(String),
    Unblock(String),
    Mute { target: String, duration: MuteDuration },
    Unmute(String),
    Peers,
    Help,
    Exit,
}

/// Why a line could not be parsed.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("commands start with '/', try /help")]
    NotACommand,

    #[error("unknown command {0}, try /help")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid duration {0:?}: expected seconds or \"forever\"")]
    InvalidDuration(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Err(ParseError::NotACommand);
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match name {
        "/msg" => {
            let (target, text) = rest
                .split_once(char::is_whitespace)
                .ok_or(ParseError::Usage("/msg <id> <text>"))?;
            let text = text.trim_start();
            if text.is_empty() {
                return Err(ParseError::Usage("/msg <id> <text>"));
            }
            Command::Msg {
                target: target.to_string(),
                text: text.to_string(),
            }
        }
        "/discover" => Command::Discover,
        "/block" => Command::Block(one_id(&mut args, "/block <id>")?),
        "/unblock" => Command::Unblock(one_id(&mut args, "/unblock <id>")?),
        "/mute" => {
            let target = args.next().ok_or(ParseError::Usage("/mute <id> [seconds]"))?;
            let duration = match args.next() {
                None => MuteDuration::Default,
                Some(raw) => parse_duration(raw)?,
            };
            Command::Mute {
                target: target.to_string(),
                duration,
            }
        }
        "/unmute" => Command::Unmute(one_id(&mut args, "/unmute <id>")?),
        "/peers" => Command::Peers,
        "/help" => Command::Help,
        "/exit" | "/quit" => Command::Exit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn one_id<'a>(
    args: &mut impl Iterator<Item = &'a str>,
    usage: &'static str,
) -> Result<String, ParseError> {
    match (args.next(), args.next()) {
        (Some(id), None) => Ok(id.to_string()),
        _ => Err(ParseError::Usage(usage)),
    }
}

fn parse_duration(raw: &str) -> Result<MuteDuration, ParseError> {
    match raw.to_ascii_lowercase().as_str() {
        "forever" | "indefinite" | "inf" => return Ok(MuteDuration::Indefinite),
        _ => {}
    }
    raw.parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .map(MuteDuration::For)
        .ok_or_else(|| ParseError::InvalidDuration(raw.to_string()))
}

/// Run a command against the node and return the text to show the user.
///
/// [`Command::Exit`] is handled by the caller.
pub async fn execute(node: &PeerNode, command: Command) -> anyhow::Result<String> {
    let reply = match command {
        Command::Msg { target, text } => match node.send(&target, &text).await {
            Ok(SendOutcome::Sent) => format!("-> {}: {}", target, text),
            Ok(SendOutcome::Blocked) => format!("{} is blocked, message not sent", target),
            Ok(SendOutcome::Muted) => format!("{} is muted, message not sent", target),
            Err(P2pError::NotConnected(_)) => {
                format!("{} is not connected, try /discover", target)
            }
            Err(e) => return Err(e.into()),
        },
        Command::Discover => {
            let report = node.discover().await?;
            if report.peers.is_empty() {
                "No other live peers".to_string()
            } else {
                let mut out = String::from("Live peers:");
                for (id, address) in &report.peers {
                    let _ = write!(out, "\n  {} at {}", id, address);
                }
                if !report.connected.is_empty() {
                    let _ = write!(out, "\nConnected to: {}", report.connected.join(", "));
                }
                if !report.failed.is_empty() {
                    let _ = write!(out, "\nUnreachable: {}", report.failed.join(", "));
                }
                out
            }
        }
        Command::Block(target) => match node.block(&target).await? {
            true => format!("Blocked {}", target),
            false => format!("{} was already blocked", target),
        },
        Command::Unblock(target) => match node.unblock(&target).await? {
            true => format!("Unblocked {}", target),
            false => format!("{} was not blocked", target),
        },
        Command::Mute { target, duration } => {
            let (changed, how_long) = match duration {
                MuteDuration::Default => {
                    let d = node.config().default_mute_duration;
                    (node.mute_default(&target).await?, format!("for {}s", d.as_secs_f64()))
                }
                MuteDuration::Indefinite => (node.mute(&target, None).await?, "indefinitely".to_string()),
                MuteDuration::For(d) => {
                    (node.mute(&target, Some(d)).await?, format!("for {}s", d.as_secs_f64()))
                }
            };
            if changed {
                format!("Muted {} {}", target, how_long)
            } else {
                format!("{} was already muted, now {}", target, how_long)
            }
        }
        Command::Unmute(target) => match node.unmute(&target).await? {
            true => format!("Unmuted {}", target),
            false => format!("{} was not muted", target),
        },
        Command::Peers => describe_peers(node).await,
        Command::Help => HELP.to_string(),
        Command::Exit => String::new(),
    };
    Ok(reply)
}

async fn describe_peers(node: &PeerNode) -> String {
    let connections = node.connections().await;
    let restrictions = node.moderation().await;

    let mut out = String::new();
    if connections.is_empty() {
        out.push_str("No connections");
    } else {
        out.push_str("Connections:");
        for info in &connections {
            let _ = write!(out, "\n  {}", info);
        }
    }

    for entry in &restrictions {
        let _ = match (entry.kind, entry.expires_at) {
            (ModerationKind::Muted, Some(at)) => write!(
                out,
                "\n  {} muted, {}s left",
                entry.target_id,
                at.saturating_duration_since(tokio::time::Instant::now()).as_secs()
            ),
            (kind, _) => write!(out, "\n  {} {}", entry.target_id, kind),
        };
    }
    out
}
