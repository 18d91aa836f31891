//! Interactive console
//!
//! A small REPL for driving the bridge by hand: connection control, the
//! fixed command set and a view of the mirrored variables.

use std::sync::Arc;

use anyhow::{bail, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bridge::{Command, GabinBridge};
use crate::transport::ConnectionState;

pub async fn run_repl(bridge: Arc<GabinBridge>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("Gabin bridge console, type 'help' for commands");

    loop {
        match rl.readline("gabin> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match handle_line(&bridge, line).await {
                    Ok(true) => break,
                    Ok(false) => {},
                    Err(e) => println!("{} {e:#}", "error:".red()),
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("readline error: {e}");
                break;
            },
        }
    }

    Ok(())
}

/// Dispatch one console line. Returns `true` when the user asked to quit.
async fn handle_line(bridge: &GabinBridge, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();

    match verb {
        "quit" | "exit" => return Ok(true),
        "help" => print_help(),
        "status" => println!("{}", format_status(&bridge.status())),
        "vars" => {
            for (var, value) in bridge.variables().snapshot() {
                println!("{} = {:?}", var.id(), value);
            }
        },
        "connect" => bridge.connect().await?,
        "register" => bridge.execute(Command::Register).await?,
        "start" => bridge.execute(Command::Start).await?,
        "stop" => bridge.execute(Command::Stop).await?,
        "ready" => bridge.execute(Command::QueryReady).await?,
        "scene" => {
            let name = joined_name(&rest, "scene name required (scene <name>)")?;
            bridge.execute(Command::Scene(name)).await?;
        },
        "source" => {
            let name = joined_name(&rest, "source name required (source <name>)")?;
            bridge.execute(Command::Source(name)).await?;
        },
        "mic" => {
            let (name, on) = parse_mic_args(&rest)?;
            bridge.execute(Command::Mic { name, on }).await?;
        },
        "autocam" => {
            let on = match rest.as_slice() {
                [state] => parse_state(state)?,
                _ => bail!("usage: autocam <0|1>"),
            };
            bridge.execute(Command::Autocam(on)).await?;
        },
        _ => println!("unknown command '{verb}' (try 'help')"),
    }

    Ok(false)
}

/// `mic <name...> <0|1>`: the name may contain spaces, the state is last.
fn parse_mic_args(args: &[&str]) -> Result<(String, bool)> {
    let Some((state, name_parts)) = args.split_last() else {
        bail!("usage: mic <name> <0|1>");
    };
    if name_parts.is_empty() {
        bail!("usage: mic <name> <0|1>");
    }
    Ok((name_parts.join(" "), parse_state(state)?))
}

fn parse_state(value: &str) -> Result<bool> {
    match value {
        "1" | "on" | "true" => Ok(true),
        "0" | "off" | "false" => Ok(false),
        other => bail!("state must be 0 or 1, got '{other}'"),
    }
}

fn joined_name(args: &[&str], usage: &str) -> Result<String> {
    if args.is_empty() {
        bail!("{usage}");
    }
    Ok(args.join(" "))
}

fn format_status(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Ready => state.label().green().to_string(),
        ConnectionState::Connecting => state.label().yellow().to_string(),
        ConnectionState::Failed { .. } => state.label().red().to_string(),
        ConnectionState::Disconnected => state.label().dimmed().to_string(),
    }
}

fn print_help() {
    println!("commands:");
    println!("  status              show connection state");
    println!("  vars                show mirrored variables");
    println!("  connect             (re)connect to Gabin");
    println!("  register            re-subscribe to feedback streams");
    println!("  start | stop        start/stop the automation");
    println!("  scene <name>        announce the live scene");
    println!("  source <name>       trigger a specific shot");
    println!("  mic <name> <0|1>    toggle mic availability");
    println!("  autocam <0|1>       toggle the autocam");
    println!("  ready               request a ready-status report");
    println!("  quit                leave the console");
}
