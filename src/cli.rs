//! Command-line REPL
//!
//! Lets a user drive the controller without hardware: press buttons, turn
//! encoders and inspect the mirrored state. The prompt runs on its own
//! thread and hands parsed commands to the main loop.

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::input::{ButtonId, EncoderId, InputEvent};
use crate::state::{ListEntry, ListKind};
use crate::sync::SyncController;

const PROMPT: &str = "surface> ";

/// Command handed to the main loop
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Input(Vec<InputEvent>),
    Status,
    List(ListKind),
    Params,
    /// Simulate the host going away
    Disconnect,
    /// Ask the host for its status again
    Connect,
    Quit,
}

fn parse_list(s: &str) -> Option<ListKind> {
    match s {
        "devices" | "device" => Some(ListKind::Devices),
        "pages" | "page" => Some(ListKind::Pages),
        "tracks" | "track" => Some(ListKind::Tracks),
        _ => None,
    }
}

/// Parse one line; `Ok(None)` for blank lines
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let button = |args: &[&str]| -> Result<ButtonId, String> {
        args.first()
            .ok_or_else(|| format!("usage: {} <button>", verb))?
            .parse()
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "press" => ReplCommand::Input(vec![InputEvent::Press(button(&args)?)]),
        "release" => ReplCommand::Input(vec![InputEvent::Release(button(&args)?)]),
        "tap" => {
            let id = button(&args)?;
            ReplCommand::Input(vec![InputEvent::Press(id), InputEvent::Release(id)])
        }
        "turn" => {
            let [encoder, delta] = args.as_slice() else {
                return Err("usage: turn <encoder> <delta>".to_string());
            };
            let encoder: EncoderId = encoder.parse()?;
            let delta: i32 = delta
                .parse()
                .map_err(|_| format!("invalid delta '{}'", delta))?;
            ReplCommand::Input(vec![InputEvent::Turn(encoder, delta)])
        }
        "status" => ReplCommand::Status,
        "list" => {
            let kind = args
                .first()
                .and_then(|s| parse_list(s))
                .ok_or_else(|| "usage: list <devices|pages|tracks>".to_string())?;
            ReplCommand::List(kind)
        }
        "params" => ReplCommand::Params,
        "disconnect" => ReplCommand::Disconnect,
        "connect" => ReplCommand::Connect,
        "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(Some(command))
}

fn print_help() {
    println!("\n{}", "Commands:".bold());
    println!("  {}    press and hold a button", "press <button>".cyan());
    println!("  {}  let go of a button", "release <button>".cyan());
    println!("  {}      press then release", "tap <button>".cyan());
    println!("  {} turn an encoder", "turn <encoder> <n>".cyan());
    println!("  {}            host, device, track, view and overlays", "status".cyan());
    println!("  {}       rows of devices, pages or tracks", "list <kind>".cyan());
    println!("  {}            parameter slots", "params".cyan());
    println!("  {}        drop / restore the host link", "disconnect | connect".cyan());
    println!("  {}              leave", "quit".cyan());
    println!(
        "\n  Buttons: left_top left_center left_bottom bottom_left bottom_center bottom_right nav opt macro_1..macro_8"
    );
    println!("  Encoders: nav opt macro_1..macro_8\n");
}

/// Run the prompt on a dedicated thread
pub fn spawn_repl(tx: mpsc::Sender<ReplCommand>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(e) = run_repl(&tx) {
            warn!("⚠️  REPL stopped: {}", e);
        }
        // The prompt is gone; let the main loop shut down
        let _ = tx.blocking_send(ReplCommand::Quit);
    })
}

fn run_repl(tx: &mpsc::Sender<ReplCommand>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("Type {} for a list of commands", "help".cyan());

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                if trimmed == "help" {
                    print_help();
                    continue;
                }

                match parse_command(trimmed) {
                    Ok(Some(command)) => {
                        let quit = command == ReplCommand::Quit;
                        debug!("REPL command: {:?}", command);
                        if tx.blocking_send(command).is_err() || quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e.red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn on_off(flag: bool) -> ColoredString {
    if flag {
        "on".green()
    } else {
        "off".dimmed()
    }
}

/// Print host, selection and overlay state
pub fn print_status(sync: &SyncController) {
    let host = sync.host_status();
    println!("\n{}", "=== Controller State ===".bold().cyan());
    println!(
        "  Host:    {} (active: {})",
        if host.connected {
            "connected".green()
        } else {
            "disconnected".red()
        },
        on_off(host.active)
    );
    println!(
        "  Track:   {} (mute {}, solo {})",
        sync.track().name.bright_white(),
        on_off(sync.track().muted),
        on_off(sync.track().soloed)
    );
    println!(
        "  Device:  {} ({})",
        sync.device().name.bright_white(),
        if sync.device().enabled {
            "enabled".green()
        } else {
            "bypassed".yellow()
        }
    );
    println!("  View:    {}", sync.view().to_string().yellow());

    // Bottom first
    let overlays: Vec<&str> = [sync.overlays().previous(), sync.overlays().current()]
        .into_iter()
        .flatten()
        .map(|kind| kind.name())
        .collect();
    if overlays.is_empty() {
        println!("  Overlays: {}", "none".dimmed());
    } else {
        println!("  Overlays: {}", overlays.join(" > ").yellow());
    }

    for kind in ListKind::ALL {
        let list = sync.list(kind);
        println!(
            "  {:<8} {}/{} loaded, cursor {}",
            format!("{}:", kind),
            list.loaded_up_to,
            list.total_count,
            list.current_index
        );
    }
    println!();
}

/// Print the rows of one list; the device list shows children after a dive
pub fn print_list(sync: &SyncController, kind: ListKind) {
    let children = sync.device_children();
    if let (ListKind::Devices, Some(parent)) = (kind, children.parent()) {
        println!("\n{} of device {}", "children".bold(), parent);
        let back = if children.cursor() == 0 { ">" } else { " " };
        println!(" {} {:>3}  {}", back, 0, "..".cyan());
        for (i, child) in children.children().iter().enumerate() {
            let marker = if children.cursor() == i + 1 { ">" } else { " " };
            println!(
                " {} {:>3}  {} {}",
                marker,
                i + 1,
                child.name,
                format!("({})", child.child_type).dimmed()
            );
        }
        println!();
        return;
    }

    let list = sync.list(kind);
    println!(
        "\n{} ({} of {}{})",
        kind.to_string().bold(),
        list.loaded_up_to,
        list.total_count,
        if list.is_nested { ", nested" } else { "" }
    );

    for (display, row) in list.items.iter().enumerate() {
        let marker = if display == list.current_index { ">" } else { " " };
        match row {
            Some(ListEntry::Back) => println!(" {} {:>3}  {}", marker, display, "..".cyan()),
            Some(ListEntry::Item(item)) => {
                let active = item.absolute_index == list.active_index;
                let name = if active {
                    item.name.bright_white().bold()
                } else {
                    item.name.normal()
                };
                let more = if item.flags.expandable { " +".cyan() } else { "".normal() };
                println!(" {} {:>3}  {}{}", marker, display, name, more);
            }
            None => println!(" {} {:>3}  {}", marker, display, "loading...".dimmed()),
        }
    }
    println!();
}

/// Print every parameter slot
pub fn print_parameters(sync: &SyncController) {
    println!("\n{}", "Parameters:".bold());
    for (index, slot) in sync.parameters().iter().enumerate() {
        if slot.loading {
            println!("  {}  {}", index + 1, "loading...".dimmed());
            continue;
        }
        let modulated = if slot.is_modulated { " ~" } else { "" };
        let automated = if slot.has_automation { " A".yellow() } else { "".normal() };
        let touched = if slot.touched { " *" } else { "" };
        println!(
            "  {}  {:<14} {:>6.3}  {}{}{}{}",
            index + 1,
            slot.name,
            slot.value,
            slot.display_value.green(),
            modulated,
            automated,
            touched
        );
    }
    println!();
}
