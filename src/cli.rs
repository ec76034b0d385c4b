//! Interactive operator console
//!
//! Line-oriented REPL over the engine handle. Alongside the operator verbs
//! (assign, clear, rename, list, status) it offers `added` and `report` to
//! inject synthetic network notifications, so the full reconciliation loop
//! can be exercised on the console transport without any hardware attached.

use anyhow::{Context, Result};
use colored::*;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use crate::engine::{AssignReport, DeviceId, EngineHandle, SlotAddr, SlotIndex, SlotState};
use crate::protocol::{ValueEvent, ValueEventKind, COMMAND_CLASS_USER_CODE, USER_CODE_STATUS_BYTE};

/// Run the interactive console until `exit` or EOF
pub async fn run_repl(
    engine: EngineHandle,
    event_tx: mpsc::UnboundedSender<ValueEvent>,
) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("Lockslot GW console. Type 'help' for commands.");

    loop {
        match rl.readline("lockslot> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line == "exit" || line == "quit" {
                    break;
                }

                if let Err(e) = dispatch(&engine, &event_tx, line).await {
                    println!("{} {:#}", "Error:".red(), e);
                }
            }
            Err(_) => break,
        }
    }

    Ok(())
}

async fn dispatch(
    engine: &EngineHandle,
    event_tx: &mpsc::UnboundedSender<ValueEvent>,
    line: &str,
) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    match parts.as_slice() {
        ["help"] => print_help(),

        ["status"] => print_status(engine),

        ["list"] => print_slots(engine).await,

        ["assign", name, code] => match engine.assign_code(name, code).await {
            Ok(report) => print_assign_report(name, &report),
            Err(e) => println!("{} {}", "Rejected:".red(), e),
        },

        ["clear", name] => match engine.clear_code(name).await {
            Ok(cleared) if cleared.is_empty() => {
                println!("{}", format!("No slot is labeled '{}'", name).yellow());
            }
            Ok(cleared) => {
                for addr in &cleared {
                    println!("  {} {}", "clearing".green(), addr);
                }
                println!("Clear issued to {} slot(s), awaiting lock confirmation", cleared.len());
            }
            Err(e) => println!("{} {}", "Rejected:".red(), e),
        },

        ["rename", old_name, new_name] => match engine.rename_code(old_name, new_name).await {
            Ok(renamed) if renamed.is_empty() => {
                println!("{}", format!("No slot is labeled '{}'", old_name).yellow());
            }
            Ok(renamed) => {
                for addr in &renamed {
                    println!("  {} {}", "relabeled".green(), addr);
                }
            }
            Err(e) => println!("{} {}", "Rejected:".red(), e),
        },

        ["added", device, index] => {
            let (device, index) = parse_addr(device, index)?;
            let event = ValueEvent {
                device,
                command_class: COMMAND_CLASS_USER_CODE,
                index,
                kind: ValueEventKind::Added,
            };
            if event_tx.send(event).is_err() {
                println!("{}", "Event listener is gone; cannot inject".red());
            } else {
                println!("  injected: slot {} discovered", SlotAddr::new(device, index));
            }
        }

        ["report", device, index, occupied] => {
            let (device, index) = parse_addr(device, index)?;
            let occupied = parse_occupied(occupied)?;

            // Synthesize the smallest frame that carries a status byte
            let mut frame = vec![0u8; USER_CODE_STATUS_BYTE + 1];
            frame[USER_CODE_STATUS_BYTE] = occupied as u8;

            let event = ValueEvent {
                device,
                command_class: COMMAND_CLASS_USER_CODE,
                index,
                kind: ValueEventKind::Changed { frame },
            };
            if event_tx.send(event).is_err() {
                println!("{}", "Event listener is gone; cannot inject".red());
            } else {
                println!(
                    "  injected: slot {} reported {}",
                    SlotAddr::new(device, index),
                    if occupied { "occupied" } else { "empty" }
                );
            }
        }

        _ => {
            println!("Unknown command: '{}'. Type 'help' for commands.", line);
        }
    }

    Ok(())
}

fn print_help() {
    println!("\n{}", "Commands:".bold());
    println!("  assign <name> <code>       set a code on every lock with a free slot");
    println!("  clear <name>               clear every slot labeled <name>");
    println!("  rename <old> <new>         relabel slots without touching the locks");
    println!("  list                       show every known slot and its state");
    println!("  status                     refresh backlog and last save time");
    println!("  added <dev> <idx>          inject a slot-discovered notification");
    println!("  report <dev> <idx> <0|1>   inject an occupancy report");
    println!("  exit                       quit\n");
}

fn print_status(engine: &EngineHandle) {
    let status = engine.status();

    let saved = if status.modtime == 0 {
        "never".to_string()
    } else {
        match chrono::DateTime::from_timestamp(status.modtime as i64, 0) {
            Some(utc) => utc
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => format!("@{}", status.modtime),
        }
    };

    println!("  Awaiting refresh: {}", status.to_string().yellow());
    println!("  Last saved:       {}", saved);
    println!(
        "  Engine:           {}",
        if engine.is_alive() { "running".green() } else { "stopped".red() }
    );
}

async fn print_slots(engine: &EngineHandle) {
    let slots = engine.list_slots().await;
    if slots.is_empty() {
        println!("{}", "No slots known yet.".yellow());
        return;
    }

    let mut current_device: Option<DeviceId> = None;
    for (addr, state) in slots {
        if current_device != Some(addr.device) {
            println!("{}", format!("Device {}:", addr.device).bold());
            current_device = Some(addr.device);
        }

        let rendered = match &state {
            SlotState::Named(_) => state.to_string().green(),
            SlotState::PendingAssign(_) | SlotState::PendingClear(_) => {
                state.to_string().yellow()
            }
            SlotState::Unknown => state.to_string().cyan(),
            SlotState::Unassigned => state.to_string().normal(),
        };
        println!("  slot {:>3}: {}", addr.index.to_string(), rendered);
    }
}

fn print_assign_report(name: &str, report: &AssignReport) {
    for addr in &report.assigned {
        println!("  {} {}", "assigned".green(), addr);
    }
    for device in &report.skipped {
        println!("  {} device {} (no free slot)", "skipped".red(), device);
    }

    if report.assigned.is_empty() {
        println!("{}", "No device had a free slot; nothing was assigned.".yellow());
    } else {
        println!(
            "'{}' pending on {} device(s), awaiting lock confirmation",
            name,
            report.assigned.len()
        );
    }
}

fn parse_addr(device: &str, index: &str) -> Result<(DeviceId, SlotIndex)> {
    let device: u32 = device
        .parse()
        .with_context(|| format!("'{}' is not a device id", device))?;
    let index: u8 = index
        .parse()
        .with_context(|| format!("'{}' is not a slot index", index))?;
    Ok((DeviceId(device), SlotIndex(index)))
}

fn parse_occupied(word: &str) -> Result<bool> {
    match word {
        "1" | "true" | "occupied" => Ok(true),
        "0" | "false" | "empty" => Ok(false),
        other => anyhow::bail!("'{}' is not an occupancy (use 0/1, empty/occupied)", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addr() {
        let (device, index) = parse_addr("4", "30").unwrap();
        assert_eq!(device, DeviceId(4));
        assert_eq!(index, SlotIndex(30));

        assert!(parse_addr("four", "1").is_err());
        assert!(parse_addr("4", "300").is_err());
    }

    #[test]
    fn test_parse_occupied_accepts_aliases() {
        assert_eq!(parse_occupied("1").unwrap(), true);
        assert_eq!(parse_occupied("occupied").unwrap(), true);
        assert_eq!(parse_occupied("0").unwrap(), false);
        assert_eq!(parse_occupied("empty").unwrap(), false);
        assert!(parse_occupied("maybe").is_err());
    }
}
