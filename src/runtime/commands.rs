//! Line-oriented control over stdin.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Deserialize;
use serde::de::IntoDeserializer;
use serde::de::value::{Error as ValueError, StrDeserializer};
use tracing::{debug, warn};

use crate::config::{PlayModeSetting, RepeatModeSetting};
use crate::error::{Error, Result};
use crate::mpris::ControlCmd;

pub const HELP: &str = "commands: play | pause | toggle | stop | next | prev | \
seek <secs|+secs|-secs> | goto <seq> | song <id> | add <path> | insert <index> <path> | \
clear | list | mode <sequence|random|smart|custom> | repeat [off|all|one] | status | quit";

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidArgument(msg.into())
}

/// Parse a mode word with the same names and aliases the config file accepts.
fn parse_setting<'de, T: Deserialize<'de>>(word: &'de str) -> Option<T> {
    let de: StrDeserializer<'de, ValueError> = word.into_deserializer();
    T::deserialize(de).ok()
}

fn parse_seek(arg: &str) -> Result<ControlCmd> {
    let secs: f64 = arg
        .trim_start_matches('+')
        .parse()
        .map_err(|_| invalid(format!("not a number of seconds: {arg}")))?;
    if !secs.is_finite() {
        return Err(invalid(format!("not a number of seconds: {arg}")));
    }

    if arg.starts_with('+') || arg.starts_with('-') {
        return Ok(ControlCmd::SeekBy((secs * 1_000_000.0).round() as i64));
    }
    Duration::try_from_secs_f64(secs)
        .map(ControlCmd::SeekTo)
        .map_err(|_| invalid(format!("seek target out of range: {arg}")))
}

/// Everything after the first word, with surrounding space trimmed.
fn tail(line: &str) -> &str {
    line.trim()
        .split_once(char::is_whitespace)
        .map_or("", |(_, rest)| rest.trim_start())
}

fn parse_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        return Err(invalid("missing path"));
    }
    Ok(PathBuf::from(path))
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ControlCmd>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    let verb = verb.to_ascii_lowercase();

    let cmd = match (verb.as_str(), arg) {
        ("play", None) => ControlCmd::Play,
        ("pause", None) => ControlCmd::Pause,
        ("toggle" | "play-pause", None) => ControlCmd::PlayPause,
        ("stop", None) => ControlCmd::Stop,
        ("next", None) => ControlCmd::Next,
        ("prev" | "previous", None) => ControlCmd::Prev,
        ("status", None) => ControlCmd::Status,
        ("quit" | "exit", None) => ControlCmd::Quit,
        ("seek", Some(a)) => parse_seek(a)?,
        ("goto", Some(a)) => ControlCmd::Goto(
            a.parse()
                .map_err(|_| invalid(format!("not a sequence number: {a}")))?,
        ),
        ("song", Some(a)) => ControlCmd::PlaySong(
            a.parse()
                .map_err(|_| invalid(format!("not a song id: {a}")))?,
        ),
        ("add", Some(_)) => ControlCmd::Enqueue {
            path: parse_path(tail(line))?,
            index: None,
        },
        ("insert", Some(a)) => ControlCmd::Enqueue {
            index: Some(
                a.parse()
                    .map_err(|_| invalid(format!("not an insert index: {a}")))?,
            ),
            path: parse_path(tail(tail(line)))?,
        },
        ("clear", None) => ControlCmd::Clear,
        ("list" | "queue", None) => ControlCmd::List,
        ("repeat", None) => ControlCmd::CycleRepeat,
        ("mode", Some(a)) => {
            let mode: PlayModeSetting = parse_setting(&a.to_ascii_lowercase())
                .ok_or_else(|| invalid(format!("unknown play mode: {a}")))?;
            ControlCmd::SetPlayMode(mode.into())
        }
        ("repeat", Some(a)) => {
            let mode: RepeatModeSetting = parse_setting(&a.to_ascii_lowercase())
                .ok_or_else(|| invalid(format!("unknown repeat mode: {a}")))?;
            ControlCmd::SetRepeatMode(mode.into())
        }
        _ => return Err(invalid(format!("unrecognised command: {}", line.trim()))),
    };
    Ok(Some(cmd))
}

/// Forward parsed stdin lines to the player loop until stdin closes.
pub fn spawn_stdin_reader(tx: Sender<ControlCmd>) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            if line.trim().eq_ignore_ascii_case("help") {
                eprintln!("{HELP}");
                continue;
            }
            match parse_command(&line) {
                Ok(Some(cmd)) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "ignored input");
                    eprintln!("{HELP}");
                }
            }
        }
        debug!("stdin closed");
    })
}
