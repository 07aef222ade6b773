//! dirwatch - print normalized change events for a directory tree
//!
//! Entry point for the `dirwatch` command.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use dirwatch::observability::init_tracing;
use dirwatch::watcher::DEFAULT_MAX_PATH_LEN;
use dirwatch::{Event, EventMask, FileEvent, WatchConfig};

/// dirwatch - print normalized change events for a directory tree
#[derive(Parser, Debug)]
#[command(name = "dirwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to watch
    #[arg(env = "DIRWATCH_ROOT")]
    root: PathBuf,

    /// Watch the root directory only
    #[arg(long, env = "DIRWATCH_NO_RECURSIVE")]
    no_recursive: bool,

    /// Poll without blocking, sleeping between polls
    #[arg(long, env = "DIRWATCH_NON_BLOCKING")]
    non_blocking: bool,

    /// Sleep between non-blocking polls, in milliseconds
    #[arg(long, env = "DIRWATCH_INTERVAL_MS", default_value = "100")]
    interval_ms: u64,

    /// Event kinds to report (default: all)
    #[arg(long, env = "DIRWATCH_EVENTS", value_delimiter = ',')]
    events: Vec<EventArg>,

    /// Path capacity in bytes
    #[arg(long, env = "DIRWATCH_MAX_PATH_LEN", default_value_t = DEFAULT_MAX_PATH_LEN)]
    max_path_len: usize,

    /// Print one JSON object per event
    #[arg(long, env = "DIRWATCH_JSON")]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DIRWATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "DIRWATCH_LOG_JSON")]
    log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventArg {
    Create,
    Remove,
    Modify,
    Move,
}

impl Cli {
    fn event_mask(&self) -> EventMask {
        if self.events.is_empty() {
            return EventMask::ALL;
        }
        self.events
            .iter()
            .fold(EventMask::empty(), |mask, arg| {
                mask | match arg {
                    EventArg::Create => EventMask::CREATE,
                    EventArg::Remove => EventMask::REMOVE,
                    EventArg::Modify => EventMask::MODIFY,
                    EventArg::Move => EventMask::MOVE,
                }
            })
    }

    fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            root: self.root.clone(),
            recursive: !self.no_recursive,
            blocking: !self.non_blocking,
            events: self.event_mask(),
            max_path_len: self.max_path_len,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!("dirwatch v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = cli.watch_config();
    tracing::debug!(?config, "Configuration loaded");

    run(&config, cli.json, cli.interval_ms)
}

#[cfg(target_os = "linux")]
fn run(config: &WatchConfig, json: bool, interval_ms: u64) -> anyhow::Result<()> {
    use dirwatch::NativeWatcher;

    let mut watcher = NativeWatcher::open(config, None)
        .with_context(|| format!("cannot watch {}", config.root.display()))?;

    let stdout = io::stdout();
    let interval = std::time::Duration::from_millis(interval_ms);

    loop {
        let mut out = stdout.lock();
        let mut closed = None;
        watcher.poll(
            &mut |event: Event<'_>| match print_event(&mut out, event, json) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    closed = Some(e);
                    ControlFlow::Break(())
                }
            },
            None,
        );
        let flushed = out.flush();
        drop(out);

        if let Some(e) = closed.or_else(|| flushed.err()) {
            tracing::info!(error = %e, stats = ?watcher.stats(), "Output closed, stopping");
            return Ok(());
        }

        if !config.blocking {
            std::thread::sleep(interval);
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn run(_config: &WatchConfig, _json: bool, _interval_ms: u64) -> anyhow::Result<()> {
    anyhow::bail!("no native notification source on this platform")
}

fn print_event(out: &mut impl Write, event: Event<'_>, json: bool) -> io::Result<()> {
    if json {
        let line = serde_json::to_string(&FileEvent::from(event))?;
        return writeln!(out, "{line}");
    }

    let show = |path: Option<&std::path::Path>| {
        path.map_or_else(|| "(outside)".to_string(), |p| p.display().to_string())
    };
    match event {
        Event::Create(path) => writeln!(out, "create   {}", path.display()),
        Event::Remove(path) => writeln!(out, "remove   {}", path.display()),
        Event::Modify(path) => writeln!(out, "modify   {}", path.display()),
        Event::Move { from, to } => writeln!(out, "move     {} -> {}", show(from), show(to)),
        Event::Overflow => writeln!(out, "overflow (events were lost)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["dirwatch", "/tmp/w"]).unwrap();
        let config = cli.watch_config();
        assert_eq!(config.root, PathBuf::from("/tmp/w"));
        assert!(config.recursive);
        assert!(config.blocking);
        assert_eq!(config.events, EventMask::ALL);
    }

    #[test]
    fn test_cli_event_list() {
        let cli = Cli::try_parse_from([
            "dirwatch",
            "--events",
            "create,move",
            "--no-recursive",
            "--non-blocking",
            "/tmp/w",
        ])
        .unwrap();
        let config = cli.watch_config();
        assert_eq!(config.events, EventMask::CREATE | EventMask::MOVE);
        assert!(!config.recursive);
        assert!(!config.blocking);
    }

    #[test]
    fn test_cli_rejects_unknown_event() {
        assert!(Cli::try_parse_from(["dirwatch", "--events", "rename", "/tmp/w"]).is_err());
    }

    #[test]
    fn test_print_text() {
        let mut out = Vec::new();
        print_event(
            &mut out,
            Event::Move {
                from: None,
                to: Some(Path::new("/w/b")),
            },
            false,
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "move     (outside) -> /w/b\n");
    }

    #[test]
    fn test_print_json() {
        let mut out = Vec::new();
        print_event(&mut out, Event::Remove(Path::new("/w/a")), true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"event\":\"remove\",\"path\":\"/w/a\"}\n"
        );
    }
}
