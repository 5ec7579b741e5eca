//! muxwatch - a live dashboard showing every tmux session as a grid of previews

mod config;
mod editor;
mod input;
mod layout;
mod model;
mod mouse;
mod palette;
mod preview;
mod render;
mod stale;
mod state;
mod tmux;
mod update;
mod view;
mod zone;

use anyhow::{Context, Result};
use clap::Parser;
use config::Settings;
use crossterm::{
    cursor::{Hide, Show},
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyModifiers, MouseButton, MouseEvent,
        MouseEventKind,
    },
    execute, queue,
    style::ResetColor,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use model::{Command, Message, Model};
use render::Compositor;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tmux::{Client, TmuxError};

/// Longest gap between frames while idle, so pulses and toasts expire on screen
const IDLE_REDRAW: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(name = "muxwatch", version, about = "Watch every tmux session at once")]
struct Cli {
    /// Poll interval, e.g. 500ms, 2s or 1m (bare numbers are seconds)
    #[arg(long, value_name = "DURATION", value_parser = parse_interval)]
    interval: Option<Duration>,

    /// Path to the tmux binary (default: search PATH)
    #[arg(long, value_name = "PATH")]
    tmux: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/muxwatch/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print one snapshot as JSON and exit
    #[arg(long)]
    dump: bool,

    /// Click at x,y once the first snapshot is on screen (implies --trace-mouse)
    #[arg(long, value_name = "X,Y", value_parser = parse_click)]
    debug_click: Option<(u16, u16)>,

    /// Log mouse hit-testing to stderr
    #[arg(long)]
    trace_mouse: bool,
}

/// Parse `500ms`, `2s`, `1m`, `1h` or a bare number of seconds
fn parse_interval(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {:?} (try 500ms, 2s or 1m)", value))?;
    let too_long = || format!("duration {:?} is too long", value);
    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(amount),
        "ms" => Duration::from_millis(amount),
        "m" => Duration::from_secs(amount.checked_mul(60).ok_or_else(too_long)?),
        "h" => Duration::from_secs(amount.checked_mul(60 * 60).ok_or_else(too_long)?),
        other => return Err(format!("unknown duration unit {:?} (use ms, s, m or h)", other)),
    };
    if duration.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(duration)
}

/// Parse an `x,y` screen coordinate
fn parse_click(value: &str) -> Result<(u16, u16), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {:?}", value))?;
    let coord = |part: &str| {
        part.trim()
            .parse::<u16>()
            .map_err(|_| format!("invalid coordinate {:?} in {:?}", part.trim(), value))
    };
    Ok((coord(x)?, coord(y)?))
}

fn init_logging(trace_mouse: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if trace_mouse {
        builder.filter_module(mouse::TRACE_TARGET, log::LevelFilter::Debug);
    }
    builder.init();
}

/// Built-in defaults, then the config file, then command-line flags
fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = match &cli.config {
        Some(path) => {
            anyhow::ensure!(path.exists(), "Config file {} does not exist", path.display());
            Some(path.clone())
        }
        None => Settings::default_path(),
    };
    let mut settings = Settings::load(path.as_deref())?;
    if let Some(interval) = cli.interval {
        settings.poll_interval = interval;
    }
    if let Some(tmux) = &cli.tmux {
        settings.tmux_path = Some(tmux.clone());
    }
    Ok(settings)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let trace_mouse = cli.trace_mouse || cli.debug_click.is_some();
    init_logging(trace_mouse);

    let settings = load_settings(&cli)?;
    let client = Client::new(settings.tmux_path.as_deref(), settings.command_timeout)
        .context("Cannot start without a tmux binary")?;
    log::debug!("Using tmux at {}", client.bin().display());

    if cli.dump {
        let snapshot = client.snapshot().context("Failed to read tmux state")?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let result = run(client, settings, trace_mouse, cli.debug_click);

    // Cleanup
    let _ = execute!(io::stdout(), DisableMouseCapture);
    let _ = terminal::disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, ResetColor, Show);

    result
}

/// Performs commands off the event loop and feeds the results back in
struct Runtime {
    client: Arc<Client>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    /// When the next poll tick fires; at most one is ever pending
    tick_at: Option<Instant>,
    poll_interval: Duration,
}

impl Runtime {
    fn new(client: Client, poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            client: Arc::new(client),
            tx,
            rx,
            tick_at: None,
            poll_interval,
        }
    }

    /// Start every command in the batch. Returns false when the batch asks to quit.
    fn dispatch(&mut self, cmds: Vec<Command>) -> bool {
        let quitting = cmds.contains(&Command::Quit);
        for cmd in cmds {
            match cmd {
                Command::Quit => {}
                Command::ScheduleTick => self.tick_at = Some(Instant::now() + self.poll_interval),
                // Keys sent alongside a quit must reach tmux before we exit
                Command::SendKeys { pane_id, keys } if quitting => {
                    if let Err(err) = self.client.send_keys(&pane_id, &keys) {
                        log::warn!("send-keys to {} failed: {}", pane_id, err);
                    }
                }
                other => self.spawn(other),
            }
        }
        !quitting
    }

    fn spawn(&self, cmd: Command) {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let job = cmd.clone();
        let spawned = thread::Builder::new()
            .name("muxwatch-tmux".to_string())
            .spawn(move || {
                if let Some(msg) = perform(&client, job) {
                    let _ = tx.send(msg);
                }
            });
        if let Err(source) = spawned {
            log::warn!("Failed to spawn worker thread: {}", source);
            // Report back so the fetch guard is released and polling continues
            if let Some(msg) = unperformed(cmd, source) {
                let _ = self.tx.send(msg);
            }
        }
    }

    /// Take the tick message if its deadline has passed
    fn due_tick(&mut self) -> Option<Message> {
        match self.tick_at {
            Some(at) if Instant::now() >= at => {
                self.tick_at = None;
                Some(Message::Tick)
            }
            _ => None,
        }
    }
}

/// Run one command against tmux, producing exactly one message
fn perform(client: &Client, cmd: Command) -> Option<Message> {
    let msg = match cmd {
        Command::FetchSnapshot => Message::Snapshot(client.snapshot()),
        Command::CapturePane {
            session_id,
            pane_id,
            lines,
        } => Message::PaneContent {
            result: client.capture_pane(&pane_id, lines),
            session_id,
            pane_id,
        },
        Command::FetchVars { session_id, pane_id } => Message::PaneVars {
            result: client.pane_variables(&pane_id),
            session_id,
            pane_id,
        },
        Command::SendKeys { pane_id, keys } => Message::KeysSent(client.send_keys(&pane_id, &keys)),
        Command::KillSessions { ids } => {
            let mut killed = Vec::with_capacity(ids.len());
            let mut error = None;
            for id in ids {
                match client.kill_session(&id) {
                    Ok(()) => killed.push(id),
                    Err(err) => {
                        error = Some(err);
                        break;
                    }
                }
            }
            Message::SessionsKilled { killed, error }
        }
        Command::ScheduleTick | Command::Quit => return None,
    };
    Some(msg)
}

/// The failure message for a command that never got to run
fn unperformed(cmd: Command, source: io::Error) -> Option<Message> {
    let err = |command: &str| TmuxError::Spawn {
        command: command.to_string(),
        source,
    };
    let msg = match cmd {
        Command::FetchSnapshot => Message::Snapshot(Err(err("list-sessions"))),
        Command::CapturePane {
            session_id,
            pane_id,
            ..
        } => Message::PaneContent {
            result: Err(err("capture-pane")),
            session_id,
            pane_id,
        },
        Command::FetchVars { session_id, pane_id } => Message::PaneVars {
            result: Err(err("show-options")),
            session_id,
            pane_id,
        },
        Command::SendKeys { .. } => Message::KeysSent(Err(err("send-keys"))),
        Command::KillSessions { .. } => Message::SessionsKilled {
            killed: Vec::new(),
            error: Some(err("kill-session")),
        },
        Command::ScheduleTick | Command::Quit => return None,
    };
    Some(msg)
}

fn draw(model: &mut Model, compositor: &mut Compositor) -> Result<()> {
    let frame = view::render(model);
    let mut stdout = io::stdout();
    queue!(stdout, Hide)?;
    compositor.draw(&mut stdout, &frame)?;
    stdout.flush()?;
    Ok(())
}

fn run(
    client: Client,
    settings: Settings,
    trace_mouse: bool,
    debug_click: Option<(u16, u16)>,
) -> Result<()> {
    let (width, height) = terminal::size().context("Failed to get terminal size")?;

    let mut runtime = Runtime::new(client, settings.poll_interval);
    let mut model = Model::new(settings, trace_mouse);
    model.width = width;
    model.height = height;
    let mut compositor = Compositor::new(width, height);
    let mut pending_click = debug_click;

    // Set up terminal
    terminal::enable_raw_mode().context("Failed to enable raw mode")?;
    execute!(io::stdout(), EnterAlternateScreen, SetTitle("muxwatch"), EnableMouseCapture)
        .context("Failed to set up the terminal")?;

    // Frame timing - target ~60fps max
    let frame_duration = Duration::from_micros(16667);
    let mut last_render = Instant::now();
    let mut needs_redraw = true;
    let mut resized = false;

    let mut running = runtime.dispatch(model.init());
    while running {
        // Results from background commands first
        let mut had_results = false;
        while let Ok(msg) = runtime.rx.try_recv() {
            had_results = true;
            let cmds = model.update(msg);
            running &= runtime.dispatch(cmds);
        }
        if let Some(tick) = runtime.due_tick() {
            let cmds = model.update(tick);
            running &= runtime.dispatch(cmds);
            needs_redraw = true;
        }
        needs_redraw |= had_results;
        if !running {
            break;
        }

        let since_render = Instant::now().duration_since(last_render);
        let poll_timeout = if needs_redraw && since_render >= frame_duration {
            Duration::ZERO
        } else if had_results {
            Duration::from_micros(500)
        } else {
            Duration::from_millis(16)
        };

        if event::poll(poll_timeout)? {
            let msg = match event::read()? {
                Event::Key(key) => Some(Message::Key(key)),
                Event::Mouse(mouse) => Some(Message::Mouse(mouse)),
                Event::Resize(w, h) => {
                    compositor.resize(w, h);
                    resized = true;
                    Some(Message::Resize(w, h))
                }
                _ => None,
            };
            if let Some(msg) = msg {
                let cmds = model.update(msg);
                running &= runtime.dispatch(cmds);
                needs_redraw = true;
            }
        }

        let since_render = Instant::now().duration_since(last_render);
        let frame_due = needs_redraw && since_render >= frame_duration;
        if running && (frame_due || since_render >= IDLE_REDRAW) {
            draw(&mut model, &mut compositor)?;
            last_render = Instant::now();
            needs_redraw = false;
            if resized {
                model.log_card_layout();
                resized = false;
            }

            // The startup click needs zones from a frame that shows the first snapshot
            if model.last_refresh.is_some() {
                if let Some((column, row)) = pending_click.take() {
                    model.log_card_layout();
                    log::debug!(
                        target: mouse::TRACE_TARGET,
                        "[debug-click] injecting click at ({},{})",
                        column,
                        row
                    );
                    let click = MouseEvent {
                        kind: MouseEventKind::Down(MouseButton::Left),
                        column,
                        row,
                        modifiers: KeyModifiers::NONE,
                    };
                    let cmds = model.update(Message::Mouse(click));
                    running &= runtime.dispatch(cmds);
                    needs_redraw = true;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_interval("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_interval("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_interval("3"), Ok(Duration::from_secs(3)));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("0ms").is_err());
        assert!(parse_interval("fast").is_err());
        assert!(parse_interval("2 weeks").is_err());
        assert!(parse_interval("").is_err());
        assert!(parse_interval("99999999999999999h").is_err());
        assert!(parse_interval("999999999999999999m").is_err());
    }

    #[test]
    fn test_unperformed_fetch_releases_guard() {
        let mut model = Model::new(Settings::default(), false);
        model.init();
        assert!(model.inflight);

        let failure = io::Error::new(io::ErrorKind::WouldBlock, "no threads left");
        let msg = unperformed(Command::FetchSnapshot, failure).unwrap();
        assert!(matches!(msg, Message::Snapshot(Err(TmuxError::Spawn { .. }))));

        let cmds = model.update(msg);
        assert!(!model.inflight);
        assert!(model.last_error.is_some());
        assert_eq!(cmds, [Command::ScheduleTick]);

        let failure = io::Error::new(io::ErrorKind::WouldBlock, "no threads left");
        assert!(unperformed(Command::Quit, failure).is_none());
    }

    #[test]
    fn test_parse_click() {
        assert_eq!(parse_click("10,4"), Ok((10, 4)));
        assert_eq!(parse_click(" 3 , 7 "), Ok((3, 7)));
        assert!(parse_click("10").is_err());
        assert!(parse_click("a,b").is_err());
        assert!(parse_click("-1,2").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let args = ["muxwatch", "--interval", "250ms", "--debug-click", "5,6", "--dump"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.interval, Some(Duration::from_millis(250)));
        assert_eq!(cli.debug_click, Some((5, 6)));
        assert!(cli.dump);
        assert!(!cli.trace_mouse);

        assert!(Cli::try_parse_from(["muxwatch", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["muxwatch", "--debug-click", "oops"]).is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "interval_ms = 4000\ntmux_path = \"/opt/tmux\"\n").unwrap();
        let path_str = path.to_str().unwrap();

        let cli = Cli::try_parse_from(["muxwatch", "--config", path_str]).unwrap();
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(4));
        assert_eq!(settings.tmux_path, Some(PathBuf::from("/opt/tmux")));

        let args = [
            "muxwatch",
            "--config",
            path_str,
            "--interval",
            "1s",
            "--tmux",
            "/bin/tmux",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.tmux_path, Some(PathBuf::from("/bin/tmux")));

        let args = ["muxwatch", "--config", "/nonexistent/muxwatch.toml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(load_settings(&cli).is_err());
    }
}
