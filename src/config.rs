//! User configuration
//!
//! Built-in defaults live in the constants below. Most of the runtime tunables
//! can be overridden from `$XDG_CONFIG_HOME/muxwatch/config.toml`, and the
//! command line overrides the file.

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// GENERAL SETTINGS
// ============================================================================

/// How often tmux is polled for a fresh snapshot
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Deadline for every single tmux invocation
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Capture size bounds: `max(MIN, viewport height + SLACK)`, capped at MAX
pub const MIN_CAPTURE_LINES: usize = 120;
pub const MAX_CAPTURE_LINES: usize = 800;
pub const CAPTURE_SLACK_LINES: usize = 80;

/// Detached sessions idle for this long are considered stale
pub const STALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// How long a card stays highlighted after its content changes
pub const PULSE_DURATION: Duration = Duration::from_millis(1500);

/// Window in which a second ctrl+c (or esc) counts as a double press
pub const CHORD_WINDOW: Duration = Duration::from_millis(600);

/// Lifetime of footer toast messages
pub const TOAST_DURATION: Duration = Duration::from_secs(3);

/// Lines scrolled per wheel notch and per ctrl+u / ctrl+d
pub const SCROLL_STEP: usize = 3;

// ============================================================================
// LAYOUT
// ============================================================================

/// Smallest preview body height a card is given when space runs out
pub const MIN_PREVIEW_HEIGHT: u16 = 6;

/// Smallest inner width of a card
pub const MIN_INNER_WIDTH: u16 = 20;

/// Content width a column must offer before another column is added
pub const MIN_COLUMN_CONTENT_WIDTH: u16 = 66;

/// Horizontal padding inside the card border
pub const CARD_PADDING: u16 = 1;

/// Border plus padding on both sides
pub const CARD_CHROME_WIDTH: u16 = 2 + CARD_PADDING * 2;

/// Top border, header line, bottom border
pub const CARD_CHROME_HEIGHT: u16 = 3;

/// Card header controls
pub const CLOSE_LABEL: &str = "[x]";
pub const MAXIMIZE_LABEL: &str = "[^]";
pub const RESTORE_LABEL: &str = "[v]";
pub const COLLAPSE_LABEL: &str = "[-]";
pub const EXPAND_LABEL: &str = "[+]";

/// Space between header controls
pub const CONTROL_GAP: u16 = 1;

// ============================================================================
// KEYBINDINGS
// ============================================================================

pub const KEY_QUIT: KeyCode = KeyCode::Char('q');
pub const KEY_SEARCH: KeyCode = KeyCode::Char('/');
pub const KEY_SHOW_HIDDEN: KeyCode = KeyCode::Char('H');
pub const KEY_KILL_FOCUSED_STALE: KeyCode = KeyCode::Char('X');

/// Chords held with ctrl
pub const CTRL: KeyModifiers = KeyModifiers::CONTROL;
pub const KEY_PALETTE: KeyCode = KeyCode::Char('p');
pub const KEY_SEARCH_ALT: KeyCode = KeyCode::Char('f');
pub const KEY_KILL_ALL_STALE: KeyCode = KeyCode::Char('x');
pub const KEY_INTERRUPT: KeyCode = KeyCode::Char('c');
pub const KEY_SCROLL_UP: KeyCode = KeyCode::Char('u');
pub const KEY_SCROLL_DOWN: KeyCode = KeyCode::Char('d');

// ============================================================================
// COLORS
// ============================================================================

pub const COLOR_ACCENT: Color = Color::AnsiValue(62);
pub const COLOR_TITLE: Color = Color::AnsiValue(231);
pub const COLOR_MUTED: Color = Color::AnsiValue(245);
pub const COLOR_DIM: Color = Color::AnsiValue(240);
pub const COLOR_ERROR: Color = Color::AnsiValue(203);

pub const BORDER_BASE: Color = Color::AnsiValue(62);
pub const BORDER_FOCUS: Color = Color::AnsiValue(212);
pub const BORDER_PULSE: Color = Color::AnsiValue(213);
pub const BORDER_CURSOR: Color = Color::AnsiValue(111);
pub const BORDER_HOVER: Color = Color::AnsiValue(143);
pub const BORDER_EXIT_FAIL: Color = Color::AnsiValue(203);
pub const BORDER_EXIT_OK: Color = Color::AnsiValue(36);
pub const BORDER_STALE: Color = Color::AnsiValue(95);

pub const HEADER_BASE: Color = Color::AnsiValue(249);
pub const HEADER_FOCUS: Color = Color::AnsiValue(212);
pub const HEADER_PULSE: Color = Color::AnsiValue(219);
pub const HEADER_CURSOR: Color = Color::AnsiValue(111);
pub const HEADER_EXIT_FAIL: Color = Color::AnsiValue(203);
pub const HEADER_EXIT_OK: Color = Color::AnsiValue(37);
pub const HEADER_STALE: Color = Color::AnsiValue(103);

// ============================================================================
// RUNTIME SETTINGS
// ============================================================================

/// Optional overrides read from the config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    interval_ms: Option<u64>,
    tmux_path: Option<PathBuf>,
    command_timeout_ms: Option<u64>,
    min_capture_lines: Option<usize>,
    max_capture_lines: Option<usize>,
    capture_slack_lines: Option<usize>,
    stale_after_secs: Option<u64>,
}

/// Bounds on how much scrollback is captured per preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    pub min: usize,
    pub max: usize,
    pub slack: usize,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            min: MIN_CAPTURE_LINES,
            max: MAX_CAPTURE_LINES,
            slack: CAPTURE_SLACK_LINES,
        }
    }
}

impl CaptureLimits {
    /// Lines to capture for a viewport of the given height
    pub fn lines_for(&self, viewport_height: usize) -> usize {
        (viewport_height + self.slack).max(self.min).min(self.max)
    }
}

/// Resolved runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub poll_interval: Duration,
    pub tmux_path: Option<PathBuf>,
    pub command_timeout: Duration,
    pub capture: CaptureLimits,
    pub stale_after: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            tmux_path: None,
            command_timeout: COMMAND_TIMEOUT,
            capture: CaptureLimits::default(),
            stale_after: STALE_THRESHOLD,
        }
    }
}

impl Settings {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("muxwatch").join("config.toml"))
    }

    /// Load settings from `path`, falling back to defaults when the file does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();
        let Some(path) = path else {
            return Ok(settings);
        };
        if !path.exists() {
            return Ok(settings);
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file: FileConfig = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        settings.apply(file)?;

        log::debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    fn apply(&mut self, file: FileConfig) -> Result<()> {
        if let Some(ms) = file.interval_ms {
            anyhow::ensure!(ms > 0, "interval_ms must be greater than zero");
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(path) = file.tmux_path {
            self.tmux_path = Some(path);
        }
        if let Some(ms) = file.command_timeout_ms {
            anyhow::ensure!(ms > 0, "command_timeout_ms must be greater than zero");
            self.command_timeout = Duration::from_millis(ms);
        }
        if let Some(min) = file.min_capture_lines {
            self.capture.min = min;
        }
        if let Some(max) = file.max_capture_lines {
            self.capture.max = max;
        }
        if let Some(slack) = file.capture_slack_lines {
            self.capture.slack = slack;
        }
        anyhow::ensure!(
            self.capture.min <= self.capture.max,
            "min_capture_lines ({}) exceeds max_capture_lines ({})",
            self.capture.min,
            self.capture.max
        );
        if let Some(secs) = file.stale_after_secs {
            self.stale_after = Duration::from_secs(secs);
        }
        Ok(())
    }
}
