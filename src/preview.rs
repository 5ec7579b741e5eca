//! Preview store - per-session scrollable copies of captured pane output

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A scrollable window over a list of lines
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    lines: Vec<String>,
    /// First visible line
    y_offset: usize,
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Replace the content, clamping the scroll offset to the new length
    pub fn set_content(&mut self, content: &str) {
        self.lines = if content.is_empty() {
            Vec::new()
        } else {
            content.lines().map(str::to_string).collect()
        };
        self.y_offset = self.y_offset.min(self.max_offset());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.y_offset = 0;
    }

    pub fn set_size(&mut self, width: usize, height: usize) {
        let pinned = self.at_bottom();
        self.width = width;
        self.height = height;
        if pinned {
            self.goto_bottom();
        } else {
            self.y_offset = self.y_offset.min(self.max_offset());
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn y_offset(&self) -> usize {
        self.y_offset
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.height)
    }

    pub fn at_bottom(&self) -> bool {
        self.y_offset >= self.max_offset()
    }

    pub fn goto_bottom(&mut self) {
        self.y_offset = self.max_offset();
    }

    pub fn goto_top(&mut self) {
        self.y_offset = 0;
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.y_offset = self.y_offset.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.y_offset = (self.y_offset + n).min(self.max_offset());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.height.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.height.max(1));
    }

    /// The lines currently in view
    pub fn visible(&self) -> &[String] {
        let end = (self.y_offset + self.height).min(self.lines.len());
        &self.lines[self.y_offset.min(end)..end]
    }
}

/// Mirror of one session's active pane
#[derive(Debug, Clone)]
pub struct SessionPreview {
    pub viewport: Viewport,
    /// Pane currently mirrored; captures for any other pane are dropped
    pub pane_id: String,
    pub last_content: String,
    pub last_changed: Option<DateTime<Utc>>,
    pub vars: BTreeMap<String, String>,
}

impl SessionPreview {
    pub fn new(pane_id: &str, width: usize, height: usize) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            pane_id: pane_id.to_string(),
            last_content: String::new(),
            last_changed: None,
            vars: BTreeMap::new(),
        }
    }

    /// Point the preview at a different pane, dropping the old pane's output
    pub fn retarget(&mut self, pane_id: &str) {
        if self.pane_id == pane_id {
            return;
        }
        log::debug!("Preview switching from {} to {}", self.pane_id, pane_id);
        self.pane_id = pane_id.to_string();
        self.last_content.clear();
        self.viewport.clear();
        self.vars.clear();
    }

    /// Apply a capture. Returns false when the content is unchanged.
    pub fn apply_capture(&mut self, content: &str, now: DateTime<Utc>) -> bool {
        let content = content.trim_end();
        if content == self.last_content {
            return false;
        }
        let pinned = self.viewport.at_bottom();
        self.viewport.set_content(content);
        if pinned {
            self.viewport.goto_bottom();
        }
        self.last_content = content.to_string();
        self.last_changed = Some(now);
        true
    }

    /// Whether the content changed within `window` of `now`
    pub fn pulsing(&self, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        let Some(changed) = self.last_changed else {
            return false;
        };
        let Ok(window) = chrono::Duration::from_std(window) else {
            return false;
        };
        changed <= now && now - changed < window
    }
}
