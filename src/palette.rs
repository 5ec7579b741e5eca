//! Command palette - context-sensitive actions rebuilt each time it opens

use crate::config::{COLOR_ACCENT, COLOR_DIM, COLOR_MUTED, COLOR_TITLE};
use crate::model::{Command, Model, ViewMode};
use crate::render::{Canvas, Style};
use unicode_width::UnicodeWidthStr;

/// What a palette entry does when executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaletteAction {
    KillFocusedStale(String),
    KillAllStale,
    ShowHidden,
    ForceRefresh,
    ToggleCollapse(String),
    ExpandAll,
    OverviewTab,
    SessionTab(String),
    PrintLayout,
    FocusSearch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteItem {
    pub label: String,
    pub enabled: bool,
    pub action: PaletteAction,
}

/// Palette visibility, entries and selection
#[derive(Debug, Clone, Default)]
pub struct Palette {
    pub open: bool,
    pub items: Vec<PaletteItem>,
    pub index: usize,
}

impl Palette {
    pub fn close(&mut self) {
        self.open = false;
        self.items.clear();
        self.index = 0;
    }

    /// Move the selection, wrapping at both ends
    pub fn move_selection(&mut self, delta: isize) {
        let len = self.items.len() as isize;
        if len == 0 {
            return;
        }
        self.index = (self.index as isize + delta).rem_euclid(len) as usize;
    }

    pub fn selected(&self) -> Option<&PaletteItem> {
        self.items.get(self.index)
    }
}

impl Model {
    pub fn open_palette(&mut self) {
        self.palette.items = self.build_palette_items();
        self.palette.index = 0;
        self.palette.open = true;
    }

    /// Entries reflecting the current state
    pub fn build_palette_items(&self) -> Vec<PaletteItem> {
        let mut items = Vec::new();
        let item = |label: String, enabled: bool, action: PaletteAction| PaletteItem {
            label,
            enabled,
            action,
        };

        if let Some(focused) = &self.focused {
            items.push(item(
                "Kill focused stale session".to_string(),
                self.is_stale(focused),
                PaletteAction::KillFocusedStale(focused.clone()),
            ));
        }

        let stale = self.stale_ids().len();
        items.push(item(
            format!("Kill all stale sessions ({})", stale),
            stale > 0,
            PaletteAction::KillAllStale,
        ));
        items.push(item(
            "Show hidden sessions".to_string(),
            !self.hidden.is_empty(),
            PaletteAction::ShowHidden,
        ));
        items.push(item(
            "Force refresh from tmux".to_string(),
            true,
            PaletteAction::ForceRefresh,
        ));

        if let Some(focused) = &self.focused {
            let label = if self.is_collapsed(focused) {
                "Expand focused card"
            } else {
                "Collapse focused card"
            };
            items.push(item(
                label.to_string(),
                true,
                PaletteAction::ToggleCollapse(focused.clone()),
            ));
        }
        items.push(item(
            "Expand all cards".to_string(),
            !self.collapsed.is_empty(),
            PaletteAction::ExpandAll,
        ));

        items.push(item(
            "Switch to Overview tab".to_string(),
            self.view_mode != ViewMode::Overview,
            PaletteAction::OverviewTab,
        ));
        let target = self
            .detail_session()
            .map(str::to_string)
            .or_else(|| self.focused.clone())
            .or_else(|| self.remembered_detail.clone());
        if let Some(target) = target {
            let label = self
                .session(&target)
                .map(|s| s.label().to_string())
                .unwrap_or_else(|| target.clone());
            items.push(item(
                format!("Switch to {} tab", label),
                self.detail_session() != Some(target.as_str()),
                PaletteAction::SessionTab(target),
            ));
        }

        items.push(item(
            "Print card layout (stderr)".to_string(),
            !self.layout.cards.is_empty(),
            PaletteAction::PrintLayout,
        ));
        items.push(item(
            "Focus search bar (/)".to_string(),
            !self.searching,
            PaletteAction::FocusSearch,
        ));
        items
    }

    /// Close the palette, then run the selected entry if it is enabled
    pub fn execute_palette_selection(&mut self) -> Vec<Command> {
        let selected = self.palette.selected().cloned();
        self.palette.close();
        match selected {
            Some(item) if item.enabled => self.run_palette_action(item.action),
            _ => Vec::new(),
        }
    }

    fn run_palette_action(&mut self, action: PaletteAction) -> Vec<Command> {
        match action {
            PaletteAction::KillFocusedStale(id) => {
                if !self.is_stale(&id) {
                    return Vec::new();
                }
                vec![Command::KillSessions { ids: vec![id] }]
            }
            PaletteAction::KillAllStale => {
                let ids = self.stale_ids();
                if ids.is_empty() {
                    return Vec::new();
                }
                vec![Command::KillSessions { ids }]
            }
            PaletteAction::ShowHidden => {
                self.show_hidden();
                Vec::new()
            }
            PaletteAction::ForceRefresh => self.force_refresh(),
            PaletteAction::ToggleCollapse(id) => {
                self.toggle_collapsed(&id);
                Vec::new()
            }
            PaletteAction::ExpandAll => {
                self.collapsed.clear();
                Vec::new()
            }
            PaletteAction::OverviewTab => {
                self.set_active_tab(0);
                Vec::new()
            }
            PaletteAction::SessionTab(id) => {
                self.enter_detail(&id);
                self.fetch_focused_vars()
            }
            PaletteAction::PrintLayout => {
                self.log_card_layout();
                Vec::new()
            }
            PaletteAction::FocusSearch => {
                self.start_search();
                Vec::new()
            }
        }
    }

    /// Palette drawn as a standalone bordered block
    pub fn render_palette(&self) -> Canvas {
        let title = "command palette";
        let lines: Vec<(String, Style)> = if self.palette.items.is_empty() {
            vec![("no actions available".to_string(), Style::fg(COLOR_MUTED))]
        } else {
            self.palette
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let selected = i == self.palette.index;
                    let marker = if selected { "▸ " } else { "  " };
                    let mut style = Style::fg(if item.enabled { COLOR_TITLE } else { COLOR_DIM });
                    if selected {
                        style = style.bold();
                    }
                    (format!("{}{}", marker, item.label), style)
                })
                .collect()
        };

        let content_width = lines
            .iter()
            .map(|(text, _)| text.width())
            .chain(std::iter::once(title.width()))
            .max()
            .unwrap_or(0) as u16;
        // Border and two cells of padding on each side, one blank line above and below
        let width = content_width + 6;
        let height = lines.len() as u16 + 5;

        let mut canvas = Canvas::new(width, height);
        let border = Style::fg(COLOR_ACCENT);
        draw_box(&mut canvas, 0, 0, width, height, border);
        canvas.fill(1, 1, width - 2, height - 2, ' ', Style::default());
        canvas.put_str(3, 2, title, Style::fg(COLOR_TITLE).bold(), content_width);
        for (row, (text, style)) in lines.iter().enumerate() {
            canvas.put_str(3, 3 + row as u16, text, *style, content_width);
        }
        canvas
    }
}

/// Rounded border around a rectangle
pub fn draw_box(canvas: &mut Canvas, x: u16, y: u16, width: u16, height: u16, style: Style) {
    if width < 2 || height < 2 {
        return;
    }
    let right = x + width - 1;
    let bottom = y + height - 1;
    canvas.fill(x + 1, y, width - 2, 1, '─', style);
    canvas.fill(x + 1, bottom, width - 2, 1, '─', style);
    canvas.fill(x, y + 1, 1, height - 2, '│', style);
    canvas.fill(right, y + 1, 1, height - 2, '│', style);
    canvas.put_str(x, y, "╭", style, 1);
    canvas.put_str(right, y, "╮", style, 1);
    canvas.put_str(x, bottom, "╰", style, 1);
    canvas.put_str(right, bottom, "╯", style, 1);
}
