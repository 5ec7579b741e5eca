//! Frame composition
//!
//! A frame is built top to bottom: title bar, search prompt or filter summary,
//! tab strip, the card grid, then the footer. Header and footer are measured
//! first and the grid is clamped to whatever rows remain. The command palette
//! is stamped over the finished frame.

use crate::config::{
    BORDER_BASE, BORDER_CURSOR, BORDER_EXIT_FAIL, BORDER_EXIT_OK, BORDER_FOCUS, BORDER_HOVER,
    BORDER_PULSE, BORDER_STALE, CLOSE_LABEL, COLLAPSE_LABEL, COLOR_ACCENT, COLOR_DIM, COLOR_ERROR,
    COLOR_MUTED, COLOR_TITLE, EXPAND_LABEL, HEADER_BASE, HEADER_CURSOR, HEADER_EXIT_FAIL,
    HEADER_EXIT_OK, HEADER_FOCUS, HEADER_PULSE, HEADER_STALE, MAXIMIZE_LABEL, PULSE_DURATION,
    RESTORE_LABEL,
};
use crate::layout::{controls_width, CardLayout, CardSlot, Grid, GridLayout, Layout, Monocle, Rect};
use crate::model::Model;
use crate::palette::draw_box;
use crate::render::{truncate, Canvas, Style};
use crate::stale;
use crate::tmux::{Pane, Session, Window};
use crate::zone::ZoneTarget;
use chrono::{DateTime, Utc};
use crossterm::style::Color;
use unicode_width::UnicodeWidthStr;

/// Left padding of header and footer lines
const INDENT: u16 = 2;

const EMPTY_MESSAGE: &str = "No tmux sessions detected.";
const EMPTY_HINT: &str = "Start one with `tmux new -s demo`.";

/// Compose the full frame for the current terminal size.
/// Rebuilds the card layout and mouse zones as a side effect.
pub fn render(model: &mut Model) -> Canvas {
    let (width, height) = (model.width, model.height);
    model.zones.clear();
    if width == 0 || height == 0 {
        return Canvas::new(width, height);
    }
    let now = Utc::now();

    let header = render_header(model, width, now);
    let footer = render_footer(model, width);
    let available = height
        .saturating_sub(header.height())
        .saturating_sub(footer.height());
    let grid = render_grid(model, Rect::new(0, header.height(), width, available), now);

    let mut frame = header;
    frame.push_below(&grid);
    frame.push_below(&footer);
    frame.fit(width, height);

    if model.palette.open {
        frame = overlay_centered(&frame, &model.render_palette());
    }
    frame
}

/// Copy the non-empty cells of `block` over `base`, centred.
/// The result grows when `block` does not fit inside `base`.
pub fn overlay_centered(base: &Canvas, block: &Canvas) -> Canvas {
    let width = base.width().max(block.width());
    let height = base.height().max(block.height());
    let mut out = base.clone();
    out.grow(width, height);
    let x = (width - block.width()) / 2;
    let y = (height - block.height()) / 2;
    out.stamp(block, x, y);
    out
}

// ============================================================================
// HEADER
// ============================================================================

fn render_header(model: &mut Model, width: u16, now: DateTime<Utc>) -> Canvas {
    let mut canvas = Canvas::new(width, 1);

    let bar = Style::fg(COLOR_TITLE).on(COLOR_ACCENT);
    canvas.fill(0, 0, width, 1, ' ', bar);
    let room = width.saturating_sub(INDENT);
    let name_width = canvas.put_str(INDENT, 0, "muxwatch", bar.bold(), room);
    let meta_x = INDENT + name_width + INDENT * 2;
    canvas.put_str(
        meta_x,
        0,
        &title_meta(model, now),
        Style::fg(HEADER_BASE).on(COLOR_ACCENT),
        width.saturating_sub(meta_x + INDENT),
    );

    if model.searching {
        let row = canvas.height();
        canvas.grow(width, row + 1);
        draw_search_bar(&mut canvas, model, row, width);
    } else if !model.search_query.is_empty() {
        let row = canvas.height();
        canvas.grow(width, row + 1);
        let summary = format!("Filter: {} (press / to edit, esc to clear)", model.search_query);
        canvas.put_str(INDENT, row, &summary, Style::fg(COLOR_ACCENT), room);
    }

    draw_tabs(&mut canvas, model, width);

    // Blank line between the header and the grid
    let rows = canvas.height();
    canvas.grow(width, rows + 1);
    canvas
}

fn title_meta(model: &Model, now: DateTime<Utc>) -> String {
    let mut parts = vec![format!("{} sessions", model.sessions.len())];
    if let Some(refreshed) = model.last_refresh {
        parts.push(format!("refreshed {} ago", coarse_duration(now - refreshed)));
    }
    if let Some(focused) = &model.focused {
        parts.push(format!("focus {}", focused));
    }
    if !model.search_query.is_empty() {
        parts.push(format!("filter {:?}", model.search_query));
    }
    parts.join(" • ")
}

fn draw_search_bar(canvas: &mut Canvas, model: &Model, row: u16, width: u16) {
    let label_width = canvas.put_str(INDENT - 1, row, "Search", Style::fg(COLOR_ACCENT), width);
    let x = INDENT - 1 + label_width + 1;
    let prompt = "> ";
    let prompt_style = Style::fg(COLOR_MUTED);
    let prompt_width = canvas.put_str(x, row, prompt, prompt_style, width.saturating_sub(x));
    let value_x = x + prompt_width;
    let value = model.search.value();
    canvas.put_str(value_x, row, &value, Style::fg(COLOR_TITLE), width.saturating_sub(value_x));

    let before: String = value.chars().take(model.search.cursor()).collect();
    let cursor_x = value_x + before.width() as u16;
    let under = value.chars().nth(model.search.cursor()).unwrap_or(' ');
    let cursor = Style::fg(COLOR_TITLE).reverse();
    canvas.put_str(cursor_x, row, &under.to_string(), cursor, width.saturating_sub(cursor_x));
}

/// Tab titles, wrapping onto more rows when they do not fit
fn draw_tabs(canvas: &mut Canvas, model: &mut Model, width: u16) {
    let titles = model.tab_titles();
    if titles.len() <= 1 {
        return;
    }
    let active = match model.detail_session() {
        Some(id) => model.tab_index_for(id),
        None => 0,
    };

    let top = canvas.height();
    let mut row = top;
    let mut x = 0u16;
    canvas.grow(width, row + 1);
    for (index, title) in titles.iter().enumerate() {
        let label = format!(" {} ", truncate(title, width.saturating_sub(2) as usize));
        let label_width = label.width() as u16;
        if x > 0 && x + label_width > width {
            row += 1;
            x = 0;
            canvas.grow(width, row + 1);
        }
        let style = if index == active {
            Style::fg(COLOR_TITLE).on(COLOR_ACCENT).bold()
        } else {
            Style::fg(COLOR_MUTED)
        };
        let written = canvas.put_str(x, row, &label, style, width.saturating_sub(x));
        model.zones.mark(ZoneTarget::Tab(index), Rect::new(x, row, written, 1));
        x += written + 1;
    }
}

// ============================================================================
// GRID
// ============================================================================

fn render_grid(model: &mut Model, area: Rect, now: DateTime<Utc>) -> Canvas {
    let detail = model.detail_session().map(str::to_string);
    let slots_owned: Vec<(String, bool)> = model
        .visible_sessions()
        .iter()
        .map(|s| (s.id.clone(), detail.is_none() && model.is_collapsed(&s.id)))
        .collect();

    if slots_owned.is_empty() {
        model.layout = GridLayout::default();
        model.card_cols = 1;
        return empty_state(area);
    }

    let slots: Vec<CardSlot> = slots_owned
        .iter()
        .map(|(id, collapsed)| CardSlot {
            session_id: id,
            collapsed: *collapsed,
        })
        .collect();
    let engine: &dyn Layout = if detail.is_some() { &Monocle } else { &Grid };
    let layout = engine.arrange(&slots, area);
    log::trace!(
        "{} layout: {} cards in {} columns",
        engine.name(),
        layout.cards.len(),
        layout.columns
    );

    for card in &layout.cards {
        if card.body.height > 0 {
            if let Some(preview) = model.previews.get_mut(&card.session_id) {
                preview
                    .viewport
                    .set_size(card.body.width as usize, card.body.height as usize);
            }
        }
        mark_card_zones(model, card, area);
    }

    let mut canvas = Canvas::new(area.width, layout.height().max(area.height));
    for card in &layout.cards {
        draw_card(&mut canvas, model, card, area, now);
    }
    // Clamp at a whole row so the footer keeps its place
    canvas.truncate_rows(area.height);
    canvas.fit(area.width, area.height);

    model.card_cols = layout.columns.max(1);
    model.layout = layout;
    canvas
}

/// Register the card and then its controls, so the controls win on overlap
fn mark_card_zones(model: &mut Model, card: &CardLayout, area: Rect) {
    if card.rect.y >= area.bottom() {
        return;
    }
    let visible_height = card.rect.height.min(area.bottom() - card.rect.y);
    let id = &card.session_id;
    model.zones.mark(
        ZoneTarget::Card(id.clone()),
        Rect::new(card.rect.x, card.rect.y, card.rect.width, visible_height),
    );
    if card.header.y < area.bottom() {
        model.zones.mark(ZoneTarget::Collapse(id.clone()), card.collapse);
        model.zones.mark(ZoneTarget::Maximize(id.clone()), card.maximize);
        model.zones.mark(ZoneTarget::Close(id.clone()), card.close);
    }
}

/// Border and header colours, highest priority first
fn card_colors(
    pane: Option<&Pane>,
    stale: bool,
    focused: bool,
    pulsing: bool,
    hovered: bool,
    cursor: bool,
) -> (Color, Color) {
    match pane {
        Some(p) if p.dead && p.dead_status != 0 => return (BORDER_EXIT_FAIL, HEADER_EXIT_FAIL),
        Some(p) if p.dead => return (BORDER_EXIT_OK, HEADER_EXIT_OK),
        _ => {}
    }
    if stale {
        (BORDER_STALE, HEADER_STALE)
    } else if focused {
        (BORDER_FOCUS, HEADER_FOCUS)
    } else if pulsing {
        (BORDER_PULSE, HEADER_PULSE)
    } else if hovered {
        (BORDER_HOVER, HEADER_BASE)
    } else if cursor {
        (BORDER_CURSOR, HEADER_CURSOR)
    } else {
        (BORDER_BASE, HEADER_BASE)
    }
}

/// `session · window · pane` followed by exit status, last activity and staleness.
/// A pane title equal to `hostname` is tmux's default and is replaced by the command.
pub fn header_label(
    session: &Session,
    active: Option<(&Window, &Pane)>,
    hostname: &str,
    stale: bool,
    now: DateTime<Utc>,
) -> String {
    let mut parts = vec![session.label().to_string()];
    let mut meta = Vec::new();
    if let Some((window, pane)) = active {
        parts.push(window.name.clone());
        let title = pane.title.trim();
        let pane_label = if !hostname.is_empty() && title == hostname {
            match pane.current_cmd.trim() {
                "" => "pane",
                cmd => cmd,
            }
        } else {
            pane.title_or_cmd()
        };
        parts.push(pane_label.to_string());

        if pane.dead {
            meta.push(pane.status_string());
        }
        if let Some(activity) = pane.last_activity {
            meta.push(format!("last {}", coarse_duration(now - activity)));
        }
    }
    if stale {
        meta.push("stale".to_string());
    }
    parts.extend(meta);
    parts.join(" · ")
}

fn draw_card(
    canvas: &mut Canvas,
    model: &Model,
    card: &CardLayout,
    area: Rect,
    now: DateTime<Utc>,
) {
    let Some(session) = model.session(&card.session_id) else {
        return;
    };
    let id = session.id.as_str();
    let active = session.active_pane();
    let preview = model.previews.get(id);
    let stale = model.is_stale(id);
    let focused = model.is_focused(id);
    let pulsing = preview.is_some_and(|p| p.pulsing(now, PULSE_DURATION));
    let hovered = model.hovered.as_deref() == Some(id);
    let cursor = model.cursor.as_deref() == Some(id);
    let pane = active.map(|(_, p)| p);
    let (border, header_color) = card_colors(pane, stale, focused, pulsing, hovered, cursor);

    let x = card.rect.x - area.x;
    let y = card.rect.y - area.y;
    let mut border_style = Style::fg(border);
    if focused {
        border_style = border_style.bold();
    }
    draw_box(canvas, x, y, card.rect.width, card.rect.height, border_style);

    // Header label, then the controls right-aligned after it
    let header_y = card.header.y - area.y;
    let label = header_label(session, active, &model.hostname, stale, now);
    let label_room = card.header.width.saturating_sub(controls_width());
    canvas.put_str(
        card.header.x - area.x,
        header_y,
        &truncate(&label, label_room as usize),
        Style::fg(header_color),
        label_room,
    );
    let collapse = if model.is_collapsed(id) { EXPAND_LABEL } else { COLLAPSE_LABEL };
    let maximize = if model.detail_session() == Some(id) {
        RESTORE_LABEL
    } else {
        MAXIMIZE_LABEL
    };
    let control_style = Style::fg(COLOR_MUTED);
    let controls = [
        (card.collapse, collapse),
        (card.maximize, maximize),
        (card.close, CLOSE_LABEL),
    ];
    for (rect, text) in controls {
        canvas.put_str(rect.x - area.x, header_y, text, control_style, rect.width);
    }

    if card.body.height == 0 {
        return;
    }
    let body_x = card.body.x - area.x;
    let body_y = card.body.y - area.y;
    match preview {
        Some(preview) if preview.viewport.line_count() > 0 => {
            for (row, line) in preview.viewport.visible().iter().enumerate() {
                let y = body_y + row as u16;
                canvas.put_str(body_x, y, line, Style::default(), card.body.width);
            }
        }
        _ => {
            let placeholder = "waiting for output…";
            canvas.put_str(body_x, body_y, placeholder, Style::fg(COLOR_DIM), card.body.width);
        }
    }
}

/// Bordered placeholder centred in the grid area
fn empty_state(area: Rect) -> Canvas {
    let mut canvas = Canvas::new(area.width, area.height);
    let content = EMPTY_MESSAGE.width().max(EMPTY_HINT.width()) as u16;
    let box_width = content + 6;
    let box_height = 6;
    let x = area.width.saturating_sub(box_width) / 2;
    let y = area.height.saturating_sub(box_height) / 2;
    draw_box(&mut canvas, x, y, box_width, box_height, Style::fg(BORDER_CURSOR));
    canvas.put_str(x + 3, y + 2, EMPTY_MESSAGE, Style::fg(COLOR_TITLE), content);
    canvas.put_str(x + 3, y + 3, EMPTY_HINT, Style::fg(COLOR_TITLE), content);
    canvas
}

// ============================================================================
// FOOTER
// ============================================================================

fn render_footer(model: &mut Model, width: u16) -> Canvas {
    let room = width.saturating_sub(INDENT * 2) as usize;
    let muted = Style::fg(COLOR_MUTED);
    let mut lines: Vec<(String, Style)> = vec![(truncate(&model.help_text(), room), muted)];

    let stale = stale::stale_labels(&model.sessions, &model.stale);
    if !stale.is_empty() {
        lines.push((format_stale_line(&stale, room), muted));
    }

    if let Some(preview) = model.focused.as_ref().and_then(|id| model.previews.get(id)) {
        if !preview.vars.is_empty() {
            let vars: Vec<String> =
                preview.vars.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            lines.push((truncate(&format!("vars: {}", vars.join(" ")), room), muted));
        }
    }

    if let Some(err) = &model.last_error {
        lines.push((truncate(&format!("Error: {}", err), room), Style::fg(COLOR_ERROR)));
    }

    // Separator line above the footer text
    let toast = model.active_toast().map(|t| truncate(t, room));
    let rows = 1 + lines.len() as u16 + u16::from(toast.is_some());
    let mut canvas = Canvas::new(width, rows);
    for (i, (text, style)) in lines.iter().enumerate() {
        canvas.put_str(INDENT, 1 + i as u16, text, *style, room as u16);
    }
    if let Some(toast) = toast {
        let label = format!(" {} ", toast);
        let x = width.saturating_sub(label.width() as u16) / 2;
        let style = Style::fg(COLOR_TITLE).on(COLOR_ACCENT);
        canvas.put_str(x, rows - 1, &label, style, width.saturating_sub(x));
    }
    canvas
}

/// Stale session names fitted to `width`, with a count of the ones left out
pub fn format_stale_line(names: &[&str], width: usize) -> String {
    const PREFIX: &str = "stale sessions: ";
    const SUFFIX: &str = " (focus + X to clean)";
    if names.is_empty() {
        return format!("{}{}", PREFIX, SUFFIX);
    }
    let max_width = if width == 0 {
        PREFIX.width() + SUFFIX.width() + 80
    } else {
        width
    };
    let budget = max_width.saturating_sub(PREFIX.width() + SUFFIX.width());

    let mut shown: Vec<&str> = Vec::new();
    let mut remaining = 0;
    for (i, name) in names.iter().enumerate() {
        let candidate_width = shown.iter().map(|n| n.width() + 2).sum::<usize>() + name.width();
        if candidate_width > budget && !shown.is_empty() {
            remaining = names.len() - i;
            break;
        }
        shown.push(name);
    }

    let mut body = shown.join(", ");
    if remaining > 0 {
        body.push_str(" …");
        body.push_str(&format!(" (+{} more)", remaining));
    }
    format!("{}{}{}", PREFIX, body, SUFFIX)
}

/// Human scale age: "just now", then 5 second steps, minutes, hours
pub fn coarse_duration(d: chrono::Duration) -> String {
    let secs = d.num_seconds();
    if secs < 5 {
        "just now".to_string()
    } else if secs < 60 {
        format!("{}s", secs / 5 * 5)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}
