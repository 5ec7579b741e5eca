//! Layout management - arranging session cards in the terminal

use crate::config::{
    CARD_CHROME_HEIGHT, CARD_CHROME_WIDTH, CARD_PADDING, CLOSE_LABEL, COLLAPSE_LABEL, CONTROL_GAP,
    MAXIMIZE_LABEL, MIN_COLUMN_CONTENT_WIDTH, MIN_INNER_WIDTH, MIN_PREVIEW_HEIGHT,
};
use unicode_width::UnicodeWidthStr;

/// Rectangle in screen cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// One card to place
#[derive(Debug, Clone, Copy)]
pub struct CardSlot<'a> {
    pub session_id: &'a str,
    /// Collapsed cards show only their header
    pub collapsed: bool,
}

/// Geometry of a placed card and its header controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLayout {
    pub session_id: String,
    pub row: usize,
    pub col: usize,
    /// Whole card including its border
    pub rect: Rect,
    /// Header line inside the border and padding
    pub header: Rect,
    /// Preview area below the header; zero height when collapsed
    pub body: Rect,
    pub collapse: Rect,
    pub maximize: Rect,
    pub close: Rect,
}

/// Result of arranging cards in a grid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: usize,
    pub cell_width: u16,
    pub inner_width: u16,
    /// Body height given to each row
    pub row_bodies: Vec<u16>,
    pub cards: Vec<CardLayout>,
}

impl GridLayout {
    /// Total height of all rows
    pub fn height(&self) -> u16 {
        let rows = self.row_bodies.len() as u16;
        self.row_bodies.iter().sum::<u16>() + rows * CARD_CHROME_HEIGHT
    }

    pub fn card(&self, session_id: &str) -> Option<&CardLayout> {
        self.cards.iter().find(|c| c.session_id == session_id)
    }
}

/// Trait for layout algorithms
pub trait Layout {
    /// Name of this layout
    fn name(&self) -> &str;

    /// Most columns this layout allows for `count` cards in `width` cells
    fn column_limit(&self, width: u16, count: usize) -> usize;

    /// Arrange cards within the given area
    fn arrange(&self, cards: &[CardSlot], area: Rect) -> GridLayout {
        if cards.is_empty() || area.width == 0 {
            return GridLayout::default();
        }
        let max_columns = self.column_limit(area.width, cards.len());
        let (columns, row_bodies) = fit_rows(cards, area.height, max_columns);
        place(cards, area, columns, &row_bodies)
    }
}

/// Multi-column grid used for the overview
pub struct Grid;

impl Layout for Grid {
    fn name(&self) -> &str {
        "grid"
    }

    fn column_limit(&self, width: u16, count: usize) -> usize {
        if count <= 1 {
            return 1;
        }
        let stride = (MIN_COLUMN_CONTENT_WIDTH + CARD_CHROME_WIDTH) as usize;
        (width as usize / stride).clamp(1, count)
    }
}

/// Single card filling the area, used for detail mode
pub struct Monocle;

impl Layout for Monocle {
    fn name(&self) -> &str {
        "monocle"
    }

    fn column_limit(&self, _width: u16, _count: usize) -> usize {
        1
    }
}

/// Rows needed for `count` cards in `columns` columns
fn row_count(count: usize, columns: usize) -> usize {
    count.div_ceil(columns.max(1))
}

/// Search column counts downward from `max_columns`, taking the first whose rows all fit.
/// Returns the column count and the body height of each row.
fn fit_rows(cards: &[CardSlot], height: u16, max_columns: usize) -> (usize, Vec<u16>) {
    for columns in (1..=max_columns.max(1)).rev() {
        let rows = row_count(cards.len(), columns);
        let chrome = rows * CARD_CHROME_HEIGHT as usize;
        if chrome > height as usize {
            continue;
        }
        let budget = (height as usize - chrome) as u16;
        return (columns, distribute(cards, columns, rows, budget));
    }

    // Nothing fits: one column, body clamped to the minimum
    let rows = cards.len();
    let chrome = rows * CARD_CHROME_HEIGHT as usize;
    let per_row = (height as usize).saturating_sub(chrome) / rows.max(1);
    let body = (per_row as u16).max(MIN_PREVIEW_HEIGHT);
    let bodies = (0..rows)
        .map(|row| if cards[row].collapsed { 0 } else { body })
        .collect();
    (1, bodies)
}

/// Split `budget` between rows that show at least one body.
/// The remainder goes to the first rows.
fn distribute(cards: &[CardSlot], columns: usize, rows: usize, budget: u16) -> Vec<u16> {
    let expanded: Vec<bool> = (0..rows)
        .map(|row| {
            cards
                .iter()
                .skip(row * columns)
                .take(columns)
                .any(|c| !c.collapsed)
        })
        .collect();
    let open_rows = expanded.iter().filter(|&&e| e).count() as u16;
    if open_rows == 0 {
        return vec![0; rows];
    }

    let per_row = budget / open_rows;
    let remainder = budget % open_rows;
    let mut bodies = Vec::with_capacity(rows);
    let mut seen = 0;
    for open in expanded {
        if !open {
            bodies.push(0);
            continue;
        }
        // Distribute remainder to first rows
        let extra = if seen < remainder { 1 } else { 0 };
        bodies.push(per_row + extra);
        seen += 1;
    }
    bodies
}

fn place(cards: &[CardSlot], area: Rect, columns: usize, row_bodies: &[u16]) -> GridLayout {
    let cell_width = area.width / columns as u16;
    let inner_width = cell_width.saturating_sub(CARD_CHROME_WIDTH).max(MIN_INNER_WIDTH);
    let card_width = inner_width + CARD_CHROME_WIDTH;

    let mut placed = Vec::with_capacity(cards.len());
    let mut row_top = area.y;
    for (row, &row_body) in row_bodies.iter().enumerate() {
        let row_cards = cards.iter().skip(row * columns).take(columns);
        for (col, slot) in row_cards.enumerate() {
            let body_height = if slot.collapsed { 0 } else { row_body };
            let x = area.x + col as u16 * cell_width;
            let rect = Rect::new(x, row_top, card_width, body_height + CARD_CHROME_HEIGHT);
            let content_x = x + 1 + CARD_PADDING;
            let header = Rect::new(content_x, row_top + 1, inner_width, 1);
            let body = Rect::new(content_x, row_top + 2, inner_width, body_height);
            let [collapse, maximize, close] = controls(header);

            placed.push(CardLayout {
                session_id: slot.session_id.to_string(),
                row,
                col,
                rect,
                header,
                body,
                collapse,
                maximize,
                close,
            });
        }
        row_top += row_body + CARD_CHROME_HEIGHT;
    }

    GridLayout {
        columns,
        rows: row_bodies.len(),
        cell_width,
        inner_width,
        row_bodies: row_bodies.to_vec(),
        cards: placed,
    }
}

/// Width taken by the header controls, including the gap before them
pub fn controls_width() -> u16 {
    [COLLAPSE_LABEL, MAXIMIZE_LABEL, CLOSE_LABEL]
        .iter()
        .map(|label| label.width() as u16 + CONTROL_GAP)
        .sum()
}

/// Collapse, maximize and close controls, right-aligned in the header in that order
fn controls(header: Rect) -> [Rect; 3] {
    let mut right = header.right();
    let mut rects = [Rect::default(); 3];
    for (slot, label) in [CLOSE_LABEL, MAXIMIZE_LABEL, COLLAPSE_LABEL].iter().enumerate() {
        let width = label.width() as u16;
        let x = right.saturating_sub(width).max(header.x);
        rects[2 - slot] = Rect::new(x, header.y, width, 1);
        right = x.saturating_sub(CONTROL_GAP);
    }
    rects
}
