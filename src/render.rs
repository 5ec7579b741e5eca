//! Rendering - cell canvases and the terminal compositor
//!
//! Views draw into [`Canvas`] blocks that can be stacked, clipped and stamped
//! onto each other. The [`Compositor`] writes a finished frame to the terminal,
//! touching only the cells that changed since the previous frame.

use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Color, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
};
use std::io::Write;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Text attributes as bitflags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attrs(u8);

impl Attrs {
    pub const BOLD: u8 = 1 << 0;
    pub const DIM: u8 = 1 << 1;
    pub const REVERSE: u8 = 1 << 2;
    /// Right half of a double-width character
    pub const WIDE_TAIL: u8 = 1 << 7;

    pub fn has(&self, attr: u8) -> bool {
        self.0 & attr != 0
    }

    pub fn set(&mut self, attr: u8) {
        self.0 |= attr;
    }
}

/// Foreground, background and attributes applied to drawn text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub attrs: Attrs,
}

impl Style {
    pub fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Self::default()
        }
    }

    pub fn on(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.attrs.set(Attrs::BOLD);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.attrs.set(Attrs::REVERSE);
        self
    }
}

/// A styled screen cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub attrs: Attrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bg: None,
            attrs: Attrs::default(),
        }
    }
}

impl Cell {
    fn styled(ch: char, style: Style) -> Self {
        Self {
            ch,
            fg: style.fg,
            bg: style.bg,
            attrs: style.attrs,
        }
    }
}

/// A rectangular block of cells. Cells that were never drawn stay empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Canvas {
    width: u16,
    height: u16,
    cells: Vec<Option<Cell>>,
}

impl Canvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).and_then(|i| self.cells[i].as_ref())
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = Some(cell);
        }
    }

    /// Draw `text` starting at (x, y), clipped to `max_width` columns and the canvas edge.
    /// Returns the number of columns written.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, style: Style, max_width: u16) -> u16 {
        let limit = max_width.min(self.width.saturating_sub(x));
        let mut col = 0u16;
        for ch in text.chars() {
            let ch = if ch.is_control() { ' ' } else { ch };
            let w = ch.width().unwrap_or(0) as u16;
            if w == 0 {
                continue;
            }
            if col + w > limit {
                break;
            }
            self.set(x + col, y, Cell::styled(ch, style));
            if w == 2 {
                let mut tail = Cell::styled(' ', style);
                tail.attrs.set(Attrs::WIDE_TAIL);
                self.set(x + col + 1, y, tail);
            }
            col += w;
        }
        col
    }

    /// Fill a region with a character
    pub fn fill(&mut self, x: u16, y: u16, width: u16, height: u16, ch: char, style: Style) {
        for row in y..y.saturating_add(height).min(self.height) {
            for col in x..x.saturating_add(width).min(self.width) {
                self.set(col, row, Cell::styled(ch, style));
            }
        }
    }

    /// Grow (never shrink) to at least the given size, keeping existing cells in place
    pub fn grow(&mut self, width: u16, height: u16) {
        let width = width.max(self.width);
        let height = height.max(self.height);
        if width == self.width && height == self.height {
            return;
        }
        let mut grown = Canvas::new(width, height);
        grown.stamp(self, 0, 0);
        *self = grown;
    }

    /// Keep only the first `rows` rows
    pub fn truncate_rows(&mut self, rows: u16) {
        if rows >= self.height {
            return;
        }
        self.height = rows;
        self.cells.truncate(rows as usize * self.width as usize);
    }

    /// Resize to exactly `width` x `height`, clipping or padding with empty cells
    pub fn fit(&mut self, width: u16, height: u16) {
        let mut fitted = Canvas::new(width, height);
        fitted.stamp(self, 0, 0);
        *self = fitted;
    }

    /// Append `other` below this canvas, widening as needed
    pub fn push_below(&mut self, other: &Canvas) {
        let top = self.height;
        self.grow(self.width.max(other.width), top + other.height);
        self.stamp(other, 0, top);
    }

    /// Copy every non-empty cell of `other` onto this canvas at (x, y)
    pub fn stamp(&mut self, other: &Canvas, x: u16, y: u16) {
        for row in 0..other.height {
            for col in 0..other.width {
                if let Some(cell) = other.get(col, row) {
                    self.set(x.saturating_add(col), y.saturating_add(row), *cell);
                }
            }
        }
    }

    /// Plain text of one row, empty cells as spaces
    pub fn row_text(&self, y: u16) -> String {
        (0..self.width)
            .filter_map(|x| match self.get(x, y) {
                Some(cell) if cell.attrs.has(Attrs::WIDE_TAIL) => None,
                Some(cell) => Some(cell.ch),
                None => Some(' '),
            })
            .collect()
    }

    /// Plain text of every row with trailing blanks trimmed
    pub fn lines(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| self.row_text(y).trim_end().to_string())
            .collect()
    }
}

/// Truncate `text` to `width` display columns, ending in `…` when cut
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Compositor writes canvases to the terminal
pub struct Compositor {
    width: u16,
    height: u16,
    // Track what's currently on screen to minimize updates
    last_frame: Vec<Cell>,
}

impl Compositor {
    pub fn new(width: u16, height: u16) -> Self {
        let mut compositor = Self {
            width,
            height,
            last_frame: Vec::new(),
        };
        compositor.resize(width, height);
        compositor
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.last_frame = vec![Cell::default(); width as usize * height as usize];
        self.invalidate();
    }

    /// Mark the entire frame as dirty (forces full redraw)
    pub fn invalidate(&mut self) {
        for cell in &mut self.last_frame {
            cell.ch = '\x00'; // Invalid char forces redraw
        }
    }

    /// Draw a full frame, writing only cells that differ from the last one
    pub fn draw<W: Write>(&mut self, writer: &mut W, frame: &Canvas) -> std::io::Result<()> {
        let mut last_style: Option<(Option<Color>, Option<Color>, Attrs)> = None;
        let mut need_move = true;

        for y in 0..self.height {
            for x in 0..self.width {
                let cell = frame.get(x, y).copied().unwrap_or_default();
                let idx = y as usize * self.width as usize + x as usize;

                if self.last_frame[idx] == cell {
                    need_move = true;
                    continue;
                }
                self.last_frame[idx] = cell;

                if cell.attrs.has(Attrs::WIDE_TAIL) {
                    // Already covered by the wide character to its left
                    need_move = true;
                    continue;
                }

                if need_move {
                    queue!(writer, MoveTo(x, y))?;
                    need_move = false;
                }

                let style = (cell.fg, cell.bg, cell.attrs);
                if last_style != Some(style) {
                    queue!(writer, SetAttribute(Attribute::Reset), ResetColor)?;
                    if cell.attrs.has(Attrs::BOLD) {
                        queue!(writer, SetAttribute(Attribute::Bold))?;
                    }
                    if cell.attrs.has(Attrs::DIM) {
                        queue!(writer, SetAttribute(Attribute::Dim))?;
                    }
                    if cell.attrs.has(Attrs::REVERSE) {
                        queue!(writer, SetAttribute(Attribute::Reverse))?;
                    }
                    if let Some(fg) = cell.fg {
                        queue!(writer, SetForegroundColor(fg))?;
                    }
                    if let Some(bg) = cell.bg {
                        queue!(writer, SetBackgroundColor(bg))?;
                    }
                    last_style = Some(style);
                }

                write!(writer, "{}", cell.ch)?;
            }

            // End of row - next row needs MoveTo
            need_move = true;
        }

        queue!(writer, SetAttribute(Attribute::Reset), ResetColor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_str_clips() {
        let mut canvas = Canvas::new(10, 2);
        assert_eq!(canvas.put_str(6, 0, "hello", Style::default(), 10), 4);
        assert_eq!(canvas.row_text(0), "      hell");
        assert_eq!(canvas.put_str(0, 1, "hello", Style::default(), 3), 3);
        assert_eq!(canvas.lines(), ["      hell", "hel"]);
    }

    #[test]
    fn test_wide_chars() {
        let mut canvas = Canvas::new(5, 1);
        assert_eq!(canvas.put_str(0, 0, "日本語", Style::default(), 5), 4);
        assert_eq!(canvas.row_text(0), "日本 ");
        assert!(canvas.get(1, 0).unwrap().attrs.has(Attrs::WIDE_TAIL));
    }

    #[test]
    fn test_stamp_skips_empty_cells() {
        let mut base = Canvas::new(6, 3);
        base.fill(0, 0, 6, 3, '.', Style::default());

        let mut overlay = Canvas::new(4, 3);
        overlay.put_str(0, 0, "ab", Style::fg(Color::Red), 4);
        overlay.put_str(2, 2, "cd", Style::default(), 4);

        base.stamp(&overlay, 1, 0);
        assert_eq!(base.lines(), [".ab...", "......", "...cd."]);
        assert_eq!(base.get(1, 0).and_then(|c| c.fg), Some(Color::Red));
    }

    #[test]
    fn test_push_below_and_truncate() {
        let mut top = Canvas::new(4, 1);
        top.put_str(0, 0, "head", Style::default(), 4);
        let mut body = Canvas::new(6, 2);
        body.put_str(0, 0, "line 1", Style::default(), 6);
        body.put_str(0, 1, "line 2", Style::default(), 6);

        top.push_below(&body);
        assert_eq!((top.width(), top.height()), (6, 3));
        assert_eq!(top.lines(), ["head", "line 1", "line 2"]);

        top.truncate_rows(2);
        assert_eq!(top.lines(), ["head", "line 1"]);
        top.fit(3, 3);
        assert_eq!(top.lines(), ["hea", "lin", ""]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("session", 10), "session");
        assert_eq!(truncate("session", 7), "session");
        assert_eq!(truncate("session", 5), "sess…");
        assert_eq!(truncate("session", 0), "");
    }

    #[test]
    fn test_compositor_skips_unchanged_cells() {
        let mut frame = Canvas::new(4, 1);
        frame.put_str(0, 0, "abcd", Style::default(), 4);
        let mut compositor = Compositor::new(4, 1);

        let mut first = Vec::new();
        compositor.draw(&mut first, &frame).unwrap();
        assert!(String::from_utf8_lossy(&first).contains("abcd"));

        let mut second = Vec::new();
        compositor.draw(&mut second, &frame).unwrap();
        assert!(!String::from_utf8_lossy(&second).contains('a'));

        frame.put_str(2, 0, "X", Style::default(), 1);
        let mut third = Vec::new();
        compositor.draw(&mut third, &frame).unwrap();
        let out = String::from_utf8_lossy(&third);
        assert!(out.contains('X'));
        assert!(!out.contains('a'));
    }
}
