//! Named screen regions for mouse hit-testing
//!
//! Zones are registered while a frame is composed and queried against that same
//! frame only. The map is cleared at the start of every render.

use crate::layout::Rect;

/// What a zone refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneTarget {
    Card(String),
    Close(String),
    Maximize(String),
    Collapse(String),
    Tab(usize),
}

impl ZoneTarget {
    fn encode(&self) -> String {
        match self {
            ZoneTarget::Card(id) => format!("card:{}", id),
            ZoneTarget::Close(id) => format!("close:{}", id),
            ZoneTarget::Maximize(id) => format!("maximize:{}", id),
            ZoneTarget::Collapse(id) => format!("collapse:{}", id),
            ZoneTarget::Tab(n) => format!("tab:{}", n),
        }
    }

    fn decode(key: &str) -> Option<Self> {
        let (kind, rest) = key.split_once(':')?;
        let id = rest.to_string();
        match kind {
            "card" => Some(ZoneTarget::Card(id)),
            "close" => Some(ZoneTarget::Close(id)),
            "maximize" => Some(ZoneTarget::Maximize(id)),
            "collapse" => Some(ZoneTarget::Collapse(id)),
            "tab" => rest.parse().ok().map(ZoneTarget::Tab),
            _ => None,
        }
    }
}

/// Zone id -> rectangle, rebuilt every frame
#[derive(Debug, Clone, Default)]
pub struct ZoneMap {
    prefix: String,
    zones: Vec<(String, Rect)>,
}

impl ZoneMap {
    /// `prefix` keeps ids from different maps apart
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            zones: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Register a region. Later registrations win when regions overlap.
    pub fn mark(&mut self, target: ZoneTarget, rect: Rect) {
        if rect.width == 0 || rect.height == 0 {
            return;
        }
        let id = format!("{}{}", self.prefix, target.encode());
        self.zones.push((id, rect));
    }

    pub fn get(&self, target: &ZoneTarget) -> Option<Rect> {
        let id = format!("{}{}", self.prefix, target.encode());
        self.zones
            .iter()
            .rev()
            .find(|(zone_id, _)| *zone_id == id)
            .map(|(_, rect)| *rect)
    }

    /// Topmost zone containing the cell
    pub fn hit(&self, x: u16, y: u16) -> Option<ZoneTarget> {
        self.zones
            .iter()
            .rev()
            .find(|(_, rect)| rect.contains(x, y))
            .and_then(|(id, _)| id.strip_prefix(self.prefix.as_str()))
            .and_then(ZoneTarget::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_win_over_card() {
        let mut zones = ZoneMap::new("m1-");
        zones.mark(ZoneTarget::Card("$1".into()), Rect::new(0, 0, 40, 10));
        zones.mark(ZoneTarget::Close("$1".into()), Rect::new(35, 1, 3, 1));

        assert_eq!(zones.hit(36, 1), Some(ZoneTarget::Close("$1".into())));
        assert_eq!(zones.hit(10, 5), Some(ZoneTarget::Card("$1".into())));
        assert_eq!(zones.hit(50, 5), None);
    }

    #[test]
    fn test_tabs_and_clear() {
        let mut zones = ZoneMap::new("m1-");
        zones.mark(ZoneTarget::Tab(2), Rect::new(12, 1, 8, 1));
        assert_eq!(zones.hit(13, 1), Some(ZoneTarget::Tab(2)));
        assert_eq!(zones.get(&ZoneTarget::Tab(2)), Some(Rect::new(12, 1, 8, 1)));

        zones.clear();
        assert!(zones.is_empty());
        assert_eq!(zones.hit(13, 1), None);
    }

    #[test]
    fn test_empty_rects_ignored() {
        let mut zones = ZoneMap::new("");
        zones.mark(ZoneTarget::Card("$1".into()), Rect::new(0, 0, 0, 4));
        assert!(zones.is_empty());
    }

    #[test]
    fn test_session_ids_with_colons() {
        let mut zones = ZoneMap::new("x:");
        zones.mark(ZoneTarget::Maximize("$a:b".into()), Rect::new(0, 0, 3, 1));
        assert_eq!(zones.hit(1, 0), Some(ZoneTarget::Maximize("$a:b".into())));
    }
}
