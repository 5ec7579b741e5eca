//! Stale session detection

use crate::preview::SessionPreview;
use crate::tmux::Session;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Most recent sign of life: pane activity, preview changes, or the session's own activity.
/// Falls back to the creation time when nothing else is known.
pub fn last_activity(session: &Session, preview: Option<&SessionPreview>) -> Option<DateTime<Utc>> {
    let candidates = [
        session.latest_pane_activity(),
        preview.and_then(|p| p.last_changed),
        session.last_activity,
    ];
    candidates
        .into_iter()
        .flatten()
        .max()
        .or(session.created_at)
}

/// Whether a single session should be treated as stale at `now`
pub fn is_stale(
    session: &Session,
    preview: Option<&SessionPreview>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> bool {
    if session.all_panes_dead() {
        return true;
    }
    if session.attached {
        return false;
    }
    let Some(latest) = last_activity(session, preview) else {
        return false;
    };
    match chrono::Duration::from_std(threshold) {
        Ok(threshold) => now - latest >= threshold,
        Err(_) => false,
    }
}

/// Rebuild the stale set from scratch for the given sessions
pub fn stale_set(
    sessions: &[Session],
    previews: &HashMap<String, SessionPreview>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> HashSet<String> {
    sessions
        .iter()
        .filter(|s| is_stale(s, previews.get(&s.id), now, threshold))
        .map(|s| s.id.clone())
        .collect()
}

/// Display labels of the stale sessions, in snapshot order
pub fn stale_labels<'a>(sessions: &'a [Session], stale: &HashSet<String>) -> Vec<&'a str> {
    sessions
        .iter()
        .filter(|s| stale.contains(&s.id))
        .map(Session::label)
        .collect()
}
