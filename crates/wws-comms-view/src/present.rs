//! Display helpers shared by the console panels.

use chrono::{DateTime, Utc};
use ratatui::style::Color;

use wws_comms_protocol::{CommsEventKind, NodeState};

/// Short column label for an event kind. Unknown kinds show their raw name.
pub fn kind_label(kind: &CommsEventKind) -> &str {
    match kind {
        CommsEventKind::AgentMessage => "MSG",
        CommsEventKind::AgentSpawned => "SPAWNED",
        CommsEventKind::AgentTerminated => "KILLED",
        CommsEventKind::TaskPosted => "TASK+",
        CommsEventKind::TaskClaimed => "CLAIM",
        CommsEventKind::TaskCompleted => "DONE",
        CommsEventKind::Unknown(name) => name.as_str(),
    }
}

pub fn kind_color(kind: &CommsEventKind) -> Color {
    match kind {
        CommsEventKind::AgentMessage | CommsEventKind::TaskClaimed => Color::Cyan,
        CommsEventKind::AgentSpawned | CommsEventKind::TaskCompleted => Color::Green,
        CommsEventKind::AgentTerminated => Color::Red,
        CommsEventKind::TaskPosted => Color::Yellow,
        CommsEventKind::Unknown(_) => Color::DarkGray,
    }
}

pub fn kind_icon(kind: &CommsEventKind) -> &'static str {
    match kind {
        CommsEventKind::AgentMessage => "\u{2709}",
        CommsEventKind::AgentSpawned => "+",
        CommsEventKind::AgentTerminated => "\u{2715}",
        CommsEventKind::TaskPosted => "\u{25a1}",
        CommsEventKind::TaskClaimed => "\u{25a3}",
        CommsEventKind::TaskCompleted => "\u{2713}",
        CommsEventKind::Unknown(_) => "?",
    }
}

pub fn state_color(state: &NodeState) -> Color {
    match state {
        NodeState::Running => Color::Green,
        NodeState::Suspended => Color::Yellow,
        NodeState::Terminated | NodeState::Crashed => Color::Red,
        NodeState::Other(_) => Color::DarkGray,
    }
}

/// `HH:MM:SS` from an ISO-8601 timestamp, or its first eight characters.
pub fn short_time(ts: &str) -> String {
    if let Some((_, time)) = ts.split_once('T') {
        let hms: String = time.chars().take(8).collect();
        if hms.chars().count() == 8 {
            return hms;
        }
    }
    ts.chars().take(8).collect()
}

/// Age of `ts` relative to `now`, e.g. `42s ago`. Unparsable timestamps
/// are returned as-is.
pub fn relative_time(ts: &str, now: DateTime<Utc>) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc3339(ts) else {
        return ts.to_string();
    };
    let secs = (now - parsed.with_timezone(&Utc)).num_seconds();
    match secs {
        s if s < 0 => "just now".to_string(),
        s if s < 60 => format!("{s}s ago"),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// Cut `s` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}\u{2026}")
}
