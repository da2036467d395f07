//! Presentational helpers
//!
//! Pure functions used by the rendering layer: status-to-badge mapping,
//! date formatting, text truncation and the widget/list view toggle. None
//! of them may panic on malformed input.

use chrono::{DateTime, NaiveDate};

/// Default length for [`truncate_default`]
pub const DEFAULT_TRUNCATE_LEN: usize = 60;

/// Placeholder rendered for missing or invalid dates
const DATE_PLACEHOLDER: &str = "—";

/// Visual tone of a devis status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Danger,
    Neutral,
    Default,
}

/// Map a devis status to its badge tone
///
/// Four known statuses plus a generic fallback; the vocabulary is open.
pub fn status_tone(status: &str) -> Tone {
    match status {
        "Accepté" => Tone::Success,
        "En attente" => Tone::Warning,
        "Refusé" => Tone::Danger,
        "Brouillon" => Tone::Neutral,
        _ => Tone::Default,
    }
}

/// Format a backend date as `DD/MM/YYYY`, falling back to an em dash
///
/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates.
pub fn format_date(value: Option<&str>) -> String {
    let Some(raw) = value else {
        return DATE_PLACEHOLDER.to_string();
    };

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return timestamp.format("%d/%m/%Y").to_string();
    }
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return date.format("%d/%m/%Y").to_string();
    }

    DATE_PLACEHOLDER.to_string()
}

/// Truncate text to `max` characters, appending an ellipsis when shortened
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max).collect();
    shortened.push('…');
    shortened
}

/// Truncate with the fixed default length
pub fn truncate_default(text: &str) -> String {
    truncate(text, DEFAULT_TRUNCATE_LEN)
}

/// Two-way toggle between the widget and list renderings
///
/// State is owned by the caller and passed down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Widget,
    List,
}

impl ViewMode {
    /// The other mode
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Widget => ViewMode::List,
            ViewMode::List => ViewMode::Widget,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Widget => "widget",
            ViewMode::List => "list",
        }
    }

    /// Parse a persisted mode, defaulting to widget
    pub fn from_str_or_default(value: &str) -> Self {
        match value {
            "list" => ViewMode::List,
            _ => ViewMode::Widget,
        }
    }
}
