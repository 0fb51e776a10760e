//! Deterministic identity keys.
//!
//! Identical logical inputs must always produce identical keys: the
//! orchestrator dedups across pages with them and pairing joins on them.
//!
//! Formats:
//! - game:      `LEAGUE:YYYY-MM-DD:AWAY-HOME`
//! - bet group: `game|market|subject|line` (line with one decimal, or empty)
//! - selection: `group:SIDE`

use chrono::NaiveDate;

use crate::types::Side;

pub fn game_id(league: &str, date: NaiveDate, away: &str, home: &str) -> String {
    format!(
        "{}:{}:{}-{}",
        normalise_code(league),
        date.format("%Y-%m-%d"),
        normalise_code(away),
        normalise_code(home),
    )
}

pub fn bet_group_key(game_id: &str, market_key: &str, subject_id: &str, line: Option<f64>) -> String {
    format!(
        "{}|{}|{}|{}",
        game_id,
        market_key.trim().to_lowercase(),
        subject_id,
        format_line(line),
    )
}

pub fn selection_key(bet_group_key: &str, side: &Side) -> String {
    format!("{}:{}", bet_group_key, side.key())
}

/// Player subject id: lower-case, spaces to hyphens, apostrophes and
/// periods dropped, optional disambiguation suffix appended.
pub fn subject_id(name: &str, suffix: Option<&str>) -> String {
    let base = slug(name);
    match suffix.map(slug).filter(|s| !s.is_empty()) {
        Some(sfx) if !base.is_empty() => format!("{base}-{sfx}"),
        _ => base,
    }
}

/// One decimal place; empty when the market has no line.
pub fn format_line(line: Option<f64>) -> String {
    match line {
        // + 0.0 turns -0.0 into 0.0
        Some(l) if l.is_finite() => format!("{:.1}", l + 0.0),
        _ => String::new(),
    }
}

pub fn normalise_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn slug(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | '.'))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
