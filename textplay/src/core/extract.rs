//! Heuristic state extraction over free-form game output.
//!
//! The game prints prose with no schema, so both extractors are best-effort:
//! they return whatever fields they recognise and never fail. Unset fields stay
//! `None`, which callers must keep distinct from a zero score.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Score:\s*(-?\d+)\s*Turns:\s*(\d+)").expect("status regex"));

static ITEM_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;]|\band\b").expect("item split regex"));

const INVENTORY_INTRO: &str = "you are carrying";

/// Location and status summary of a window of output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BannerInfo {
    pub location: Option<String>,
    pub score: Option<i64>,
    pub turns: Option<u64>,
}

/// Room title, prose description and carried items parsed from one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameState {
    pub room: Option<String>,
    pub description: String,
    pub inventory: Vec<String>,
}

/// Lines reprinted every turn by the game's status bar.
fn is_status_line(line: &str) -> bool {
    line.contains("Score:") || line.contains("Turns:")
}

/// Interpreter diagnostics are bracketed, e.g. `[story loaded]`.
fn is_diagnostic_line(line: &str) -> bool {
    line.starts_with('[')
}

fn is_inventory_intro(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with(INVENTORY_INTRO) || lower.contains("you are carrying:")
}

fn clean_item(raw: &str) -> Option<String> {
    let item = raw.trim().trim_end_matches('.').trim_end();
    (!item.is_empty()).then(|| item.to_string())
}

/// Scan `text` top-down for the first location line and the first status line.
pub fn extract_banner(text: &str) -> BannerInfo {
    let mut banner = BannerInfo::default();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_status_line(line) {
            if banner.score.is_none()
                && let Some(caps) = STATUS_RE.captures(line)
            {
                // Both groups are digit runs; overflow is the only failure.
                banner.score = caps[1].parse().ok();
                banner.turns = caps[2].parse().ok();
            }
        } else if banner.location.is_none() {
            banner.location = Some(line.to_string());
        }
        if banner.location.is_some() && banner.score.is_some() {
            break;
        }
    }
    banner
}

/// Parse room title, description and inventory from a chunk of output.
///
/// The room is the first non-blank line that is neither a status line nor an
/// interpreter diagnostic. Description lines follow it up to a blank line, a
/// status line, or an inventory introduction (`You are carrying:`). Items come
/// from the text after that line's colon and from each non-blank line below it.
pub fn extract_game_state(text: &str) -> GameState {
    let mut state = GameState::default();
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();

    let Some(room_idx) = lines.iter().position(|line| {
        let line = line.trim();
        !line.is_empty() && !is_status_line(line) && !is_diagnostic_line(line)
    }) else {
        return state;
    };
    state.room = Some(lines[room_idx].trim().to_string());

    let mut description = Vec::new();
    let mut rest = lines[room_idx + 1..].iter();
    while let Some(line) = rest.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_status_line(trimmed) {
            break;
        }
        if is_inventory_intro(trimmed) {
            if let Some((_, inline)) = trimmed.split_once(':') {
                state
                    .inventory
                    .extend(ITEM_SPLIT_RE.split(inline).filter_map(clean_item));
            }
            state.inventory.extend(
                rest.by_ref()
                    .map(|l| l.trim())
                    .take_while(|l| !l.is_empty())
                    .filter_map(clean_item),
            );
            break;
        }
        description.push(trimmed);
    }
    state.description = description.join(" ");
    state
}
