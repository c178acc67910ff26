//! Candidate scoring and surfacing.
//!
//! Ranks nodes by actionability and relevance so the few slots handed to the
//! arbiter go to the focused input and the foreground app's controls first.

use crate::core::candidate::Candidate;

const ACTIONABLE_WEIGHT: i32 = 120;
const DOMINANT_PACKAGE_BONUS: i32 = 30;
const RESOURCE_ID_BONUS: i32 = 10;
const LABEL_BONUS: i32 = 5;
const EDIT_CLASS_BONUS: i32 = 15;
const FOCUSED_BONUS: i32 = 10;
const KEYBOARD_PENALTY: i32 = 300;

/// Relevance score for a single node.
pub fn score(candidate: &Candidate, dominant_package: &str) -> i32 {
    let mut score = 0;
    if candidate.is_actionable() {
        score += ACTIONABLE_WEIGHT;
    }
    if !candidate.package.is_empty() && candidate.package == dominant_package {
        score += DOMINANT_PACKAGE_BONUS;
    }
    if !candidate.resource_id.is_empty() {
        score += RESOURCE_ID_BONUS;
    }
    if candidate.has_label() {
        score += LABEL_BONUS;
    }
    if candidate.class_name.contains("EditText") {
        score += EDIT_CLASS_BONUS;
    }
    if candidate.focused {
        score += FOCUSED_BONUS;
    }
    if candidate.is_keyboard() {
        score -= KEYBOARD_PENALTY;
    }
    score
}

/// Sort by `(score desc, idx asc)` and keep the first `limit` nodes.
pub fn surface<'a>(
    nodes: &'a [Candidate],
    dominant_package: &str,
    limit: usize,
) -> Vec<&'a Candidate> {
    let mut scored: Vec<(i32, &Candidate)> = nodes
        .iter()
        .map(|c| (score(c, dominant_package), c))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.idx.cmp(&b.1.idx)));
    scored.into_iter().take(limit).map(|(_, c)| c).collect()
}
