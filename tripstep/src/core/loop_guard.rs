//! Repeat detection against an unchanged screen.

use crate::core::types::{HistoryEntry, ResolvedAction};

/// Substitute BACK when `action` repeats the last recorded action on the same screen.
///
/// Returns `None` when the action may go out as is.
pub fn break_loop(
    last: Option<&HistoryEntry>,
    state_sig: &str,
    action: &ResolvedAction,
) -> Option<ResolvedAction> {
    let last = last?;
    if last.state_sig != state_sig {
        return None;
    }
    let current = action.summary();
    if last.action.repeat_key() != current.repeat_key() {
        return None;
    }
    Some(ResolvedAction::back(format!(
        "loop breaker: repeated {} on unchanged screen {state_sig}; pressing BACK",
        describe(action)
    )))
}

fn describe(action: &ResolvedAction) -> String {
    match (action.target_idx, action.keycode) {
        (Some(idx), _) => format!("{} on {idx}", action.action.as_str()),
        (None, Some(keycode)) => format!("{} {keycode}", action.action.as_str()),
        (None, None) => action.action.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ActionKind, KEYCODE_BACK, Phase};
    use crate::test_support::sample_plan;

    fn tap(idx: usize, reason: &str) -> ResolvedAction {
        ResolvedAction {
            action: ActionKind::Tap,
            target_idx: Some(idx),
            x: Some(10),
            y: Some(10),
            ..ResolvedAction::done(reason)
        }
    }

    fn entry(sig: &str, action: &ResolvedAction) -> HistoryEntry {
        HistoryEntry {
            ts: "2026-10-19T10:00:00Z".to_string(),
            phase: Phase::Unknown,
            state_sig: sig.to_string(),
            plan: sample_plan(),
            instruction: String::new(),
            action: action.summary(),
        }
    }

    #[test]
    fn repeated_action_on_same_screen_becomes_back() {
        let previous = entry("abc123def456", &tap(7, "first"));
        let replaced = break_loop(Some(&previous), "abc123def456", &tap(7, "different reason"))
            .expect("loop");
        assert_eq!(replaced.action, ActionKind::Key);
        assert_eq!(replaced.keycode, Some(KEYCODE_BACK));
        assert!(replaced.reason.starts_with("loop breaker:"));
        assert!(replaced.reason.contains("tap on 7"));
    }

    #[test]
    fn changed_screen_or_action_passes() {
        let previous = entry("abc123def456", &tap(7, "first"));
        assert!(break_loop(Some(&previous), "000000000000", &tap(7, "x")).is_none());
        assert!(break_loop(Some(&previous), "abc123def456", &tap(8, "x")).is_none());
        assert!(break_loop(None, "abc123def456", &tap(7, "x")).is_none());
    }
}
