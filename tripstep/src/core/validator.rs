//! Action validation: the last gate before an action leaves the process.
//!
//! Rule proposals and arbiter replies both pass through [`resolve`]. Tap
//! coordinates are computed here and nowhere else.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::candidate::Candidate;
use crate::core::compact::CompactState;
use crate::core::types::{Action, ActionKind, Proposal, ResolvedAction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing action discriminator")]
    MissingAction,
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("tap requires an integer target_idx")]
    MissingTarget,
    #[error("target_idx {0} is not among the surfaced candidates")]
    NotSurfaced(usize),
    #[error("target_idx {0} is not in the snapshot")]
    UnknownNode(usize),
    #[error("target_idx {0} is not actionable")]
    NotActionable(usize),
    #[error("target_idx {0} has no center")]
    NoCenter(usize),
    #[error("target_idx {idx} center ({x},{y}) lies outside {width}x{height}")]
    OutOfBounds {
        idx: usize,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    #[error("type requires non-empty text")]
    EmptyText,
    #[error("key requires an integer keycode")]
    InvalidKeycode,
}

/// What a tap may resolve against.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub compact: &'a CompactState,
    pub nodes: &'a [Candidate],
}

/// Decode a loosely-typed action object into a [`Proposal`].
///
/// Accepts `target_index` as an alias of `target_idx`, and numeric strings or
/// integral floats wherever an integer is expected.
pub fn parse_proposal(object: &Map<String, Value>) -> Result<Proposal, ValidationError> {
    let raw_kind = match object.get("action") {
        Some(Value::String(kind)) => kind.as_str(),
        Some(Value::Null) | None => return Err(ValidationError::MissingAction),
        Some(other) => return Err(ValidationError::UnknownAction(other.to_string())),
    };
    let kind = ActionKind::parse(raw_kind)
        .ok_or_else(|| ValidationError::UnknownAction(raw_kind.to_string()))?;
    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let action = match kind {
        ActionKind::Tap => {
            let target_idx = object
                .get("target_idx")
                .filter(|v| !v.is_null())
                .or_else(|| object.get("target_index"))
                .and_then(as_integer)
                .and_then(|idx| usize::try_from(idx).ok())
                .ok_or(ValidationError::MissingTarget)?;
            Action::Tap { target_idx }
        }
        ActionKind::Type => {
            let text = object
                .get("text")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty())
                .ok_or(ValidationError::EmptyText)?;
            Action::Type {
                text: text.to_string(),
            }
        }
        ActionKind::Key => {
            let keycode = object
                .get("keycode")
                .and_then(as_integer)
                .ok_or(ValidationError::InvalidKeycode)?;
            Action::Key { keycode }
        }
        ActionKind::Done => Action::Done,
    };
    Ok(Proposal { action, reason })
}

/// Check a proposal against the current screen and attach tap coordinates.
pub fn resolve(
    proposal: &Proposal,
    ctx: &ValidationContext<'_>,
) -> Result<ResolvedAction, ValidationError> {
    let mut resolved = ResolvedAction {
        action: proposal.action.kind(),
        ..ResolvedAction::done(proposal.reason.clone())
    };

    match &proposal.action {
        Action::Tap { target_idx } => {
            let idx = *target_idx;
            if !ctx.compact.contains(idx) {
                return Err(ValidationError::NotSurfaced(idx));
            }
            let node = ctx
                .nodes
                .get(idx)
                .ok_or(ValidationError::UnknownNode(idx))?;
            if !node.is_actionable() {
                return Err(ValidationError::NotActionable(idx));
            }
            let center = node.center().ok_or(ValidationError::NoCenter(idx))?;
            let size = ctx.compact.size;
            if center.x <= 0 || center.x > size.width || center.y <= 0 || center.y > size.height {
                return Err(ValidationError::OutOfBounds {
                    idx,
                    x: center.x,
                    y: center.y,
                    width: size.width,
                    height: size.height,
                });
            }
            resolved.target_idx = Some(idx);
            resolved.x = Some(center.x);
            resolved.y = Some(center.y);
        }
        Action::Type { text } => {
            if text.trim().is_empty() {
                return Err(ValidationError::EmptyText);
            }
            resolved.text = text.clone();
        }
        Action::Key { keycode } => resolved.keycode = Some(*keycode),
        Action::Done => {}
    }
    Ok(resolved)
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::compact::CompactLimits;
    use crate::core::snapshot::{Snapshot, parse_snapshot};
    use crate::core::surface::surface;
    use crate::core::types::{KEYCODE_BACK, Phase};
    use crate::test_support::{hierarchy, sample_plan, ui};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn screen() -> (Snapshot, CompactState) {
        let snapshot = parse_snapshot(&hierarchy(vec![
            ui("[0,0][200,100]").text("Go").clickable(),
            ui("[0,100][200,200]").text("Label"),
            ui("[0,1800][100,1900]")
                .package("com.google.android.inputmethod.latin")
                .text("q")
                .clickable(),
            ui("[0,200][200,300]").text("Far").clickable(),
        ]))
        .expect("parse");
        let surfaced = surface(&snapshot.nodes, &snapshot.dominant_package, 1);
        let compact = CompactState::build(
            Phase::Unknown,
            &sample_plan(),
            snapshot.size,
            &surfaced,
            CompactLimits {
                max_candidates: 24,
                clip_len: 90,
            },
        );
        (snapshot, compact)
    }

    #[test]
    fn parses_each_kind() {
        let tap = parse_proposal(&object(json!({"action": "TAP", "target_idx": "3", "reason": "r"})))
            .expect("tap");
        assert_eq!(tap.action, Action::Tap { target_idx: 3 });
        assert_eq!(tap.reason, "r");

        let alias = parse_proposal(&object(json!({"action": "tap", "target_index": 2.0})))
            .expect("alias");
        assert_eq!(alias.action, Action::Tap { target_idx: 2 });

        let key = parse_proposal(&object(json!({"action": "key", "keycode": "4"}))).expect("key");
        assert_eq!(key.action, Action::Key { keycode: 4 });

        let done = parse_proposal(&object(json!({"action": "done"}))).expect("done");
        assert_eq!(done.action, Action::Done);
    }

    #[test]
    fn rejects_malformed_fields() {
        let cases = [
            (json!({"action": "swipe"}), ValidationError::UnknownAction("swipe".into())),
            (json!({"reason": "x"}), ValidationError::MissingAction),
            (json!({"action": "tap"}), ValidationError::MissingTarget),
            (json!({"action": "tap", "target_idx": -1}), ValidationError::MissingTarget),
            (json!({"action": "tap", "target_idx": 1.5}), ValidationError::MissingTarget),
            (json!({"action": "type", "text": "  "}), ValidationError::EmptyText),
            (json!({"action": "type"}), ValidationError::EmptyText),
            (json!({"action": "key", "keycode": "back"}), ValidationError::InvalidKeycode),
        ];
        for (value, expected) in cases {
            assert_eq!(parse_proposal(&object(value)), Err(expected));
        }
    }

    #[test]
    fn tap_resolves_coordinates_for_surfaced_candidates() {
        let (snapshot, compact) = screen();
        let ctx = ValidationContext {
            compact: &compact,
            nodes: &snapshot.nodes,
        };
        let resolved = resolve(&Proposal::tap(0, "go"), &ctx).expect("resolve");
        assert_eq!(resolved.action, ActionKind::Tap);
        assert_eq!(resolved.target_idx, Some(0));
        assert_eq!((resolved.x, resolved.y), (Some(100), Some(50)));
    }

    #[test]
    fn tap_rejects_unsurfaced_and_unsafe_targets() {
        let (snapshot, compact) = screen();
        let ctx = ValidationContext {
            compact: &compact,
            nodes: &snapshot.nodes,
        };
        // Actionable in the full tree but cut by the surface limit.
        assert_eq!(
            resolve(&Proposal::tap(3, "far"), &ctx),
            Err(ValidationError::NotSurfaced(3))
        );
        assert_eq!(
            resolve(&Proposal::tap(2, "key"), &ctx),
            Err(ValidationError::NotSurfaced(2))
        );
        assert_eq!(
            resolve(&Proposal::tap(99, "ghost"), &ctx),
            Err(ValidationError::NotSurfaced(99))
        );
    }

    #[test]
    fn tap_rejects_target_disabled_in_node_list() {
        let (_, compact) = screen();
        let stale = parse_snapshot(&hierarchy(vec![
            ui("[0,0][200,100]").text("Go").clickable().disabled(),
        ]))
        .expect("parse");
        let ctx = ValidationContext {
            compact: &compact,
            nodes: &stale.nodes,
        };
        assert_eq!(
            resolve(&Proposal::tap(0, "go"), &ctx),
            Err(ValidationError::NotActionable(0))
        );
    }

    #[test]
    fn tap_rejects_centers_outside_the_screen() {
        let snapshot = parse_snapshot(&hierarchy(vec![
            ui("[-100,-100][0,0]").text("Ghost").clickable(),
        ]))
        .expect("parse");
        let surfaced = surface(&snapshot.nodes, &snapshot.dominant_package, 10);
        let compact = CompactState::build(
            Phase::Unknown,
            &sample_plan(),
            snapshot.size,
            &surfaced,
            CompactLimits {
                max_candidates: 24,
                clip_len: 90,
            },
        );
        let ctx = ValidationContext {
            compact: &compact,
            nodes: &snapshot.nodes,
        };
        assert!(matches!(
            resolve(&Proposal::tap(0, "ghost"), &ctx),
            Err(ValidationError::OutOfBounds { idx: 0, .. })
        ));
    }

    #[test]
    fn non_tap_actions_carry_their_payload() {
        let (snapshot, compact) = screen();
        let ctx = ValidationContext {
            compact: &compact,
            nodes: &snapshot.nodes,
        };
        let typed = resolve(&Proposal::type_text("Arlon", "t"), &ctx).expect("type");
        assert_eq!(typed.text, "Arlon");
        assert_eq!(typed.x, None);

        let back = resolve(&Proposal::back("b"), &ctx).expect("key");
        assert_eq!(back.keycode, Some(KEYCODE_BACK));
        assert_eq!(back.target_idx, None);

        assert_eq!(
            resolve(&Proposal::type_text(" ", "t"), &ctx),
            Err(ValidationError::EmptyText)
        );
    }
}
