//! Compact state projection and its content-addressed signature.

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::core::candidate::Candidate;
use crate::core::snapshot::ScreenSize;
use crate::core::types::Phase;
use crate::plan::TripPlan;

const SIGNATURE_HEX_LEN: usize = 12;
const ELLIPSIS: char = '…';

/// Projection of one surfaced candidate. Carries no coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateView {
    pub idx: usize,
    pub id: String,
    pub text: String,
    pub desc: String,
    pub focused: bool,
}

/// Minimal, order-stable view of the screen handed to the arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactState {
    pub phase: Phase,
    pub plan: TripPlan,
    pub size: ScreenSize,
    pub candidates: Vec<CandidateView>,
}

/// Limits applied while compacting.
#[derive(Debug, Clone, Copy)]
pub struct CompactLimits {
    pub max_candidates: usize,
    pub clip_len: usize,
}

impl CompactState {
    /// Build from surfaced candidates, dropping anything not actionable.
    pub fn build(
        phase: Phase,
        plan: &TripPlan,
        size: ScreenSize,
        surfaced: &[&Candidate],
        limits: CompactLimits,
    ) -> Self {
        let candidates = surfaced
            .iter()
            .filter(|c| c.is_actionable())
            .take(limits.max_candidates)
            .map(|c| CandidateView {
                idx: c.idx,
                id: c.resource_id.clone(),
                text: clip(&c.text, limits.clip_len),
                desc: clip(&c.content_desc, limits.clip_len),
                focused: c.focused,
            })
            .collect();
        Self {
            phase,
            plan: plan.clone(),
            size,
            candidates,
        }
    }

    /// Whether a tap may target `idx`.
    pub fn contains(&self, idx: usize) -> bool {
        self.candidates.iter().any(|c| c.idx == idx)
    }

    /// Short content hash of the coordinate-free canonical form.
    ///
    /// Screen extents and candidate order are excluded; phase, plan, node
    /// counts and candidate labels are included.
    pub fn signature(&self) -> String {
        let mut candidates: Vec<&CandidateView> = self.candidates.iter().collect();
        candidates.sort_by_key(|c| c.idx);
        let canonical = json!({
            "phase": self.phase,
            "plan": self.plan,
            "nodes": {
                "total": self.size.total_nodes,
                "clickable": self.size.clickable_nodes,
            },
            "candidates": candidates,
        });
        // `Value` objects are BTreeMap-backed, so keys serialize sorted.
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        let mut sig = hex::encode(digest);
        sig.truncate(SIGNATURE_HEX_LEN);
        sig
    }
}

/// Clip to at most `max_len` characters, marking truncation with an ellipsis.
pub fn clip(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(max_len.saturating_sub(1)).collect();
    clipped.push(ELLIPSIS);
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::parse_snapshot;
    use crate::core::surface::surface;
    use crate::test_support::{UiNode, hierarchy, sample_plan, ui};

    const LIMITS: CompactLimits = CompactLimits {
        max_candidates: 24,
        clip_len: 90,
    };

    fn compact(nodes: Vec<UiNode>, phase: Phase, plan: &TripPlan) -> CompactState {
        let snapshot = parse_snapshot(&hierarchy(nodes)).expect("parse");
        let surfaced = surface(&snapshot.nodes, &snapshot.dominant_package, 120);
        CompactState::build(phase, plan, snapshot.size, &surfaced, LIMITS)
    }

    fn screen(offset: i32, label: &str) -> Vec<UiNode> {
        vec![
            ui(&format!("[{},100][{},200]", 10 + offset, 500 + offset))
                .text(label)
                .clickable(),
            ui(&format!("[{},300][{},400]", 10 + offset, 500 + offset))
                .desc("Show navigation drawer")
                .clickable(),
            ui("[0,500][100,600]").text("not actionable"),
        ]
    }

    #[test]
    fn drops_non_actionable_and_clips_labels() {
        let long = "x".repeat(120);
        let state = compact(
            vec![
                ui("[0,0][100,100]").text(&long).clickable(),
                ui("[0,100][100,200]").text("static"),
            ],
            Phase::Unknown,
            &sample_plan(),
        );
        assert_eq!(state.candidates.len(), 1);
        let text = &state.candidates[0].text;
        assert_eq!(text.chars().count(), 90);
        assert!(text.ends_with('…'));
    }

    #[test]
    fn caps_candidate_count() {
        let nodes: Vec<UiNode> = (0..40)
            .map(|i| ui(&format!("[0,{}][100,{}]", i * 10, i * 10 + 10)).clickable())
            .collect();
        let state = compact(nodes, Phase::Unknown, &sample_plan());
        assert_eq!(state.candidates.len(), 24);
    }

    #[test]
    fn signature_ignores_coordinates() {
        let plan = sample_plan();
        let a = compact(screen(0, "Trip Planner"), Phase::Unknown, &plan);
        let b = compact(screen(1, "Trip Planner"), Phase::Unknown, &plan);
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature().len(), 12);
    }

    #[test]
    fn signature_ignores_candidate_order() {
        let plan = sample_plan();
        let a = compact(screen(0, "Trip Planner"), Phase::Unknown, &plan);
        let mut b = a.clone();
        b.candidates.reverse();
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn signature_tracks_semantic_changes() {
        let plan = sample_plan();
        let base = compact(screen(0, "Trip Planner"), Phase::Unknown, &plan);

        let relabeled = compact(screen(0, "Departures"), Phase::Unknown, &plan);
        assert_ne!(base.signature(), relabeled.signature());

        let rephased = compact(screen(0, "Trip Planner"), Phase::DrawerOpen, &plan);
        assert_ne!(base.signature(), rephased.signature());

        let replanned = compact(
            screen(0, "Trip Planner"),
            Phase::Unknown,
            &TripPlan {
                destination: "Ettelbruck".to_string(),
                ..plan
            },
        );
        assert_ne!(base.signature(), replanned.signature());
    }

    #[test]
    fn serialized_state_has_no_coordinates() {
        let state = compact(screen(0, "Trip Planner"), Phase::Unknown, &sample_plan());
        let json = serde_json::to_string(&state.candidates).expect("serialize");
        assert!(!json.contains("\"x\""));
        assert!(!json.contains("bounds"));
    }

    #[test]
    fn canonical_form_sorts_keys() {
        let value = json!({"b": 1, "a": {"d": [true, null], "c": "é"}});
        assert_eq!(value.to_string(), r#"{"a":{"c":"é","d":[true,null]},"b":1}"#);
    }
}
