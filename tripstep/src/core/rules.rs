//! Phase-keyed deterministic policy.
//!
//! Each phase maps to one policy function over the full node list and the
//! plan. A policy returns `None` to abstain, which hands the decision to the
//! arbiter; abstention is never turned into `done` here.

use crate::core::candidate::{Candidate, normalize};
use crate::core::phase::{
    TRIP_PLANNER_LABEL, is_destination_field, is_search_affordance, is_start_field,
    location_input,
};
use crate::core::types::{Phase, Proposal};
use crate::plan::TripPlan;

const DRAWER_TOGGLE_DESCS: &[&str] = &["show navigation drawer", "open navigation drawer"];

/// Inputs shared by every policy.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub phase: Phase,
    pub nodes: &'a [Candidate],
    pub plan: &'a TripPlan,
}

type Policy = fn(&RuleContext<'_>) -> Option<Proposal>;

/// Propose zero or one action for the current screen.
pub fn propose(phase: Phase, nodes: &[Candidate], plan: &TripPlan) -> Option<Proposal> {
    let ctx = RuleContext { phase, nodes, plan };
    policy_for(phase)(&ctx)
}

fn policy_for(phase: Phase) -> Policy {
    match phase {
        Phase::DialogTimePicker => time_picker,
        Phase::DrawerOpen => drawer_open,
        Phase::Unknown => unknown_screen,
        Phase::JourneyForm | Phase::TripplannerForm => trip_form,
        Phase::PickStart | Phase::PickDestination | Phase::PickUnknown => location_picker,
    }
}

/// Never confirm a time the plan did not ask for.
fn time_picker(ctx: &RuleContext<'_>) -> Option<Proposal> {
    let cancel = actionable_with_text(ctx.nodes, "CANCEL");
    let ok = actionable_with_text(ctx.nodes, "OK");
    let now = ctx.plan.is_now();

    if let Some(cancel) = cancel {
        let reason = if now {
            "Close time picker (keep 'now')"
        } else {
            "Close time picker (CANCEL)"
        };
        return Some(Proposal::tap(cancel.idx, reason));
    }
    if let Some(ok) = ok.filter(|_| !now) {
        return Some(Proposal::tap(ok.idx, "Confirm time picker (OK)"));
    }
    Some(Proposal::back("Close dialog (BACK)"))
}

fn drawer_open(ctx: &RuleContext<'_>) -> Option<Proposal> {
    match container_for_label(ctx.nodes, TRIP_PLANNER_LABEL) {
        Some(item) => Some(Proposal::tap(item.idx, "Open Trip Planner from drawer")),
        None => Some(Proposal::back("Close drawer (BACK)")),
    }
}

fn unknown_screen(ctx: &RuleContext<'_>) -> Option<Proposal> {
    let toggle = ctx.nodes.iter().find(|c| {
        c.is_actionable() && DRAWER_TOGGLE_DESCS.contains(&normalize(&c.content_desc).as_str())
    });
    if let Some(toggle) = toggle {
        return Some(Proposal::tap(toggle.idx, "Open navigation drawer"));
    }

    let planner = container_for_label(ctx.nodes, TRIP_PLANNER_LABEL).or_else(|| {
        ctx.nodes
            .iter()
            .find(|c| c.is_actionable() && c.content_desc.trim() == TRIP_PLANNER_LABEL)
    });
    planner.map(|item| Proposal::tap(item.idx, "Open Trip Planner"))
}

/// Fill start, then destination, then search.
fn trip_form(ctx: &RuleContext<'_>) -> Option<Proposal> {
    let start_field = ctx
        .nodes
        .iter()
        .find(|c| is_start_field(c) && c.is_actionable());
    let destination_field = ctx
        .nodes
        .iter()
        .find(|c| is_destination_field(c) && c.is_actionable());
    let search = ctx
        .nodes
        .iter()
        .find(|c| is_search_affordance(c) && c.is_actionable());

    if let (Some(field), Some(start)) = (start_field, ctx.plan.start()) {
        if shows_placeholder(field, start) {
            return Some(Proposal::tap(field.idx, format!("Set start to '{start}'")));
        }
    }
    if let (Some(field), Some(destination)) = (destination_field, ctx.plan.destination()) {
        if shows_placeholder(field, destination) {
            return Some(Proposal::tap(
                field.idx,
                format!("Set destination to '{destination}'"),
            ));
        }
    }
    search.map(|button| Proposal::tap(button.idx, "Launch search"))
}

fn location_picker(ctx: &RuleContext<'_>) -> Option<Proposal> {
    let wanted = match ctx.phase {
        Phase::PickStart => ctx.plan.start(),
        Phase::PickDestination => ctx.plan.destination(),
        _ => ctx.plan.start().or_else(|| ctx.plan.destination()),
    };
    let field = location_input(ctx.nodes);

    if let Some(wanted) = wanted {
        if let Some(entry) = best_suggestion(ctx.nodes, field, wanted) {
            return Some(Proposal::tap(
                entry.idx,
                format!("Select '{wanted}' from suggestions"),
            ));
        }
        if let Some(field) = field {
            // Typing again into a field that already holds the name would append to it.
            if field.focused && !field.mentions(wanted) {
                return Some(Proposal::type_text(
                    wanted,
                    format!("Type '{wanted}' in location field"),
                ));
            }
            if !field.focused && field.is_actionable() {
                return Some(Proposal::tap(field.idx, "Focus location input"));
            }
        }
    }

    if ctx.nodes.iter().any(Candidate::is_keyboard) {
        return Some(Proposal::back("Close keyboard overlay (BACK)"));
    }
    None
}

/// Actionable list entry mentioning `wanted`; longest description wins, then lowest index.
fn best_suggestion<'a>(
    nodes: &'a [Candidate],
    field: Option<&Candidate>,
    wanted: &str,
) -> Option<&'a Candidate> {
    let field_idx = field.map(|f| f.idx);
    nodes
        .iter()
        .filter(|c| Some(c.idx) != field_idx && c.is_actionable() && c.mentions(wanted))
        .min_by(|a, b| {
            desc_len(b)
                .cmp(&desc_len(a))
                .then_with(|| a.idx.cmp(&b.idx))
        })
}

fn desc_len(candidate: &Candidate) -> usize {
    candidate.content_desc.trim().chars().count()
}

/// A form field still needs a value unless its text already names the wanted place.
///
/// Placeholder labels ("Start", "Select destination", ...) never name a place,
/// so they fall under the same check as an empty field.
fn shows_placeholder(field: &Candidate, wanted: &str) -> bool {
    field.text.trim().is_empty() || !field.mentions(wanted)
}

fn actionable_with_text<'a>(nodes: &'a [Candidate], label: &str) -> Option<&'a Candidate> {
    nodes
        .iter()
        .find(|c| c.is_actionable() && c.text.trim().eq_ignore_ascii_case(label))
}

/// Smallest actionable node enclosing the first node labelled `label`.
///
/// Labels inside drawers are often plain text views; the tappable row is an
/// enclosing container. Area ties go to the lower index. Falls back to the
/// label node itself when it is actionable and nothing encloses it.
fn container_for_label<'a>(nodes: &'a [Candidate], label: &str) -> Option<&'a Candidate> {
    let label_node = nodes
        .iter()
        .find(|c| c.text.trim() == label && c.rect.is_some())?;
    let label_rect = label_node.rect?;

    nodes
        .iter()
        .filter(|c| c.idx != label_node.idx && c.is_actionable())
        .filter_map(|c| {
            c.rect
                .filter(|rect| rect.contains(&label_rect))
                .map(|rect| (rect.area(), c))
        })
        .min_by_key(|(area, c)| (*area, c.idx))
        .map(|(_, c)| c)
        .or_else(|| label_node.is_actionable().then_some(label_node))
}
