//! Deterministic screen-phase classification.
//!
//! Runs against the full node list, since diagnostic nodes (dialog buttons,
//! drawer labels) may score too low to be surfaced. Holds no memory of
//! earlier phases.

use std::collections::HashSet;

use crate::core::candidate::{Candidate, normalize};
use crate::core::types::Phase;

pub const NUMBER_PICKER_ID: &str = "android:id/numberpicker_input";
pub const NUMBER_PICKER_CLASS: &str = "android.widget.NumberPicker";
pub const LOCATION_INPUT_SUFFIX: &str = ":id/input_location_name";
pub const START_INPUT_SUFFIX: &str = ":id/input_start";
pub const TARGET_INPUT_SUFFIX: &str = ":id/input_target";
pub const SEARCH_BUTTON_SUFFIXES: &[&str] = &[":id/button_search", ":id/button_search_default"];
pub const START_FIELD_DESC: &str = "Select start";
pub const DESTINATION_FIELD_DESC: &str = "Select destination";
pub const TRIP_PLANNER_LABEL: &str = "Trip Planner";

const DRAWER_LABELS: &[&str] = &[
    "Home",
    "Trip Planner",
    "Departures",
    "My Trips",
    "Map",
    "Tickets",
    "Infos CFL",
    "Works",
    "Alarms",
    "Settings",
];
const DRAWER_MIN_LABELS: usize = 3;

/// Assign one phase, testing in fixed priority order.
pub fn classify(nodes: &[Candidate]) -> Phase {
    if is_time_picker(nodes) {
        return Phase::DialogTimePicker;
    }
    if let Some(field) = location_input(nodes) {
        return pick_phase(field);
    }
    if is_drawer(nodes) {
        return Phase::DrawerOpen;
    }
    if has_trip_form(nodes) {
        if has_search_affordance(nodes) {
            return Phase::TripplannerForm;
        }
        return Phase::JourneyForm;
    }
    Phase::Unknown
}

/// The location-search input of a picker screen, if present.
pub fn location_input(nodes: &[Candidate]) -> Option<&Candidate> {
    nodes
        .iter()
        .find(|c| c.resource_id.ends_with(LOCATION_INPUT_SUFFIX))
}

pub fn is_search_affordance(candidate: &Candidate) -> bool {
    candidate.text.trim().eq_ignore_ascii_case("SEARCH")
        || SEARCH_BUTTON_SUFFIXES
            .iter()
            .any(|suffix| candidate.resource_id.ends_with(suffix))
}

pub fn is_start_field(candidate: &Candidate) -> bool {
    candidate.resource_id.ends_with(START_INPUT_SUFFIX) || candidate.content_desc == START_FIELD_DESC
}

pub fn is_destination_field(candidate: &Candidate) -> bool {
    candidate.resource_id.ends_with(TARGET_INPUT_SUFFIX)
        || candidate.content_desc == DESTINATION_FIELD_DESC
}

fn is_time_picker(nodes: &[Candidate]) -> bool {
    let has_picker = nodes
        .iter()
        .any(|c| c.resource_id == NUMBER_PICKER_ID || c.class_name == NUMBER_PICKER_CLASS);
    has_picker
        && nodes.iter().any(|c| {
            c.is_actionable() && matches!(c.text.trim().to_uppercase().as_str(), "OK" | "CANCEL")
        })
}

fn pick_phase(field: &Candidate) -> Phase {
    let placeholder = normalize(&field.text);
    if placeholder.contains("start") {
        Phase::PickStart
    } else if placeholder.contains("destination") || placeholder.contains("target") {
        Phase::PickDestination
    } else {
        Phase::PickUnknown
    }
}

fn is_drawer(nodes: &[Candidate]) -> bool {
    let texts: HashSet<&str> = nodes
        .iter()
        .map(|c| c.text.trim())
        .filter(|t| !t.is_empty())
        .collect();
    DRAWER_LABELS
        .iter()
        .filter(|label| texts.contains(*label))
        .count()
        >= DRAWER_MIN_LABELS
}

fn has_trip_form(nodes: &[Candidate]) -> bool {
    nodes
        .iter()
        .any(|c| is_start_field(c) || is_destination_field(c))
}

fn has_search_affordance(nodes: &[Candidate]) -> bool {
    nodes.iter().any(|c| {
        c.text.trim().eq_ignore_ascii_case("SEARCH")
            || c.resource_id.ends_with(":id/button_search_default")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::parse_snapshot;
    use crate::test_support::{UiNode, hierarchy, ui};

    fn phase_of(nodes: Vec<UiNode>) -> Phase {
        let snapshot = parse_snapshot(&hierarchy(nodes)).expect("parse");
        classify(&snapshot.nodes)
    }

    #[test]
    fn time_picker_needs_picker_and_buttons() {
        let picker = ui("[100,800][300,1000]").id(NUMBER_PICKER_ID).focusable();
        assert_eq!(
            phase_of(vec![
                picker.clone(),
                ui("[600,1400][800,1500]").text("CANCEL").clickable(),
            ]),
            Phase::DialogTimePicker
        );
        assert_eq!(phase_of(vec![picker]), Phase::Unknown);
    }

    #[test]
    fn time_picker_outranks_location_picker() {
        assert_eq!(
            phase_of(vec![
                ui("[0,0][1080,200]").id("lu.cfl.app:id/input_location_name").text("Start"),
                ui("[100,800][300,1000]").id(NUMBER_PICKER_ID),
                ui("[600,1400][800,1500]").text("OK").clickable(),
            ]),
            Phase::DialogTimePicker
        );
    }

    #[test]
    fn location_picker_sub_phase_follows_placeholder() {
        let field = |text: &str| {
            vec![ui("[0,0][1080,200]")
                .id("lu.cfl.app:id/input_location_name")
                .text(text)]
        };
        assert_eq!(phase_of(field("Enter start")), Phase::PickStart);
        assert_eq!(phase_of(field("Destination")), Phase::PickDestination);
        assert_eq!(phase_of(field("Target station")), Phase::PickDestination);
        assert_eq!(phase_of(field("Luxem")), Phase::PickUnknown);
    }

    #[test]
    fn drawer_needs_three_menu_labels() {
        let labels = |names: &[&str]| -> Vec<UiNode> {
            names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let top = 200 + 100 * i;
                    ui(&format!("[0,{top}][800,{}]", top + 100)).text(name)
                })
                .collect()
        };
        assert_eq!(
            phase_of(labels(&["Home", "Trip Planner", "Departures"])),
            Phase::DrawerOpen
        );
        assert_eq!(phase_of(labels(&["Home", "Trip Planner"])), Phase::Unknown);
    }

    #[test]
    fn forms_split_on_search_affordance() {
        let start = ui("[0,300][1080,400]").id("lu.cfl.app:id/input_start").clickable();
        assert_eq!(phase_of(vec![start.clone()]), Phase::JourneyForm);
        assert_eq!(
            phase_of(vec![
                ui("[0,300][1080,400]").desc("Select start").clickable(),
                ui("[0,900][1080,1000]").text("SEARCH").clickable(),
            ]),
            Phase::TripplannerForm
        );
        assert_eq!(
            phase_of(vec![
                start,
                ui("[0,900][1080,1000]").id("lu.cfl.app:id/button_search_default"),
            ]),
            Phase::TripplannerForm
        );
    }
}
