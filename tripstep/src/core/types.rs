//! Shared deterministic types for the decision pipeline.
//!
//! These types define stable contracts between pipeline stages and the wire
//! formats (action JSON on stdout, history JSONL). Field order is part of the
//! output contract.

use serde::{Deserialize, Serialize};

use crate::plan::TripPlan;

/// Android keycode for the BACK key.
pub const KEYCODE_BACK: i64 = 4;

/// Discrete classification of the current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    DialogTimePicker,
    PickStart,
    PickDestination,
    PickUnknown,
    DrawerOpen,
    JourneyForm,
    TripplannerForm,
    Unknown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::DialogTimePicker => "dialog_time_picker",
            Phase::PickStart => "pick_start",
            Phase::PickDestination => "pick_destination",
            Phase::PickUnknown => "pick_unknown",
            Phase::DrawerOpen => "drawer_open",
            Phase::JourneyForm => "journey_form",
            Phase::TripplannerForm => "tripplanner_form",
            Phase::Unknown => "unknown",
        }
    }
}

/// Action discriminator as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Tap,
    Type,
    Key,
    Done,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Tap => "tap",
            ActionKind::Type => "type",
            ActionKind::Key => "key",
            ActionKind::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tap" => Some(ActionKind::Tap),
            "type" => Some(ActionKind::Type),
            "key" => Some(ActionKind::Key),
            "done" => Some(ActionKind::Done),
            _ => None,
        }
    }
}

/// A single UI step. Taps reference a node index, never coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Tap { target_idx: usize },
    Type { text: String },
    Key { keycode: i64 },
    Done,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Tap { .. } => ActionKind::Tap,
            Action::Type { .. } => ActionKind::Type,
            Action::Key { .. } => ActionKind::Key,
            Action::Done => ActionKind::Done,
        }
    }
}

/// An unvalidated action with its rationale, from the rule engine or the arbiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub action: Action,
    pub reason: String,
}

impl Proposal {
    pub fn tap(target_idx: usize, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Tap { target_idx },
            reason: reason.into(),
        }
    }

    pub fn type_text(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Type { text: text.into() },
            reason: reason.into(),
        }
    }

    pub fn key(keycode: i64, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Key { keycode },
            reason: reason.into(),
        }
    }

    pub fn back(reason: impl Into<String>) -> Self {
        Self::key(KEYCODE_BACK, reason)
    }

    pub fn done(reason: impl Into<String>) -> Self {
        Self {
            action: Action::Done,
            reason: reason.into(),
        }
    }
}

/// A validated action ready for the device executor.
///
/// `x`/`y` are set only for taps, and only by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAction {
    pub action: ActionKind,
    pub target_idx: Option<usize>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub text: String,
    pub keycode: Option<i64>,
    pub reason: String,
}

impl ResolvedAction {
    pub fn done(reason: impl Into<String>) -> Self {
        Self {
            action: ActionKind::Done,
            target_idx: None,
            x: None,
            y: None,
            text: String::new(),
            keycode: None,
            reason: reason.into(),
        }
    }

    pub fn back(reason: impl Into<String>) -> Self {
        Self {
            action: ActionKind::Key,
            keycode: Some(KEYCODE_BACK),
            ..Self::done(reason)
        }
    }

    pub fn summary(&self) -> ActionSummary {
        ActionSummary {
            action: self.action,
            target_idx: self.target_idx,
            keycode: self.keycode,
            text: self.text.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Where the emitted action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Rule,
    Arbiter,
    /// Neither source produced a usable action (LLM disabled).
    Fallback,
}

/// Action fields persisted in history and compared by the loop breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub action: ActionKind,
    #[serde(default)]
    pub target_idx: Option<usize>,
    #[serde(default)]
    pub keycode: Option<i64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reason: String,
}

impl ActionSummary {
    /// Identity of an action for repeat detection; the rationale is ignored.
    pub fn repeat_key(&self) -> (ActionKind, Option<usize>, Option<i64>, &str) {
        (self.action, self.target_idx, self.keycode, self.text.as_str())
    }
}

/// One line of the append-only history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: String,
    pub phase: Phase,
    pub state_sig: String,
    pub plan: TripPlan,
    #[serde(default)]
    pub instruction: String,
    pub action: ActionSummary,
}
