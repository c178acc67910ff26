//! Orchestration for a single `tripstep decide`.
//!
//! Extract, surface, classify, compact, then decide: rules first, the arbiter
//! only on abstention. Every decision is validated, loop-checked, and
//! recorded before it is returned.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::agents::arbiter::ArbiterAgent;
use crate::core::candidate::Candidate;
use crate::core::compact::{CompactLimits, CompactState};
use crate::core::loop_guard::break_loop;
use crate::core::phase::classify;
use crate::core::rules;
use crate::core::snapshot::Snapshot;
use crate::core::surface::surface;
use crate::core::types::{DecisionSource, HistoryEntry, Phase, ResolvedAction};
use crate::core::validator::{ValidationContext, parse_proposal, resolve};
use crate::io::chat::ChatModel;
use crate::io::config::EngineConfig;
use crate::io::history::{HistoryStore, render_for_prompt};
use crate::io::prompt::PromptInputs;
use crate::plan::TripPlan;

pub const NO_LLM_REASON: &str = "no rule-based decision and LLM disabled";
const INSTRUCTION_LEN: usize = 220;

/// Limits for a single decision.
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub surface_limit: usize,
    pub compact: CompactLimits,
    pub history_limit: usize,
    pub prompt_history_limit: usize,
    pub prompt_budget_bytes: usize,
}

impl StepConfig {
    pub fn from_engine(cfg: &EngineConfig) -> Self {
        Self {
            surface_limit: cfg.surface_limit,
            compact: cfg.compact_limits(),
            history_limit: cfg.history_limit,
            prompt_history_limit: cfg.prompt_history_limit,
            prompt_budget_bytes: cfg.prompt_budget_bytes,
        }
    }
}

impl Default for StepConfig {
    fn default() -> Self {
        Self::from_engine(&EngineConfig::default())
    }
}

/// Derived view of one snapshot, shared by `decide` and `inspect`.
#[derive(Debug, Clone)]
pub struct ScreenAnalysis<'a> {
    pub phase: Phase,
    pub surfaced: Vec<&'a Candidate>,
    pub compact: CompactState,
    pub state_sig: String,
}

pub fn analyze<'a>(
    snapshot: &'a Snapshot,
    plan: &TripPlan,
    config: &StepConfig,
) -> ScreenAnalysis<'a> {
    let surfaced = surface(
        &snapshot.nodes,
        &snapshot.dominant_package,
        config.surface_limit,
    );
    let phase = classify(&snapshot.nodes);
    let compact = CompactState::build(phase, plan, snapshot.size, &surfaced, config.compact);
    let state_sig = compact.signature();
    ScreenAnalysis {
        phase,
        surfaced,
        compact,
        state_sig,
    }
}

/// One decision request.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    pub snapshot: &'a Snapshot,
    pub plan: &'a TripPlan,
    pub objective: &'a str,
}

/// The emitted decision. Serializes to the single stdout object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    #[serde(flatten)]
    pub action: ResolvedAction,
    pub phase: Phase,
    pub state_sig: String,
    pub source: DecisionSource,
    #[serde(skip)]
    pub loop_broken: bool,
}

/// Decide one action. Never fails: recoverable problems are encoded in the
/// action's reason.
///
/// `model` is `None` when the arbiter is disabled.
#[instrument(skip_all)]
pub fn run_step<H, M>(
    request: &StepRequest<'_>,
    history: &mut H,
    model: Option<&M>,
    config: &StepConfig,
) -> StepOutcome
where
    H: HistoryStore + ?Sized,
    M: ChatModel + ?Sized,
{
    let snapshot = request.snapshot;
    let analysis = analyze(snapshot, request.plan, config);
    let phase = analysis.phase;
    let state_sig = analysis.state_sig.clone();
    info!(
        phase = phase.as_str(),
        state_sig = %state_sig,
        candidates = analysis.compact.candidates.len(),
        "classified screen"
    );
    debug!(
        compact = %serde_json::to_string(&analysis.compact).unwrap_or_default(),
        "compact state"
    );

    let recent = history
        .read_recent(config.history_limit)
        .unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "history unavailable; continuing without it");
            Vec::new()
        });

    let ctx = ValidationContext {
        compact: &analysis.compact,
        nodes: &snapshot.nodes,
    };
    let (action, source) = match rules::propose(phase, &snapshot.nodes, request.plan) {
        Some(proposal) => {
            debug!(reason = %proposal.reason, "rule fired");
            let action = resolve(&proposal, &ctx).unwrap_or_else(|err| {
                warn!(error = %err, "rule proposal rejected");
                ResolvedAction::done(format!("rule proposal rejected: {err}"))
            });
            (action, DecisionSource::Rule)
        }
        None => match model {
            Some(model) => {
                let action = consult_arbiter(model, request, &analysis, &ctx, &recent, config);
                (action, DecisionSource::Arbiter)
            }
            None => (ResolvedAction::done(NO_LLM_REASON), DecisionSource::Fallback),
        },
    };

    let (action, loop_broken) = match break_loop(recent.last(), &state_sig, &action) {
        Some(back) => {
            warn!(
                state_sig = %state_sig,
                repeated = action.action.as_str(),
                target_idx = ?action.target_idx,
                "loop breaker substituted BACK"
            );
            (back, true)
        }
        None => (action, false),
    };

    let entry = HistoryEntry {
        ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        phase,
        state_sig: state_sig.clone(),
        plan: request.plan.clone(),
        instruction: request.objective.chars().take(INSTRUCTION_LEN).collect(),
        action: action.summary(),
    };
    if let Err(err) = history.append(&entry) {
        warn!(error = %format!("{err:#}"), "failed to append history");
    }

    info!(
        action = action.action.as_str(),
        source = ?source,
        target_idx = ?action.target_idx,
        "decided"
    );
    StepOutcome {
        action,
        phase,
        state_sig,
        source,
        loop_broken,
    }
}

fn consult_arbiter<M: ChatModel + ?Sized>(
    model: &M,
    request: &StepRequest<'_>,
    analysis: &ScreenAnalysis<'_>,
    ctx: &ValidationContext<'_>,
    recent: &[HistoryEntry],
    config: &StepConfig,
) -> ResolvedAction {
    let history = render_for_prompt(recent, config.prompt_history_limit);
    let inputs = PromptInputs {
        objective: request.objective,
        plan: request.plan,
        compact: &analysis.compact,
        state_sig: &analysis.state_sig,
        history: &history,
    };
    let object = match ArbiterAgent::new(config.prompt_budget_bytes).propose(model, &inputs) {
        Ok(object) => object,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "arbiter failure; pressing BACK");
            return ResolvedAction::back(format!("arbiter failure: {err:#}"));
        }
    };
    match parse_proposal(&object).and_then(|proposal| resolve(&proposal, ctx)) {
        Ok(action) => action,
        Err(err) => {
            warn!(error = %err, "invalid action from arbiter");
            ResolvedAction::done(format!("invalid action from arbiter: {err}"))
        }
    }
}
