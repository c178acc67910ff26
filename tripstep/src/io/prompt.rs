//! Arbiter prompt builder.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use tracing::{debug, warn};

use crate::core::compact::CompactState;
use crate::plan::TripPlan;

const ARBITER_TEMPLATE: &str = include_str!("prompts/arbiter.md");

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section regex should be valid")
});

/// Droppable sections, least important first.
const DROP_ORDER: &[&str] = &["history"];

/// Everything the arbiter prompt embeds.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub objective: &'a str,
    pub plan: &'a TripPlan,
    pub compact: &'a CompactState,
    pub state_sig: &'a str,
    /// Pre-rendered history lines, or `(none)`.
    pub history: &'a str,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("arbiter", ARBITER_TEMPLATE)
            .context("load arbiter template")?;
        Ok(Self { env })
    }

    fn render_arbiter(&self, input: &PromptInputs<'_>) -> Result<String> {
        let plan_json = serde_json::to_string_pretty(input.plan).context("serialize plan")?;
        let state_json =
            serde_json::to_string_pretty(input.compact).context("serialize compact state")?;
        let template = self.env.get_template("arbiter")?;
        let rendered = template.render(context! {
            objective => input.objective.trim(),
            plan_json => plan_json,
            phase => input.compact.phase.as_str(),
            state_sig => input.state_sig,
            state_json => state_json,
            history => input.history.trim(),
        })?;
        Ok(rendered)
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

/// Split rendered output on `<!-- section:KEY required|droppable -->` markers.
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::new();

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let content = rendered[whole.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }
    sections
}

/// Drop droppable sections in [`DROP_ORDER`] until the prompt fits. Required
/// sections are never cut.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len = |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == *key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }
    if total_len(sections) > budget {
        warn!(
            bytes = total_len(sections),
            budget, "arbiter prompt exceeds budget after dropping optional sections"
        );
    }
}

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the arbiter user prompt within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    pub fn build_arbiter(&self, input: &PromptInputs<'_>) -> Result<String> {
        let rendered = PromptEngine::new()?
            .render_arbiter(input)
            .context("render arbiter prompt")?;
        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        Ok(render_sections(&sections))
    }
}
