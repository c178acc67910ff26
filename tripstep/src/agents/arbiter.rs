//! Model-backed fallback for screens no rule covers.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::core::salvage::{ensure_discriminator, salvage_object};
use crate::io::chat::{ChatModel, ChatRequest};
use crate::io::prompt::{PromptBuilder, PromptInputs};

pub const SYSTEM_PROMPT: &str = "You drive an Android trip-planner app one step at a time. \
You see a compact list of on-screen candidates, each with an idx. \
Answer with exactly ONE JSON object and nothing else: no prose, no code fences. \
Allowed actions: tap (with target_idx from the candidate list), type (with non-empty text), \
key (with integer keycode; 4 is BACK), done. \
Never invent coordinates or indices that are not listed. Never tap keyboard keys. \
If unsure, press BACK.";

/// Arbiter wrapper that owns prompt settings.
#[derive(Debug, Clone)]
pub struct ArbiterAgent {
    prompt_budget_bytes: usize,
}

impl ArbiterAgent {
    pub fn new(prompt_budget_bytes: usize) -> Self {
        Self {
            prompt_budget_bytes,
        }
    }

    /// Ask `model` for one action object.
    ///
    /// Transport failures and unsalvageable replies are errors; the returned
    /// object has an `action` key but is otherwise unvalidated.
    #[instrument(skip_all, fields(state_sig = inputs.state_sig))]
    pub fn propose<M: ChatModel + ?Sized>(
        &self,
        model: &M,
        inputs: &PromptInputs<'_>,
    ) -> Result<Map<String, Value>> {
        let user = PromptBuilder::new(self.prompt_budget_bytes).build_arbiter(inputs)?;
        let request = ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            user,
        };
        let content = model.complete(&request).context("arbiter call failed")?;
        debug!(reply = %content, "arbiter reply");

        let mut object = salvage_object(&content).context("arbiter reply unusable")?;
        ensure_discriminator(&mut object).context("arbiter reply unusable")?;
        Ok(object)
    }
}
