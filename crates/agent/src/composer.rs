//! Answer composer
//!
//! Assembles the generation request for one turn. A turn with no retrieval
//! candidates above threshold is still generated, but flagged ungrounded so
//! observers can tell evidence-backed answers apart.

use faq_agent_core::{GenerateRequest, ScoredEntry};
use faq_agent_llm::build_prompt;
use tracing::debug;

/// Composer settings
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    /// Character budget for retrieved context in the prompt
    pub max_context_chars: usize,
    /// Token budget for the generated answer
    pub max_answer_tokens: u32,
    /// Generation temperature
    pub temperature: f32,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            max_context_chars: 4000,
            max_answer_tokens: 256,
            temperature: 0.3,
        }
    }
}

impl ComposerSettings {
    pub fn from_settings(composer: &faq_agent_config::ComposerConfig) -> Self {
        Self {
            max_context_chars: composer.max_context_chars,
            max_answer_tokens: composer.max_answer_tokens,
            temperature: composer.temperature,
        }
    }
}

/// Context that made it into the prompt.
#[derive(Debug, Clone)]
pub struct GroundedContext {
    /// Entries included, highest score first
    pub entries: Vec<ScoredEntry>,
    /// False when retrieval found nothing above threshold
    pub grounded: bool,
    /// Whether lower-scored candidates were dropped for the budget
    pub trimmed: bool,
}

/// Generation request plus its grounding context for one turn.
#[derive(Debug)]
pub struct ComposedAnswer {
    pub request: GenerateRequest,
    pub context: GroundedContext,
}

/// Builds generation requests from retrieval candidates.
pub struct Composer {
    settings: ComposerSettings,
}

impl Composer {
    pub fn new(settings: ComposerSettings) -> Self {
        Self { settings }
    }

    /// Compose the generation request for one question.
    ///
    /// Candidates arrive highest score first. When the context budget is
    /// exceeded, the lowest-scored candidates are dropped first; the top
    /// candidate is always kept so a grounded turn stays grounded. Empty
    /// candidates produce an ungrounded request; the prompt then steers the
    /// model to the no-knowledge fallback.
    pub fn compose(&self, question: &str, candidates: Vec<ScoredEntry>) -> ComposedAnswer {
        let grounded = !candidates.is_empty();
        if !grounded {
            debug!("No grounding candidates, composing ungrounded request");
        }

        let mut kept = Vec::new();
        let mut used = 0;
        let total = candidates.len();

        for entry in candidates {
            let cost = entry.text.len();
            if !kept.is_empty() && used + cost > self.settings.max_context_chars {
                break;
            }
            used += cost;
            kept.push(entry);
        }

        let trimmed = kept.len() < total;
        if trimmed {
            debug!(
                kept = kept.len(),
                total,
                budget = self.settings.max_context_chars,
                "Context budget trimmed candidates"
            );
        }

        let request = build_prompt(question, &kept)
            .with_max_tokens(self.settings.max_answer_tokens)
            .with_temperature(self.settings.temperature)
            .with_streaming(true);

        ComposedAnswer {
            request,
            context: GroundedContext {
                entries: kept,
                grounded,
                trimmed,
            },
        }
    }
}
