//! Prompt templates for the analysis and chat proxies.
//!
//! Analysis templates are split into:
//!
//! - A **system message**: the analyst role, what to look for, and the JSON
//!   fields to return. Constant for a given analysis type.
//! - A **user message**: the prompt under analysis, quoted.
//!
//! Chat uses a fixed assistant persona as the system message, followed by
//! the caller's history and the new message.

use serde::{Deserialize, Serialize};

use super::client::ChatMessage;

// ---------------------------------------------------------------------------
// Analysis types
// ---------------------------------------------------------------------------

/// Which lens the analysis proxy applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Redundancy,
    Complexity,
    Clarity,
    Efficiency,
    /// Anything unrecognized: a general multi-metric pass.
    #[default]
    #[serde(other)]
    General,
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redundancy => write!(f, "redundancy"),
            Self::Complexity => write!(f, "complexity"),
            Self::Clarity => write!(f, "clarity"),
            Self::Efficiency => write!(f, "efficiency"),
            Self::General => write!(f, "general"),
        }
    }
}

impl AnalysisType {
    /// Lenient parse: unknown or missing names map to [`AnalysisType::General`].
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("redundancy") => Self::Redundancy,
            Some("complexity") => Self::Complexity,
            Some("clarity") => Self::Clarity,
            Some("efficiency") => Self::Efficiency,
            _ => Self::General,
        }
    }
}

/// Longest prompt forwarded upstream, in characters.
const MAX_PROMPT_CHARS: usize = 16_000;

/// Build `(system, user)` messages for one analysis request.
pub fn build_analysis_messages(prompt: &str, analysis: AnalysisType) -> (String, String) {
    let template = template_for(analysis);
    let quoted = truncate_for_prompt(prompt, MAX_PROMPT_CHARS);

    let system = format!(
        "{ROLE}\n{focus}\nReturn a JSON object with:\n{fields}\n\
         - optimized_prompt: a concise rewritten prompt optimized for clarity and \
         token-efficiency (string)",
        focus = template.focus,
        fields = template.fields,
    );
    let user = format!("{lead} \"{quoted}\"", lead = template.user_lead);

    (system, user)
}

/// Cap very long prompts so the request stays inside the model's context.
fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    let remaining = total - max_chars;
    format!("{truncated}\n[... {remaining} more characters truncated]")
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

const ROLE: &str = "You are an AI efficiency analyst. Respond with a single valid JSON \
                    object only. Do not include any explanatory text.";

struct PromptTemplate {
    focus: &'static str,
    fields: &'static str,
    user_lead: &'static str,
}

fn template_for(analysis: AnalysisType) -> PromptTemplate {
    match analysis {
        AnalysisType::Redundancy => PromptTemplate {
            focus: "Analyze the given prompt for redundancy patterns.\n\
                    Look for repeated concepts, similar phrasing, or unnecessary repetition \
                    within the prompt.",
            fields: "\
- redundancy_score: 0-1 (0 = no redundancy, 1 = highly redundant)\n\
- redundant_phrases: array of repeated phrases\n\
- suggestions: array of suggestions to reduce redundancy\n\
- complexity_score: 0-1 (0 = simple, 1 = complex)",
            user_lead: "Analyze this prompt for redundancy:",
        },

        AnalysisType::Complexity => PromptTemplate {
            focus: "Analyze the given prompt for complexity.\n\
                    Consider factors like: number of concepts, technical depth, required \
                    reasoning steps.",
            fields: "\
- complexity_score: 0-1 (0 = simple, 1 = very complex)\n\
- concepts_count: number of distinct concepts\n\
- reasoning_steps: estimated reasoning steps required\n\
- suggestions: array of suggestions to simplify",
            user_lead: "Analyze the complexity of this prompt:",
        },

        AnalysisType::Clarity => PromptTemplate {
            focus: "Analyze the given prompt for clarity and specificity.\n\
                    Look for ambiguous terms, unclear instructions, or vague requirements.",
            fields: "\
- clarity_score: 0-1 (0 = unclear, 1 = very clear)\n\
- ambiguous_terms: array of unclear terms\n\
- missing_context: array of missing context\n\
- suggestions: array of suggestions to improve clarity",
            user_lead: "Analyze the clarity of this prompt:",
        },

        AnalysisType::Efficiency => PromptTemplate {
            focus: "Provide a comprehensive efficiency analysis.\n\
                    Consider redundancy, complexity, clarity, and potential for reuse.",
            fields: "\
- overall_efficiency: 0-1 (0 = inefficient, 1 = very efficient)\n\
- redundancy_issues: array of redundancy problems\n\
- complexity_issues: array of complexity problems\n\
- clarity_issues: array of clarity problems\n\
- optimization_suggestions: array of specific improvements\n\
- estimated_tokens: estimated token count for response",
            user_lead: "Provide efficiency analysis for this prompt:",
        },

        AnalysisType::General => PromptTemplate {
            focus: "Analyze the given prompt for various efficiency metrics.",
            fields: "\
- redundancy_score: 0-1\n\
- complexity_score: 0-1\n\
- clarity_score: 0-1\n\
- overall_efficiency: 0-1\n\
- suggestions: array of improvement suggestions",
            user_lead: "Analyze this prompt for efficiency:",
        },
    }
}

// ---------------------------------------------------------------------------
// Chat persona
// ---------------------------------------------------------------------------

pub const CHAT_PERSONA: &str = "\
You are a helpful AI assistant specialized in AI sustainability and efficiency. You help users understand:
- AI efficiency metrics and how to improve them
- Sustainable AI usage practices
- Carbon footprint and environmental impact
- Resource optimization techniques
- Best practices for reducing AI waste

Be concise, friendly, and knowledgeable. Focus on practical advice for improving AI sustainability.";

/// Persona, then prior turns, then the new user message.
pub fn build_chat_messages(message: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(CHAT_PERSONA));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(message));
    messages
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
