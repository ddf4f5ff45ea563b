//! Prompt building
//!
//! Constructs the strict FAQ-grounded prompt. The system prompt pins the
//! model to the retrieved knowledge only; when retrieval found nothing the
//! request says so explicitly and the model is instructed to answer with
//! [`FALLBACK_NO_KNOWLEDGE`].

use faq_agent_core::{GenerateRequest, ScoredEntry};

/// System prompt for FAQ answering.
pub const SYSTEM_PROMPT: &str = "\
You are a helpful company FAQ assistant. Your role is to answer general questions about \
company policies, services, and procedures using ONLY the FAQ entries provided below.

CRITICAL RULES:
1. You ONLY have access to general FAQ information. You CANNOT access specific customer \
data, order details, account information, or any personal or transactional data.
2. ANSWER ONLY WITH INFORMATION FROM THE PROVIDED FAQ ENTRIES. Do not use your training \
data or general knowledge. Do not improvise or add information not in the entries. Do not \
infer or assume anything beyond what is explicitly stated.
3. If no FAQ entries are provided, or none of them cover the question, respond: 'I don't \
have that information in my FAQ database. Please contact our support team for help.'
4. If a user asks about personal, private, or account-specific information, politely \
explain that you only provide general FAQ information and they should contact support.
5. NEVER ask for sensitive personal information.
6. If a question is unrelated to the company or its services, respond: 'I can only help \
with questions related to our company services and policies.'
7. Keep answers short and conversational. They will be spoken aloud.

REMEMBER: You are a STRICT FAQ assistant. Only repeat information from the FAQ entries. \
Never add, infer, or improvise information.";

/// The answer rule 3 of [`SYSTEM_PROMPT`] pins ungrounded turns to.
pub const FALLBACK_NO_KNOWLEDGE: &str =
    "I don't have that information in my FAQ database. Please contact our support team for help.";

/// Spoken when generation fails after retries.
pub const FALLBACK_GENERATION_FAILED: &str =
    "I'm having trouble answering right now. Please try again in a moment.";

/// Build a generation request from the question and its grounding context.
///
/// Context entries are rendered in retrieval order, highest score first. An
/// empty context produces an explicit no-match note so the model falls back
/// per its instructions instead of guessing.
pub fn build_prompt(question: &str, context: &[ScoredEntry]) -> GenerateRequest {
    let user_message = if context.is_empty() {
        format!(
            "No FAQ entries matched this question.\n\nUser question: {}",
            question
        )
    } else {
        let mut blocks = String::new();
        for entry in context {
            if !blocks.is_empty() {
                blocks.push_str("\n\n");
            }
            blocks.push_str(&entry.text);
        }
        format!("FAQ entries:\n{}\n\nUser question: {}", blocks, question)
    };

    GenerateRequest::new(SYSTEM_PROMPT).with_user_message(user_message)
}
