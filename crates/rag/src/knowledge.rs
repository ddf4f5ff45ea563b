//! Knowledge base loading
//!
//! Supports three on-disk formats: a plain-text `Question:`/`Answer:`
//! format (pairs separated by blank lines), and structured YAML/JSON files
//! with an `entries` array. Entry text carries the full Q/A pair so that
//! question wording contributes to similarity against user queries.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use faq_agent_core::KnowledgeEntry;

use crate::RagError;

/// Structured knowledge file format (YAML or JSON)
#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeFile {
    /// Version for format compatibility
    #[serde(default)]
    pub version: Option<String>,
    /// List of entries
    pub entries: Vec<KnowledgeEntry>,
}

/// Parse `Question:`/`Answer:` text into knowledge entries.
///
/// Pairs are separated by blank lines. Blocks missing either marker are
/// skipped. IDs are assigned as `faq-1`, `faq-2`, ... in file order.
pub fn parse_qa_text(content: &str) -> Vec<KnowledgeEntry> {
    let mut entries = Vec::new();

    for block in content.split("\n\n") {
        let block = block.trim();
        if !block.contains("Question:") || !block.contains("Answer:") {
            continue;
        }

        let Some((question_part, answer_part)) = block.split_once("Answer:") else {
            continue;
        };
        let question = question_part.replace("Question:", "").trim().to_string();
        let answer = answer_part.trim().to_string();
        if question.is_empty() || answer.is_empty() {
            continue;
        }

        let id = format!("faq-{}", entries.len() + 1);
        entries.push(
            KnowledgeEntry::new(id, format!("Q: {}\nA: {}", question, answer))
                .with_tags(vec!["faq".to_string()]),
        );
    }

    entries
}

/// Load a knowledge file, dispatching on extension.
///
/// `.txt` is parsed as `Question:`/`Answer:` text, `.yaml`/`.yml` and
/// `.json` as a [`KnowledgeFile`].
pub fn load_knowledge_file(path: &Path) -> Result<Vec<KnowledgeEntry>, RagError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RagError::Knowledge(format!("failed to read {}: {}", path.display(), e)))?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let entries = match extension {
        "json" => {
            let file: KnowledgeFile = serde_json::from_str(&content)
                .map_err(|e| RagError::Knowledge(format!("JSON parse error: {}", e)))?;
            file.entries
        }
        "yaml" | "yml" => {
            let file: KnowledgeFile = serde_yaml::from_str(&content)
                .map_err(|e| RagError::Knowledge(format!("YAML parse error: {}", e)))?;
            file.entries
        }
        _ => parse_qa_text(&content),
    };

    if entries.is_empty() {
        return Err(RagError::Knowledge(format!(
            "no entries found in {}",
            path.display()
        )));
    }

    info!(
        file = %path.display(),
        entries = entries.len(),
        "Loaded knowledge base"
    );

    Ok(entries)
}

/// Built-in sample knowledge base, used when no knowledge file exists yet.
pub fn sample_knowledge() -> Vec<KnowledgeEntry> {
    parse_qa_text(SAMPLE_KNOWLEDGE_TEXT)
}

/// Write the sample knowledge base to `path` so operators have a file to
/// edit and reload against.
pub fn write_sample_knowledge(path: &Path) -> Result<(), RagError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| RagError::Knowledge(format!("failed to create {}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, SAMPLE_KNOWLEDGE_TEXT)
        .map_err(|e| RagError::Knowledge(format!("failed to write {}: {}", path.display(), e)))?;
    info!(file = %path.display(), "Wrote sample knowledge base");
    Ok(())
}

const SAMPLE_KNOWLEDGE_TEXT: &str = "\
Question: What are your business hours?
Answer: We are open Monday to Friday from 9 AM to 6 PM, and Saturday from 10 AM to 4 PM. We are closed on Sundays and public holidays.

Question: How can I contact customer support?
Answer: You can reach our customer support team via email at support@company.com, call us at 1-800-SUPPORT, or use the live chat on our website available 24/7.

Question: What products do you offer?
Answer: We offer a wide range of software solutions including project management tools, customer relationship management (CRM) systems, and data analytics platforms. All products come with a 30-day free trial.

Question: What is your return policy?
Answer: We offer a 60-day money-back guarantee on all our products. If you're not satisfied, contact our support team for a full refund, no questions asked.

Question: Do you offer training for new users?
Answer: Yes! We provide comprehensive onboarding including video tutorials, documentation, and live training sessions. Premium customers also get dedicated account managers.

Question: What payment methods do you accept?
Answer: We accept all major credit cards (Visa, MasterCard, American Express), PayPal, bank transfers, and for enterprise customers, we can arrange invoicing with net-30 terms.

Question: Is my data secure?
Answer: Absolutely. We use bank-level 256-bit encryption, regular security audits, and comply with GDPR, SOC 2, and ISO 27001 standards. Your data is backed up daily.

Question: Can I upgrade or downgrade my plan?
Answer: Yes, you can change your plan at any time. Upgrades take effect immediately, and downgrades will apply at the start of your next billing cycle. No penalties for changes.
";
