use anyhow::{anyhow, Context, Result};
use log::warn;
use serde_json::Value;
use std::collections::BTreeSet;

pub mod question;


pub use question::{Answer, AnswerKey, ImageRef, Question, QuestionType, RawQuestion};

/// Parses a bank dump, skipping malformed elements. This is the read path for
/// persisted overrides: a question that no longer deserializes is logged and
/// dropped rather than poisoning the whole bank.
pub fn parse_bank_lenient(raw_json: &str) -> Result<Vec<Question>> {
    let value: Value = serde_json::from_str(raw_json)?;
    let elements = match value {
        Value::Array(elements) => elements,
        _ => return Err(anyhow!("question bank must be a JSON array")),
    };
    let mut questions = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<RawQuestion>(element) {
            Ok(raw) => questions.push(raw.into()),
            Err(e) => warn!("skipping malformed question at index {}: {}", index, e),
        }
    }
    Ok(questions)
}

/// Parses an imported bank strictly: the input must be a JSON array and every
/// element must carry `question`, `options` and `correct`. The first violation
/// rejects the whole import with a human-readable reason.
pub fn validate_import(raw_json: &str) -> Result<Vec<Question>> {
    let value: Value =
        serde_json::from_str(raw_json).context("import is not valid JSON")?;
    let elements = match value {
        Value::Array(elements) => elements,
        _ => return Err(anyhow!("import must be a JSON array of questions")),
    };
    let mut questions = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        let object = element
            .as_object()
            .ok_or_else(|| anyhow!("question {} is not an object", index + 1))?;
        for field in &["question", "options", "correct"] {
            if !object.contains_key(*field) {
                return Err(anyhow!("question {} has no `{}` field", index + 1, field));
            }
        }
        if !object["options"].is_array() {
            return Err(anyhow!("question {}: `options` must be an array", index + 1));
        }
        let raw: RawQuestion = serde_json::from_value(Value::Object(object.clone()))
            .with_context(|| format!("question {} is malformed", index + 1))?;
        questions.push(raw.into());
    }
    Ok(questions)
}

/// Serializes a bank back to its wire shape, pretty-printed. Feeding the
/// output to [`parse_bank_lenient`] reproduces the input exactly.
pub fn export_bank(questions: &[Question]) -> Result<String> {
    let raw: Vec<RawQuestion> = questions.iter().map(RawQuestion::from).collect();
    Ok(serde_json::to_string_pretty(&raw)?)
}

/// Unique module labels present in a bank, sorted, blanks excluded.
pub fn extract_modules(questions: &[Question]) -> Vec<String> {
    let modules: BTreeSet<String> = questions
        .iter()
        .filter_map(|q| q.module.as_deref())
        .map(str::trim)
        .filter(|module| !module.is_empty())
        .map(str::to_owned)
        .collect();
    modules.into_iter().collect()
}
