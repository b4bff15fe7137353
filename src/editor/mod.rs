use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::bank::{
    definition, metadata_key, override_key, AnswerKey, BankRegistry, ExamMetadata, Question,
    QuestionType,
};
use crate::bank::definition::question::{RawCorrect, NO};
use crate::storage::KvStore;

#[cfg(test)]
mod tests;

/// Master bank for an exam: the registry copy, deep-cloned so edits never
/// touch the installed bank.
pub fn load_master(registry: &BankRegistry, exam_id: &str) -> Vec<Question> {
    registry
        .get(exam_id)
        .map(|bank| bank.questions)
        .unwrap_or_default()
}

/// Working copy for the editor: the persisted override when present and
/// parseable, else the master. Same precedence as the exam runner, but the
/// caller owns (and may mutate) the result.
pub fn load_working_set(
    registry: &BankRegistry,
    kv: &dyn KvStore,
    exam_id: &str,
) -> Vec<Question> {
    if let Some(raw) = kv.get(&override_key(exam_id)) {
        match definition::parse_bank_lenient(&raw) {
            Ok(questions) if !questions.is_empty() => return questions,
            Ok(_) => {}
            Err(e) => warn!("failed to parse override for {}: {}", exam_id, e),
        }
    }
    load_master(registry, exam_id)
}

#[derive(Serialize)]
struct HashProjection<'a> {
    id: Option<u64>,
    question: &'a str,
    options: &'a [String],
    correct: RawCorrect,
    module: Option<&'a str>,
}

/// Opaque token over the fields that constitute a meaningful edit. Two
/// question lists hash equal exactly when those fields are all equal, so a
/// save followed by cosmetic churn still reads as unchanged.
pub fn change_hash(questions: &[Question]) -> String {
    let projection: Vec<HashProjection> = questions
        .iter()
        .map(|question| HashProjection {
            id: question.id,
            question: &question.text,
            options: &question.options,
            correct: match &question.key {
                AnswerKey::Single(index) => RawCorrect::Index(*index),
                AnswerKey::MultiSet(list)
                | AnswerKey::Sequence(list)
                | AnswerKey::YesNoVector(list) => RawCorrect::List(list.clone()),
            },
            module: question.module.as_deref(),
        })
        .collect();
    serde_json::to_string(&projection).unwrap_or_default()
}

/// Re-normalizes a question's shape after its type changed in the editor.
/// Transitions are free between all editable types; each one enforces the
/// invariants of the destination and clears fields exclusive to the origin.
pub fn apply_type_change(question: &mut Question, new_type: QuestionType) {
    question.question_type = new_type;
    match new_type {
        QuestionType::YesNoMatrix => {
            question.options = vec!["Yes".to_owned(), "No".to_owned()];
            if question.statements.is_empty() {
                question.statements.push("New statement".to_owned());
            }
            // The old key held option indices, which mean nothing as Yes/No
            // values; every statement starts over as No.
            question.key = AnswerKey::YesNoVector(vec![NO; question.statements.len()]);
            question.drag_select_required = None;
        }
        QuestionType::Sequence => {
            let order = match &question.key {
                AnswerKey::Single(_) => (0..question.options.len()).collect(),
                key => key.as_list(),
            };
            question.key = AnswerKey::Sequence(order);
            question.statements.clear();
            question.drag_select_required = None;
        }
        QuestionType::DragDropSelect => {
            let selection = question.key.as_list();
            question.drag_select_required = Some(if selection.is_empty() {
                2
            } else {
                selection.len()
            });
            question.key = AnswerKey::MultiSet(selection);
            question.statements.clear();
        }
        QuestionType::Multi => {
            question.key = AnswerKey::MultiSet(question.key.as_list());
            question.statements.clear();
            question.drag_select_required = None;
        }
        QuestionType::Standard => {
            let first = question.key.as_list().first().copied().unwrap_or(0);
            question.key = AnswerKey::Single(first);
            question.statements.clear();
            question.drag_select_required = None;
        }
        QuestionType::Hotspot => {
            question.statements.clear();
            question.drag_select_required = None;
        }
    }
}

/// Adds a choice (or, for a Yes/No matrix, a statement plus its defaulted-No
/// key entry) to a question being authored.
pub fn add_option(question: &mut Question) {
    if question.question_type == QuestionType::YesNoMatrix {
        question.statements.push("New statement".to_owned());
        let mut values = question.key.as_list();
        values.push(NO);
        question.key = AnswerKey::YesNoVector(values);
    } else {
        question.options.push("New option".to_owned());
    }
}

/// The authoring-side reconciler. Holds the mutable working copy of one
/// exam's bank and is the only writer of the override store; the exam runner
/// observes its saves through the override keys, which take precedence over
/// the untouched master in the registry.
pub struct BankEditor {
    registry: Arc<BankRegistry>,
    kv: Arc<dyn KvStore>,
    exam_id: String,
    items: Vec<Question>,
    saved_hash: String,
}

impl BankEditor {
    pub fn open(registry: Arc<BankRegistry>, kv: Arc<dyn KvStore>, exam_id: &str) -> Self {
        let items = load_working_set(&registry, kv.as_ref(), exam_id);
        let saved_hash = change_hash(&items);
        BankEditor {
            registry,
            kv,
            exam_id: exam_id.to_owned(),
            items,
            saved_hash,
        }
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.items
    }

    pub fn questions_mut(&mut self) -> &mut Vec<Question> {
        &mut self.items
    }

    pub fn has_unsaved_changes(&self) -> bool {
        change_hash(&self.items) != self.saved_hash
    }

    /// Switches the working copy to another exam. With unsaved edits this
    /// refuses unless the caller has already resolved the "discard changes?"
    /// decision.
    pub fn set_active_exam(&mut self, exam_id: &str, discard_unsaved: bool) -> Result<()> {
        if exam_id == self.exam_id {
            return Ok(());
        }
        if self.has_unsaved_changes() && !discard_unsaved {
            return Err(anyhow!(
                "there are unsaved changes for {}; confirm discarding them first",
                self.exam_id
            ));
        }
        self.exam_id = exam_id.to_owned();
        self.items = load_working_set(&self.registry, self.kv.as_ref(), exam_id);
        self.saved_hash = change_hash(&self.items);
        Ok(())
    }

    /// Appends a blank standard question with the next free id. Returns its
    /// position in the working copy.
    pub fn add_question(&mut self) -> usize {
        let max_id = self.items.iter().filter_map(|q| q.id).max().unwrap_or(0);
        self.items.push(Question {
            id: Some(max_id + 1),
            text: String::new(),
            options: vec![
                "Option A".to_owned(),
                "Option B".to_owned(),
                "Option C".to_owned(),
                "Option D".to_owned(),
            ],
            statements: Vec::new(),
            question_type: QuestionType::Standard,
            key: AnswerKey::Single(0),
            drag_select_required: None,
            module: None,
            explanation: None,
            question_images: Vec::new(),
            explanation_images: Vec::new(),
        });
        self.items.len() - 1
    }

    /// Persists the working copy as the exam's override and generates
    /// metadata when none exists yet. The registry's master bank is never
    /// touched; the override keys outrank it at resolve time, so clearing
    /// the override always uncovers pristine master content. On write
    /// failure the working copy stays in memory and still reads as unsaved.
    pub fn save(&mut self) -> Result<()> {
        let raw = definition::export_bank(&self.items)?;
        self.kv.set(&override_key(&self.exam_id), &raw)?;

        if self.stored_metadata().is_none() {
            let metadata = ExamMetadata::generate(&self.exam_id, &self.items);
            let raw_metadata = serde_json::to_string(&metadata)?;
            self.kv.set(&metadata_key(&self.exam_id), &raw_metadata)?;
        }

        self.saved_hash = change_hash(&self.items);
        info!(
            "saved {} questions as override for {}",
            self.items.len(),
            self.exam_id
        );
        Ok(())
    }

    /// Deletes the override and its metadata sibling, reloading the master as
    /// the new working copy. Irreversible; the caller must pass an already
    /// resolved confirmation. Progress logs are untouched.
    pub fn clear_override(&mut self, confirmed: bool) -> Result<()> {
        if !confirmed {
            return Err(anyhow!("clearing the override requires confirmation"));
        }
        self.kv.remove(&override_key(&self.exam_id));
        self.kv.remove(&metadata_key(&self.exam_id));
        self.items = load_master(&self.registry, &self.exam_id);
        self.saved_hash = change_hash(&self.items);
        info!("cleared override for {}", self.exam_id);
        Ok(())
    }

    /// Removes one question and immediately persists: deletion is not a
    /// staged edit. Returns the removed question.
    pub fn delete_question(&mut self, position: usize, confirmed: bool) -> Result<Question> {
        if !confirmed {
            return Err(anyhow!("deleting a question requires confirmation"));
        }
        if position >= self.items.len() {
            return Err(anyhow!("no question at position {}", position));
        }
        let removed = self.items.remove(position);
        self.save()?;
        Ok(removed)
    }

    /// Replaces the working copy with an imported bank. A malformed import
    /// rejects with a reason and leaves the current copy untouched; a
    /// successful one is unsaved until [`BankEditor::save`].
    pub fn import_json(&mut self, raw_json: &str) -> Result<usize> {
        let questions = definition::validate_import(raw_json)?;
        let count = questions.len();
        self.items = questions;
        Ok(count)
    }

    /// Suggested filename and pretty-printed body for a bank download.
    pub fn export_json(&self) -> Result<(String, String)> {
        let filename = format!(
            "{}_dump_{}.json",
            self.exam_id,
            Utc::now().format("%Y-%m-%d")
        );
        Ok((filename, definition::export_bank(&self.items)?))
    }

    fn stored_metadata(&self) -> Option<ExamMetadata> {
        let raw = self.kv.get(&metadata_key(&self.exam_id))?;
        match serde_json::from_str(&raw) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("ignoring corrupt metadata for {}: {}", self.exam_id, e);
                None
            }
        }
    }
}
