use super::*;
use crate::bank::{override_key, ExamBank, Repository};
use crate::storage::MemoryKvStore;

fn question(id: u64, text: &str) -> Question {
    Question {
        id: Some(id),
        text: text.to_owned(),
        options: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
        statements: Vec::new(),
        question_type: QuestionType::Standard,
        key: AnswerKey::Single(0),
        drag_select_required: None,
        module: Some("General".to_owned()),
        explanation: None,
        question_images: Vec::new(),
        explanation_images: Vec::new(),
    }
}

struct Context {
    registry: Arc<BankRegistry>,
    kv: Arc<MemoryKvStore>,
}

impl Context {
    fn new() -> Self {
        Context {
            registry: Arc::new(BankRegistry::new()),
            kv: Arc::new(MemoryKvStore::new()),
        }
    }

    fn with_master(self, exam_id: &str, questions: Vec<Question>) -> Self {
        let metadata = ExamMetadata::generate(exam_id, &questions);
        self.registry.install(ExamBank {
            id: exam_id.to_owned(),
            metadata,
            questions,
        });
        self
    }

    fn editor(&self, exam_id: &str) -> BankEditor {
        BankEditor::open(self.registry.clone(), self.kv.clone(), exam_id)
    }

    fn repository(&self) -> Repository {
        Repository::new(self.registry.clone(), self.kv.clone())
    }
}

#[test]
fn opens_on_the_master_when_no_override_exists() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1"), question(2, "q2")]);
    let editor = ctx.editor("az900");
    assert_eq!(editor.questions().len(), 2);
    assert!(!editor.has_unsaved_changes());
}

#[test]
fn cosmetic_reload_is_not_a_change() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    let original = editor.questions()[0].clone();
    editor.questions_mut()[0] = original;
    assert!(!editor.has_unsaved_changes());
}

#[test]
fn editing_tracked_fields_reads_as_unsaved() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    editor.questions_mut()[0].text = "edited".to_owned();
    assert!(editor.has_unsaved_changes());
}

#[test]
fn editing_the_explanation_does_not_count_as_a_change() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    editor.questions_mut()[0].explanation = Some("new explanation".to_owned());
    assert!(!editor.has_unsaved_changes());
}

#[test]
fn save_persists_the_override_and_leaves_the_master_intact() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    editor.questions_mut()[0].text = "edited".to_owned();
    editor.save().unwrap();

    assert!(!editor.has_unsaved_changes());
    assert!(ctx.kv.get(&override_key("az900")).is_some());
    assert!(ctx.kv.get(&metadata_key("az900")).is_some());

    // The edit is visible through override precedence, not by replacing
    // the installed master bank.
    assert_eq!(ctx.repository().resolve("az900")[0].text, "edited");
    assert_eq!(ctx.registry.get("az900").unwrap().questions[0].text, "q1");
}

#[test]
fn saved_edits_survive_reopening_the_editor() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    editor.questions_mut()[0].text = "edited".to_owned();
    editor.save().unwrap();

    let reopened = ctx.editor("az900");
    assert_eq!(reopened.questions()[0].text, "edited");
    assert!(!reopened.has_unsaved_changes());
}

#[test]
fn switching_exams_with_unsaved_changes_requires_a_discard() {
    let ctx = Context::new()
        .with_master("az900", vec![question(1, "q1")])
        .with_master("ai102", vec![question(1, "other")]);
    let mut editor = ctx.editor("az900");
    editor.questions_mut()[0].text = "edited".to_owned();

    assert!(editor.set_active_exam("ai102", false).is_err());
    assert_eq!(editor.exam_id(), "az900");

    editor.set_active_exam("ai102", true).unwrap();
    assert_eq!(editor.exam_id(), "ai102");
    assert_eq!(editor.questions()[0].text, "other");
    assert!(!editor.has_unsaved_changes());
}

#[test]
fn added_questions_get_the_next_free_id() {
    let ctx = Context::new().with_master("az900", vec![question(7, "q7"), question(3, "q3")]);
    let mut editor = ctx.editor("az900");
    let position = editor.add_question();
    assert_eq!(position, 2);
    let added = &editor.questions()[position];
    assert_eq!(added.id, Some(8));
    assert_eq!(added.options.len(), 4);
    assert_eq!(added.key, AnswerKey::Single(0));
    assert!(editor.has_unsaved_changes());
}

#[test]
fn delete_requires_confirmation_and_auto_saves() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1"), question(2, "q2")]);
    let mut editor = ctx.editor("az900");

    assert!(editor.delete_question(0, false).is_err());
    assert_eq!(editor.questions().len(), 2);

    let removed = editor.delete_question(0, true).unwrap();
    assert_eq!(removed.id, Some(1));
    assert_eq!(editor.questions().len(), 1);
    assert!(!editor.has_unsaved_changes());
    assert!(ctx.kv.get(&override_key("az900")).is_some());
}

#[test]
fn delete_out_of_range_is_an_error() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    assert!(editor.delete_question(5, true).is_err());
}

#[test]
fn clear_override_requires_confirmation_and_restores_the_master() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    editor.questions_mut()[0].text = "edited".to_owned();
    editor.save().unwrap();

    assert!(editor.clear_override(false).is_err());
    assert!(ctx.kv.get(&override_key("az900")).is_some());

    editor.clear_override(true).unwrap();
    assert!(ctx.kv.get(&override_key("az900")).is_none());
    assert!(ctx.kv.get(&metadata_key("az900")).is_none());
    assert_eq!(editor.questions()[0].text, "q1");
    assert_eq!(ctx.repository().resolve("az900")[0].text, "q1");
}

#[test]
fn saved_edits_never_leak_past_a_cleared_override() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1"), question(2, "q2")]);
    let mut editor = ctx.editor("az900");
    editor.questions_mut()[0].text = "edited".to_owned();
    editor.save().unwrap();
    editor.delete_question(1, true).unwrap();
    editor.save().unwrap();

    editor.clear_override(true).unwrap();
    let resolved = ctx.repository().resolve("az900");
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].text, "q1");
}

#[test]
fn clear_override_does_not_touch_progress_logs() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let outcome = crate::session::SessionOutcome {
        exam_id: "az900".to_owned(),
        score: 85,
        passed: true,
        correct: 17,
        incorrect: 3,
        skipped: 0,
        total: 20,
        time_spent_minutes: 30,
    };
    let log = crate::progress::record_attempt(ctx.kv.as_ref(), "az900", &outcome).unwrap();

    let mut editor = ctx.editor("az900");
    editor.questions_mut()[0].text = "edited".to_owned();
    editor.save().unwrap();
    editor.clear_override(true).unwrap();

    assert_eq!(crate::progress::load(ctx.kv.as_ref(), "az900"), log);
}

#[test]
fn import_replaces_the_working_copy_unsaved() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    let count = editor
        .import_json(r#"[{"id": 1, "question": "imported", "options": ["x", "y"], "correct": 1}]"#)
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(editor.questions()[0].text, "imported");
    assert!(editor.has_unsaved_changes());
    assert!(ctx.kv.get(&override_key("az900")).is_none());
}

#[test]
fn malformed_import_is_rejected_and_keeps_the_current_copy() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    let mut editor = ctx.editor("az900");
    assert!(editor.import_json(r#"[{"question": "no options or correct"}]"#).is_err());
    assert_eq!(editor.questions()[0].text, "q1");
}

#[test]
fn export_round_trips_through_import() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1"), question(2, "q2")]);
    let mut editor = ctx.editor("az900");
    let (filename, body) = editor.export_json().unwrap();
    assert!(filename.starts_with("az900_dump_"));
    assert!(filename.ends_with(".json"));

    assert_eq!(editor.import_json(&body).unwrap(), 2);
    assert!(!editor.has_unsaved_changes());
}

#[test]
fn corrupt_override_falls_back_to_the_master_copy() {
    let ctx = Context::new().with_master("az900", vec![question(1, "q1")]);
    ctx.kv.set(&override_key("az900"), "{broken").unwrap();
    let editor = ctx.editor("az900");
    assert_eq!(editor.questions()[0].text, "q1");
}

#[test]
fn type_change_to_yes_no_matrix_builds_a_valid_matrix() {
    let mut q = question(1, "q1");
    apply_type_change(&mut q, QuestionType::YesNoMatrix);
    assert_eq!(q.options, vec!["Yes".to_owned(), "No".to_owned()]);
    assert_eq!(q.statements.len(), 1);
    assert_eq!(q.key, AnswerKey::YesNoVector(vec![1]));
}

#[test]
fn type_change_to_yes_no_matrix_discards_option_indices() {
    let mut q = question(1, "q1");
    q.key = AnswerKey::Single(3);
    q.statements = vec!["s1".to_owned(), "s2".to_owned()];
    apply_type_change(&mut q, QuestionType::YesNoMatrix);
    // Old option indices are not Yes/No values; everything resets to No.
    assert_eq!(q.key, AnswerKey::YesNoVector(vec![1, 1]));
}

#[test]
fn type_change_to_sequence_seeds_the_identity_order() {
    let mut q = question(1, "q1");
    apply_type_change(&mut q, QuestionType::Sequence);
    assert_eq!(q.key, AnswerKey::Sequence(vec![0, 1, 2]));
}

#[test]
fn type_change_to_drag_drop_sets_the_required_count() {
    let mut q = question(1, "q1");
    q.key = AnswerKey::MultiSet(vec![0, 2]);
    q.question_type = QuestionType::Multi;
    apply_type_change(&mut q, QuestionType::DragDropSelect);
    assert_eq!(q.drag_select_required, Some(2));
    assert_eq!(q.key, AnswerKey::MultiSet(vec![0, 2]));
}

#[test]
fn type_change_back_to_standard_keeps_the_first_key_entry() {
    let mut q = question(1, "q1");
    q.key = AnswerKey::MultiSet(vec![2, 1]);
    q.question_type = QuestionType::Multi;
    apply_type_change(&mut q, QuestionType::Standard);
    assert_eq!(q.key, AnswerKey::Single(2));
    assert!(q.statements.is_empty());
    assert_eq!(q.drag_select_required, None);
}

#[test]
fn add_option_extends_the_matrix_key_with_no() {
    let mut q = question(1, "q1");
    apply_type_change(&mut q, QuestionType::YesNoMatrix);
    add_option(&mut q);
    assert_eq!(q.statements.len(), 2);
    assert_eq!(q.key, AnswerKey::YesNoVector(vec![1, 1]));

    let mut standard = question(1, "q1");
    add_option(&mut standard);
    assert_eq!(standard.options.len(), 4);
}
