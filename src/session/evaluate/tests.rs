use super::*;
use crate::bank::QuestionType;

fn question(question_type: QuestionType, key: AnswerKey, option_count: usize) -> Question {
    let statements = match &key {
        AnswerKey::YesNoVector(values) => (0..values.len())
            .map(|i| format!("statement {}", i))
            .collect(),
        _ => Vec::new(),
    };
    Question {
        id: Some(1),
        text: "prompt".to_owned(),
        options: (0..option_count).map(|i| format!("option {}", i)).collect(),
        statements,
        question_type,
        key,
        drag_select_required: None,
        module: None,
        explanation: None,
        question_images: Vec::new(),
        explanation_images: Vec::new(),
    }
}

#[test]
fn single_choice_matches_key() {
    let q = question(QuestionType::Standard, AnswerKey::Single(2), 4);
    assert!(is_correct(&q, &Answer::Choice(2)));
    assert!(!is_correct(&q, &Answer::Choice(1)));
}

#[test]
fn unanswered_question_is_skipped() {
    let q = question(QuestionType::Standard, AnswerKey::Single(2), 4);
    assert_eq!(verdict(&q, None), Verdict::Skipped);
    assert_eq!(verdict(&q, Some(&Answer::Choice(2))), Verdict::Correct);
    assert_eq!(verdict(&q, Some(&Answer::Choice(0))), Verdict::Incorrect);
}

#[test]
fn multi_select_is_order_insensitive() {
    let q = question(QuestionType::Multi, AnswerKey::MultiSet(vec![0, 2]), 4);
    assert!(is_correct(&q, &Answer::Choices(vec![2, 0])));
    assert!(is_correct(&q, &Answer::Choices(vec![0, 2])));
    assert!(!is_correct(&q, &Answer::Choices(vec![0])));
    assert!(!is_correct(&q, &Answer::Choices(vec![0, 1, 2])));
}

#[test]
fn multi_select_ignores_duplicate_selections() {
    let q = question(QuestionType::Multi, AnswerKey::MultiSet(vec![0, 2]), 4);
    assert!(is_correct(&q, &Answer::Choices(vec![2, 0, 2])));
}

#[test]
fn sequence_requires_exact_order() {
    let q = question(QuestionType::Sequence, AnswerKey::Sequence(vec![1, 0, 2]), 3);
    assert!(is_correct(&q, &Answer::Choices(vec![1, 0, 2])));
    assert!(!is_correct(&q, &Answer::Choices(vec![0, 1, 2])));
    assert!(!is_correct(&q, &Answer::Choices(vec![1, 0])));
}

#[test]
fn yes_no_matrix_is_positional() {
    let q = question(
        QuestionType::YesNoMatrix,
        AnswerKey::YesNoVector(vec![0, 1, 0]),
        2,
    );
    assert!(is_correct(&q, &Answer::Choices(vec![0, 1, 0])));
    assert!(!is_correct(&q, &Answer::Choices(vec![0, 0, 1])));
    assert!(!is_correct(&q, &Answer::Choices(vec![0, 1])));
}

#[test]
fn drag_drop_select_compares_as_a_set() {
    let q = question(
        QuestionType::DragDropSelect,
        AnswerKey::MultiSet(vec![1, 3]),
        5,
    );
    assert!(is_correct(&q, &Answer::Choices(vec![3, 1])));
    assert!(!is_correct(&q, &Answer::Choices(vec![1])));
}

#[test]
fn empty_selection_is_skipped_not_incorrect() {
    let q = question(QuestionType::Multi, AnswerKey::MultiSet(vec![0, 2]), 4);
    assert_eq!(verdict(&q, Some(&Answer::Choices(Vec::new()))), Verdict::Skipped);
}

#[test]
fn answer_shape_mismatch_is_incorrect() {
    let q = question(QuestionType::Multi, AnswerKey::MultiSet(vec![0]), 4);
    assert!(!is_correct(&q, &Answer::Choice(0)));

    let q = question(QuestionType::Standard, AnswerKey::Single(0), 4);
    assert!(!is_correct(&q, &Answer::Choices(vec![0])));
}

#[test]
fn out_of_range_key_matches_nothing() {
    let q = question(QuestionType::Standard, AnswerKey::Single(7), 4);
    assert!(!is_correct(&q, &Answer::Choice(7)));

    let q = question(QuestionType::Multi, AnswerKey::MultiSet(vec![0, 9]), 4);
    assert!(!is_correct(&q, &Answer::Choices(vec![0, 9])));
}

#[test]
fn yes_no_key_must_line_up_with_statements() {
    let mut q = question(
        QuestionType::YesNoMatrix,
        AnswerKey::YesNoVector(vec![0, 1]),
        2,
    );
    q.statements.pop();
    assert!(!is_correct(&q, &Answer::Choices(vec![0, 1])));

    let q = question(
        QuestionType::YesNoMatrix,
        AnswerKey::YesNoVector(vec![0, 3]),
        2,
    );
    assert!(!is_correct(&q, &Answer::Choices(vec![0, 3])));
}
