use std::collections::BTreeSet;

use crate::bank::{Answer, AnswerKey, Question};

#[cfg(test)]
mod tests;

/// How one question was answered. Skipped is reported separately from
/// Incorrect: an unanswered question scores zero but is not counted as a
/// wrong attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Correct,
    Incorrect,
    Skipped,
}

pub fn verdict(question: &Question, answer: Option<&Answer>) -> Verdict {
    let answer = match answer {
        Some(answer) => answer,
        None => return Verdict::Skipped,
    };
    if let Answer::Choices(choices) = answer {
        if choices.is_empty() {
            return Verdict::Skipped;
        }
    }
    if is_correct(question, answer) {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    }
}

/// Type-specific equivalence between a submitted answer and the question's
/// key. A key whose indices fall outside the question's options (or whose
/// Yes/No vector does not line up with its statements) matches nothing.
pub fn is_correct(question: &Question, answer: &Answer) -> bool {
    if !key_in_range(question) {
        return false;
    }
    match (&question.key, answer) {
        (AnswerKey::Single(key), Answer::Choice(choice)) => choice == key,
        (AnswerKey::MultiSet(key), Answer::Choices(choices)) => {
            !choices.is_empty() && as_set(choices) == as_set(key)
        }
        (AnswerKey::Sequence(key), Answer::Choices(choices)) => {
            !choices.is_empty() && choices == key
        }
        (AnswerKey::YesNoVector(key), Answer::Choices(choices)) => {
            !choices.is_empty() && choices == key
        }
        _ => false,
    }
}

fn as_set(indices: &[usize]) -> BTreeSet<usize> {
    indices.iter().copied().collect()
}

fn key_in_range(question: &Question) -> bool {
    match &question.key {
        AnswerKey::Single(index) => *index < question.options.len(),
        AnswerKey::MultiSet(list) | AnswerKey::Sequence(list) => {
            list.iter().all(|&index| index < question.options.len())
        }
        AnswerKey::YesNoVector(list) => {
            list.len() == question.statements.len() && list.iter().all(|&value| value <= 1)
        }
    }
}
