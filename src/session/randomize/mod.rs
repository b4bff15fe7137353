use rand::seq::SliceRandom;

use crate::bank::{AnswerKey, Question};


/// Deep copy of a question with its choices in a fresh random order and every
/// answer index remapped to follow its option string. Types whose keys are
/// order-semantic or reference `statements` come back unchanged, as do
/// questions with no options to shuffle.
pub fn randomize_options(question: &Question) -> Question {
    let mut copy = question.clone();
    if copy.options.is_empty() || !copy.question_type.shuffles_options() {
        return copy;
    }

    // order[new_position] = original index
    let mut order: Vec<usize> = (0..question.options.len()).collect();
    order.shuffle(&mut rand::thread_rng());

    copy.options = order
        .iter()
        .map(|&original| question.options[original].clone())
        .collect();

    // An index that never referenced a valid option has no new position;
    // it stays as-is and the evaluator treats it as matching nothing.
    let remap = |original: usize| {
        order
            .iter()
            .position(|&candidate| candidate == original)
            .unwrap_or(original)
    };
    copy.key = match &question.key {
        AnswerKey::Single(index) => AnswerKey::Single(remap(*index)),
        AnswerKey::MultiSet(list) => {
            AnswerKey::MultiSet(list.iter().map(|&index| remap(index)).collect())
        }
        AnswerKey::Sequence(list) => AnswerKey::Sequence(list.clone()),
        AnswerKey::YesNoVector(list) => AnswerKey::YesNoVector(list.clone()),
    };
    copy
}
