use rand::seq::SliceRandom;
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::bank::Question;


/// Uniform sample of `count` questions without replacement.
pub fn sample_uniform(all: &[Question], count: usize) -> Vec<Question> {
    let mut copy = all.to_vec();
    copy.shuffle(&mut rand::thread_rng());
    copy.truncate(count);
    copy
}

/// Samples `count` questions spread as evenly as possible across module
/// buckets. Each bucket gets `count / buckets` questions, with the remainder
/// awarded to the largest buckets first; buckets too small for their share
/// are backfilled round-robin from the others. The result is shuffled again
/// so the output does not cluster by module.
pub fn sample_balanced(all: &[Question], count: usize) -> Vec<Question> {
    if all.is_empty() {
        return Vec::new();
    }
    let mut rng = rand::thread_rng();
    if all.len() <= count {
        let mut copy = all.to_vec();
        copy.shuffle(&mut rng);
        return copy;
    }

    let mut buckets: HashMap<&str, Vec<Question>> = HashMap::new();
    for question in all {
        buckets
            .entry(question.module_label())
            .or_insert_with(Vec::new)
            .push(question.clone());
    }
    let mut groups: Vec<Vec<Question>> = buckets.into_iter().map(|(_, group)| group).collect();
    for group in groups.iter_mut() {
        group.shuffle(&mut rng);
    }
    groups.sort_by_key(|group| Reverse(group.len()));

    let base = count / groups.len();
    let mut remainder = count % groups.len();
    let mut selected = Vec::with_capacity(count);
    let mut leftovers: Vec<Vec<Question>> = Vec::new();

    for mut group in groups {
        let mut target = base;
        if remainder > 0 {
            target += 1;
            remainder -= 1;
        }
        let target = target.min(group.len());
        let rest = group.split_off(target);
        selected.extend(group);
        if !rest.is_empty() {
            leftovers.push(rest);
        }
    }

    let mut turn = 0;
    while selected.len() < count && !leftovers.is_empty() {
        let slot = turn % leftovers.len();
        if let Some(question) = leftovers[slot].pop() {
            selected.push(question);
        }
        leftovers.retain(|group| !group.is_empty());
        turn += 1;
    }

    selected.shuffle(&mut rng);
    selected
}
