use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::bank::{Answer, ExamMetadata, Question};

pub mod evaluate;
pub mod randomize;
pub mod sampler;


use evaluate::Verdict;

/// One timed exam attempt: a balanced random sample of the bank with options
/// shuffled once at build time, plus everything the user does to it. Sessions
/// are ephemeral; only the graded outcome outlives them.
pub struct Session {
    exam_id: String,
    pass_score: u32,
    questions: Vec<Question>,
    answers: HashMap<usize, Answer>,
    marked_for_review: HashSet<usize>,
    started_at: DateTime<Utc>,
    time_limit: Duration,
    time_elapsed: Duration,
}

impl Session {
    /// Builds the active question set: sample, then randomize each copy.
    /// Randomization happens here and never again, so revisiting a question
    /// always shows the same option order.
    pub fn start(exam_id: &str, bank: &[Question], metadata: &ExamMetadata) -> Result<Session> {
        if bank.is_empty() {
            return Err(anyhow!("no questions available for exam {}", exam_id));
        }
        let target = if metadata.question_count > 0 {
            metadata.question_count
        } else {
            crate::bank::DEFAULT_QUESTION_COUNT
        };
        let questions: Vec<Question> = sampler::sample_balanced(bank, target)
            .iter()
            .map(randomize::randomize_options)
            .collect();
        Ok(Session {
            exam_id: exam_id.to_owned(),
            pass_score: metadata.pass_score,
            questions,
            answers: HashMap::new(),
            marked_for_review: HashSet::new(),
            started_at: Utc::now(),
            time_limit: Duration::from_secs(metadata.duration * 60),
            time_elapsed: Duration::default(),
        })
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, position: usize) -> Option<&Question> {
        self.questions.get(position)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn answer(&mut self, position: usize, answer: Answer) -> Result<()> {
        if position >= self.questions.len() {
            return Err(anyhow!("no question at position {}", position));
        }
        self.answers.insert(position, answer);
        Ok(())
    }

    pub fn clear_answer(&mut self, position: usize) {
        self.answers.remove(&position);
    }

    pub fn answer_for(&self, position: usize) -> Option<&Answer> {
        self.answers.get(&position)
    }

    /// Returns the new marked state.
    pub fn toggle_review(&mut self, position: usize) -> bool {
        if self.marked_for_review.remove(&position) {
            false
        } else {
            self.marked_for_review.insert(position);
            true
        }
    }

    pub fn is_marked_for_review(&self, position: usize) -> bool {
        self.marked_for_review.contains(&position)
    }

    /// Advances the countdown. The caller drives this from its timer and
    /// auto-finishes once [`Session::is_time_up`] flips.
    pub fn tick(&mut self, dt: Duration) {
        self.time_elapsed += dt;
    }

    pub fn is_time_up(&self) -> bool {
        self.time_elapsed >= self.time_limit
    }

    pub fn remaining_time(&self) -> Duration {
        self.time_limit
            .checked_sub(self.time_elapsed)
            .unwrap_or_default()
    }

    pub fn verdict(&self, position: usize) -> Option<Verdict> {
        let question = self.questions.get(position)?;
        Some(evaluate::verdict(question, self.answers.get(&position)))
    }

    /// Pure function over the session state; grading twice yields the same
    /// outcome. Persisting the attempt is a separate step
    /// ([`crate::progress::record_attempt`]).
    pub fn grade(&self) -> SessionOutcome {
        let mut correct = 0;
        let mut incorrect = 0;
        let mut skipped = 0;
        for (position, question) in self.questions.iter().enumerate() {
            match evaluate::verdict(question, self.answers.get(&position)) {
                Verdict::Correct => correct += 1,
                Verdict::Incorrect => incorrect += 1,
                Verdict::Skipped => skipped += 1,
            }
        }
        let total = self.questions.len();
        let score = if total == 0 {
            0
        } else {
            ((correct as f64 / total as f64) * 100.0).round() as u32
        };
        SessionOutcome {
            exam_id: self.exam_id.clone(),
            score,
            passed: score >= self.pass_score,
            correct,
            incorrect,
            skipped,
            total,
            time_spent_minutes: (self.time_elapsed.as_secs_f64() / 60.0).round() as u64,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionOutcome {
    pub exam_id: String,
    /// Percentage, rounded.
    pub score: u32,
    pub passed: bool,
    pub correct: usize,
    pub incorrect: usize,
    /// Unanswered questions; counted apart from incorrect ones.
    pub skipped: usize,
    pub total: usize,
    pub time_spent_minutes: u64,
}
