use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref MARKDOWN_IMAGE_REGEX: Regex = Regex::new(r"!\[[^\]]*\]\(([^)\s]+)\)").unwrap();
}

pub const UNCATEGORIZED_MODULE: &str = "Uncategorized";

/// Yes in a Yes/No matrix key or answer.
pub const YES: usize = 0;
/// No in a Yes/No matrix key or answer.
pub const NO: usize = 1;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ImageRef {
    pub filename: String,
}

/// The polymorphic `correct` field as it appears on the wire: a bare index or
/// a list of indices, disambiguated by `question_type` (or its absence).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawCorrect {
    Index(usize),
    List(Vec<usize>),
}

/// One question as stored in a bank dump. Import and export both use this
/// exact shape; round-tripping through it is lossless.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RawQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct: RawCorrect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drag_select_required: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_images: Option<Vec<ImageRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_images: Option<Vec<ImageRef>>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum QuestionType {
    Standard,
    Multi,
    Sequence,
    YesNoMatrix,
    DragDropSelect,
    /// Display label only. Hotspot questions carry no dedicated scoring or
    /// shuffling rule; they are handled by the shape of their answer key.
    Hotspot,
}

impl QuestionType {
    pub fn label(self) -> &'static str {
        match self {
            QuestionType::Standard => "STANDARD",
            QuestionType::Multi => "MULTI",
            QuestionType::Sequence => "SEQUENCE",
            QuestionType::YesNoMatrix => "YES_NO_MATRIX",
            QuestionType::DragDropSelect => "DRAG_DROP_SELECT",
            QuestionType::Hotspot => "HOTSPOT",
        }
    }

    pub fn from_label(label: &str) -> Option<QuestionType> {
        match label {
            "STANDARD" => Some(QuestionType::Standard),
            "MULTI" => Some(QuestionType::Multi),
            "SEQUENCE" => Some(QuestionType::Sequence),
            "YES_NO_MATRIX" => Some(QuestionType::YesNoMatrix),
            "DRAG_DROP_SELECT" => Some(QuestionType::DragDropSelect),
            "HOTSPOT" => Some(QuestionType::Hotspot),
            _ => None,
        }
    }

    /// Sequence keys are order-semantic, Yes/No keys reference `statements`
    /// rather than `options`, and drag targets are positional; reordering
    /// `options` would corrupt all three.
    pub fn shuffles_options(self) -> bool {
        !matches!(
            self,
            QuestionType::Sequence | QuestionType::YesNoMatrix | QuestionType::DragDropSelect
        )
    }
}

/// Tagged form of the `correct` field, materialized exactly once when a raw
/// question is normalized. Downstream code matches on this instead of
/// re-inferring shapes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AnswerKey {
    /// Index into `options` (order-insensitive equality is meaningless here).
    Single(usize),
    /// Unordered set of indices into `options`.
    MultiSet(Vec<usize>),
    /// Required order of indices into `options`.
    Sequence(Vec<usize>),
    /// One [`YES`]/[`NO`] value per statement, positional.
    YesNoVector(Vec<usize>),
}

impl AnswerKey {
    pub fn as_list(&self) -> Vec<usize> {
        match self {
            AnswerKey::Single(index) => vec![*index],
            AnswerKey::MultiSet(list)
            | AnswerKey::Sequence(list)
            | AnswerKey::YesNoVector(list) => list.clone(),
        }
    }
}

/// A user-submitted answer. Its shape must match the question's key shape:
/// `Choice` for standard questions, `Choices` for everything list-valued
/// (including the Yes/No vector, with [`YES`]/[`NO`] entries).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Answer {
    Choice(usize),
    Choices(Vec<usize>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Question {
    /// `None` while a question is being authored and has no id yet.
    pub id: Option<u64>,
    pub text: String,
    pub options: Vec<String>,
    /// Only meaningful for [`QuestionType::YesNoMatrix`].
    pub statements: Vec<String>,
    pub question_type: QuestionType,
    pub key: AnswerKey,
    pub drag_select_required: Option<usize>,
    pub module: Option<String>,
    pub explanation: Option<String>,
    pub question_images: Vec<ImageRef>,
    pub explanation_images: Vec<ImageRef>,
}

impl Question {
    /// Category label used for balanced sampling and filtering.
    pub fn module_label(&self) -> &str {
        match &self.module {
            Some(module) if !module.trim().is_empty() => module,
            _ => UNCATEGORIZED_MODULE,
        }
    }

    pub fn has_images(&self) -> bool {
        !self.question_images.is_empty()
            || !self.explanation_images.is_empty()
            || MARKDOWN_IMAGE_REGEX.is_match(&self.text)
            || self
                .explanation
                .as_deref()
                .map(|e| MARKDOWN_IMAGE_REGEX.is_match(e))
                .unwrap_or(false)
    }

    /// Filenames referenced by the question, both as explicit image lists and
    /// as markdown-style `![alt](file)` embeds in the prompt or explanation.
    pub fn image_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .question_images
            .iter()
            .chain(self.explanation_images.iter())
            .map(|image| image.filename.clone())
            .collect();
        for text in std::iter::once(self.text.as_str()).chain(self.explanation.as_deref()) {
            for captures in MARKDOWN_IMAGE_REGEX.captures_iter(text) {
                files.push(captures[1].to_owned());
            }
        }
        files
    }
}

impl From<RawQuestion> for Question {
    fn from(raw: RawQuestion) -> Self {
        let explicit = raw
            .question_type
            .as_deref()
            .and_then(QuestionType::from_label);
        if let (Some(label), None) = (&raw.question_type, explicit) {
            warn!("unknown question type {:?}, inferring from answer shape", label);
        }

        // Materialize the type tag once. Explicit special types win; for
        // everything else the shape of `correct` is authoritative.
        let (question_type, key) = match (explicit, raw.correct.clone()) {
            (Some(QuestionType::Sequence), RawCorrect::List(list)) => {
                (QuestionType::Sequence, AnswerKey::Sequence(list))
            }
            (Some(QuestionType::Sequence), RawCorrect::Index(index)) => {
                (QuestionType::Sequence, AnswerKey::Sequence(vec![index]))
            }
            (Some(QuestionType::YesNoMatrix), RawCorrect::List(list)) => {
                (QuestionType::YesNoMatrix, AnswerKey::YesNoVector(list))
            }
            (Some(QuestionType::YesNoMatrix), RawCorrect::Index(index)) => {
                (QuestionType::YesNoMatrix, AnswerKey::YesNoVector(vec![index]))
            }
            (Some(QuestionType::DragDropSelect), RawCorrect::List(list)) => {
                (QuestionType::DragDropSelect, AnswerKey::MultiSet(list))
            }
            (Some(QuestionType::DragDropSelect), RawCorrect::Index(index)) => {
                (QuestionType::DragDropSelect, AnswerKey::MultiSet(vec![index]))
            }
            (Some(QuestionType::Hotspot), RawCorrect::Index(index)) => {
                (QuestionType::Hotspot, AnswerKey::Single(index))
            }
            (Some(QuestionType::Hotspot), RawCorrect::List(list)) => {
                (QuestionType::Hotspot, AnswerKey::MultiSet(list))
            }
            (_, RawCorrect::Index(index)) => (QuestionType::Standard, AnswerKey::Single(index)),
            (_, RawCorrect::List(list)) => (QuestionType::Multi, AnswerKey::MultiSet(list)),
        };

        let drag_select_required = match question_type {
            QuestionType::DragDropSelect => raw.drag_select_required.or(match &key {
                AnswerKey::MultiSet(list) if !list.is_empty() => Some(list.len()),
                _ => Some(2),
            }),
            _ => None,
        };

        Question {
            id: raw.id,
            text: raw.question,
            options: raw.options,
            statements: raw.statements.unwrap_or_default(),
            question_type,
            key,
            drag_select_required,
            module: raw.module,
            explanation: raw.explanation,
            question_images: raw.question_images.unwrap_or_default(),
            explanation_images: raw.explanation_images.unwrap_or_default(),
        }
    }
}

impl From<&Question> for RawQuestion {
    fn from(question: &Question) -> Self {
        let correct = match &question.key {
            AnswerKey::Single(index) => RawCorrect::Index(*index),
            AnswerKey::MultiSet(list)
            | AnswerKey::Sequence(list)
            | AnswerKey::YesNoVector(list) => RawCorrect::List(list.clone()),
        };
        // Standard/Multi are the implicit defaults and are not tagged on the
        // wire; only the specialized types carry an explicit label.
        let question_type = match question.question_type {
            QuestionType::Standard | QuestionType::Multi => None,
            other => Some(other.label().to_owned()),
        };
        RawQuestion {
            id: question.id,
            question: question.text.clone(),
            options: question.options.clone(),
            correct,
            question_type,
            statements: if question.statements.is_empty() {
                None
            } else {
                Some(question.statements.clone())
            },
            drag_select_required: question.drag_select_required,
            module: question.module.clone(),
            explanation: question.explanation.clone(),
            question_images: if question.question_images.is_empty() {
                None
            } else {
                Some(question.question_images.clone())
            },
            explanation_images: if question.explanation_images.is_empty() {
                None
            } else {
                Some(question.explanation_images.clone())
            },
        }
    }
}
