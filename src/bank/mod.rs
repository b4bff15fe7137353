use anyhow::Result;
use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::storage::KvStore;

pub mod definition;


pub use definition::question::{Answer, AnswerKey, ImageRef, Question, QuestionType};

pub const DEFAULT_DURATION_MINUTES: u64 = 45;
pub const DEFAULT_PASS_SCORE: u32 = 75;
pub const DEFAULT_QUESTION_COUNT: usize = 45;

const ACTIVATION_CONFIG_KEY: &str = "exam_activation_config";
const OVERRIDE_KEY_PREFIX: &str = "custom_";
const OVERRIDE_KEY_SUFFIX: &str = "_questions";

/// Key of the serialized user-edited question array for one exam.
pub fn override_key(exam_id: &str) -> String {
    format!("{}{}{}", OVERRIDE_KEY_PREFIX, exam_id, OVERRIDE_KEY_SUFFIX)
}

/// Key of the serialized metadata sibling of an override.
pub fn metadata_key(exam_id: &str) -> String {
    format!("exam_metadata_{}", exam_id)
}

/// Key of the per-exam progress log.
pub fn progress_key(exam_id: &str) -> String {
    format!("{}_progress", exam_id)
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ExamMetadata {
    pub name: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub badge: String,
    pub icon: String,
    /// Session time budget, in minutes.
    pub duration: u64,
    /// Target session size; banks larger than this get sampled down.
    #[serde(rename = "questionCount")]
    pub question_count: usize,
    #[serde(rename = "passScore")]
    pub pass_score: u32,
    #[serde(default)]
    pub modules: Vec<String>,
}

impl ExamMetadata {
    /// Best-effort metadata inferred from the exam id and its questions, for
    /// banks that were imported without a metadata sibling. Heuristic, not
    /// authoritative.
    pub fn generate(exam_id: &str, questions: &[Question]) -> Self {
        ExamMetadata {
            name: exam_id.to_uppercase(),
            full_name: format!("Custom Exam: {}", exam_id),
            badge: "Custom".to_owned(),
            icon: "fas fa-book".to_owned(),
            duration: DEFAULT_DURATION_MINUTES,
            question_count: questions.len().min(DEFAULT_QUESTION_COUNT),
            pass_score: DEFAULT_PASS_SCORE,
            modules: definition::extract_modules(questions),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExamBank {
    pub id: String,
    pub metadata: ExamMetadata,
    pub questions: Vec<Question>,
}

/// A provider of bundled or remotely-fetched master banks. Implementations
/// wrap whatever transport delivers the data (embedded assets, a dump
/// directory, an HTTP fetch adapter).
pub trait BankSource: Send + Sync {
    fn load(&self, exam_id: &str) -> Option<ExamBank>;
}

/// Reads `{exam_id}.json` bank dumps from a directory.
pub struct DumpDirSource {
    dir: PathBuf,
}

impl DumpDirSource {
    pub fn new(dir: PathBuf) -> Self {
        DumpDirSource { dir }
    }
}

impl BankSource for DumpDirSource {
    fn load(&self, exam_id: &str) -> Option<ExamBank> {
        let path = self.dir.join(format!("{}.json", exam_id));
        let raw = fs::read_to_string(&path).ok()?;
        match definition::parse_bank_lenient(&raw) {
            Ok(questions) if !questions.is_empty() => {
                let metadata = ExamMetadata::generate(exam_id, &questions);
                Some(ExamBank {
                    id: exam_id.to_owned(),
                    metadata,
                    questions,
                })
            }
            Ok(_) => None,
            Err(e) => {
                warn!("ignoring unreadable bank dump {}: {}", path.display(), e);
                None
            }
        }
    }
}

type ReadyCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Registry of loaded master banks. Constructed once and injected wherever
/// banks are needed; there is no ambient global bank state. Datasets that
/// arrive asynchronously are flagged pending and announced through
/// [`BankRegistry::on_ready`] when they land.
#[derive(Default)]
pub struct BankRegistry {
    banks: RwLock<HashMap<String, ExamBank>>,
    pending: RwLock<HashSet<String>>,
    sources: RwLock<Vec<Box<dyn BankSource>>>,
    ready_callbacks: RwLock<HashMap<String, Vec<ReadyCallback>>>,
}

impl BankRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_source(&self, source: Box<dyn BankSource>) {
        self.sources.write().push(source);
    }

    /// Installs (or replaces) a bank and fires any readiness callbacks
    /// registered for it.
    pub fn install(&self, bank: ExamBank) {
        let exam_id = bank.id.clone();
        self.banks.write().insert(exam_id.clone(), bank);
        self.pending.write().remove(&exam_id);
        let callbacks = self
            .ready_callbacks
            .write()
            .remove(&exam_id)
            .unwrap_or_default();
        for callback in callbacks {
            callback(&exam_id);
        }
    }

    /// Flags an exam whose dataset is being fetched. Resolution reports it as
    /// pending rather than missing until [`BankRegistry::install`] runs.
    pub fn mark_pending(&self, exam_id: &str) {
        if !self.banks.read().contains_key(exam_id) {
            self.pending.write().insert(exam_id.to_owned());
        }
    }

    pub fn is_pending(&self, exam_id: &str) -> bool {
        self.pending.read().contains(exam_id)
    }

    pub fn get(&self, exam_id: &str) -> Option<ExamBank> {
        self.banks.read().get(exam_id).cloned()
    }

    pub fn exam_ids(&self) -> Vec<String> {
        self.banks.read().keys().cloned().collect()
    }

    /// Runs `callback` once the exam's data is available. Fires immediately
    /// when the bank is already installed.
    pub fn on_ready(&self, exam_id: &str, callback: ReadyCallback) {
        if self.banks.read().contains_key(exam_id) {
            callback(exam_id);
            return;
        }
        self.ready_callbacks
            .write()
            .entry(exam_id.to_owned())
            .or_default()
            .push(callback);
    }

    fn load_from_sources(&self, exam_id: &str) -> Option<ExamBank> {
        let bank = {
            let sources = self.sources.read();
            sources.iter().find_map(|source| source.load(exam_id))
        }?;
        self.install(bank.clone());
        Some(bank)
    }
}

/// Outcome of resolving an exam whose dataset may still be in flight.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Ready(ExamBank),
    /// Being fetched; retry after [`BankRegistry::on_ready`] fires.
    Pending,
    Missing,
}

/// Resolves the authoritative question list for an exam from layered sources:
/// user override first, then the registry, then any registered bank sources.
/// Reads never mutate the layers, except that a source hit lazily populates
/// the registry for reuse.
pub struct Repository {
    registry: Arc<BankRegistry>,
    kv: Arc<dyn KvStore>,
}

impl Repository {
    pub fn new(registry: Arc<BankRegistry>, kv: Arc<dyn KvStore>) -> Self {
        Repository { registry, kv }
    }

    pub fn registry(&self) -> &Arc<BankRegistry> {
        &self.registry
    }

    /// Returns owned question copies; an empty list means the exam is not
    /// available and a session must not be started from it.
    pub fn resolve(&self, exam_id: &str) -> Vec<Question> {
        if let Some(questions) = self.override_questions(exam_id) {
            return questions;
        }
        if let Some(bank) = self.registry.get(exam_id) {
            if !bank.questions.is_empty() {
                return bank.questions;
            }
        }
        if let Some(bank) = self.registry.load_from_sources(exam_id) {
            return bank.questions;
        }
        Vec::new()
    }

    /// Like [`Repository::resolve`] but distinguishes "still being fetched"
    /// from "unknown exam".
    pub fn resolution(&self, exam_id: &str) -> Resolution {
        if let Some(questions) = self.override_questions(exam_id) {
            let metadata = self.metadata(exam_id);
            return Resolution::Ready(ExamBank {
                id: exam_id.to_owned(),
                metadata,
                questions,
            });
        }
        if let Some(bank) = self.registry.get(exam_id) {
            if !bank.questions.is_empty() {
                return Resolution::Ready(bank);
            }
        }
        if let Some(bank) = self.registry.load_from_sources(exam_id) {
            return Resolution::Ready(bank);
        }
        if self.registry.is_pending(exam_id) {
            return Resolution::Pending;
        }
        Resolution::Missing
    }

    pub fn metadata(&self, exam_id: &str) -> ExamMetadata {
        if let Some(raw) = self.kv.get(&metadata_key(exam_id)) {
            match serde_json::from_str(&raw) {
                Ok(metadata) => return metadata,
                Err(e) => warn!("ignoring corrupt metadata for {}: {}", exam_id, e),
            }
        }
        if let Some(bank) = self.registry.get(exam_id) {
            return bank.metadata;
        }
        ExamMetadata::generate(exam_id, &self.resolve(exam_id))
    }

    fn override_questions(&self, exam_id: &str) -> Option<Vec<Question>> {
        let raw = self.kv.get(&override_key(exam_id))?;
        match definition::parse_bank_lenient(&raw) {
            Ok(questions) if !questions.is_empty() => {
                info!("using local question override for {}", exam_id);
                Some(questions)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("ignoring corrupt question override for {}: {}", exam_id, e);
                None
            }
        }
    }

    /// Exam ids that have a persisted override, extracted from the store's
    /// key namespace.
    pub fn custom_exam_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .kv
            .keys()
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix(OVERRIDE_KEY_PREFIX)
                    .and_then(|rest| rest.strip_suffix(OVERRIDE_KEY_SUFFIX))
                    .filter(|id| !id.is_empty())
                    .map(str::to_owned)
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Exams default to active; deactivation only hides them from listings,
    /// it never deletes data.
    pub fn is_active(&self, exam_id: &str) -> bool {
        self.activation_config()
            .get(exam_id)
            .copied()
            .unwrap_or(true)
    }

    pub fn activate(&self, exam_id: &str) -> Result<()> {
        self.set_active(exam_id, true)
    }

    pub fn deactivate(&self, exam_id: &str) -> Result<()> {
        self.set_active(exam_id, false)
    }

    pub fn active_exam_ids(&self) -> Vec<String> {
        let mut ids = self.registry.exam_ids();
        ids.extend(self.custom_exam_ids());
        ids.sort();
        ids.dedup();
        ids.retain(|id| self.is_active(id));
        ids
    }

    fn activation_config(&self) -> HashMap<String, bool> {
        let raw = match self.kv.get(ACTIVATION_CONFIG_KEY) {
            Some(raw) => raw,
            None => return HashMap::new(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("ignoring corrupt exam activation config: {}", e);
            HashMap::new()
        })
    }

    fn set_active(&self, exam_id: &str, active: bool) -> Result<()> {
        let mut config = self.activation_config();
        config.insert(exam_id.to_owned(), active);
        let raw = serde_json::to_string(&config)?;
        self.kv.set(ACTIVATION_CONFIG_KEY, &raw)
    }
}
