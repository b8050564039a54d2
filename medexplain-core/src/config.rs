// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration
//!
//! Every heuristic constant the engine uses (lexicons, phrase patterns,
//! friendliness words, scoring coefficients, the rewrite instruction) lives
//! here so components receive it explicitly and tests can swap in small
//! fixtures.
//!
//! Loading priority: TOML file > environment > defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Instruction sent ahead of the user's text on every rewrite request
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are MedExplain, a friendly assistant that rewrites medical text for a lay reader.

Explain the text in short sentences and everyday words, as if speaking to a patient.
Whenever you explain a medical or scientific term, wrap the term in double brackets,
for example: \"You have [[Myocardial infarction]], which means a heart attack.\"

Rules:
- If the text is not about medicine, health or biology, reply exactly:
  \"This topic isn't medical related, Please try again.\"
- Never output empty brackets or placeholders.
- Include short usage instructions (dosage, timing, care advice) when relevant.
- End every medical explanation with:
  \"Note: This is for understanding only, not a medical diagnosis.\"";

/// Reply used when the input is judged off-topic
pub const DEFAULT_OFF_TOPIC_MESSAGE: &str = "This topic isn't medical related, Please try again.";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub flags: FlagConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// How streamed fragments are joined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyMode {
    /// Fragments are appended as-is (token streams carry their own spacing)
    #[default]
    Concatenate,
    /// Fragments are joined with a single space
    Spaced,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Base URL of the Ollama-compatible service (e.g., "http://localhost:11434")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ask the service for line-delimited incremental frames
    #[serde(default = "default_stream")]
    pub stream: bool,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub assembly: AssemblyMode,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            stream: default_stream(),
            system_prompt: default_system_prompt(),
            assembly: AssemblyMode::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the term table and its snapshots
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_table_file")]
    pub table_file: String,

    /// Keep a `.bak` copy of the previous table on every save
    #[serde(default = "default_keep_backup")]
    pub keep_backup: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            table_file: default_table_file(),
            keep_backup: default_keep_backup(),
        }
    }
}

impl StorageConfig {
    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join(&self.table_file)
    }
}

/// Term extraction heuristics
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Known clinical/administrative words and short phrases, matched whole-word
    #[serde(default = "default_known_terms")]
    pub known_terms: Vec<String>,

    /// Multi-word clinical phrase patterns (case-insensitive); first match of each is kept
    #[serde(default = "default_phrase_patterns")]
    pub phrase_patterns: Vec<String>,

    /// Drug-and-dose pattern (case-sensitive), e.g. "Aspirin 81mg"
    #[serde(default = "default_dosage_pattern")]
    pub dosage_pattern: String,

    /// Minimum length of an unknown alphabetic token to be kept
    #[serde(default = "default_long_word_min_len")]
    pub long_word_min_len: usize,

    /// Safety-net pattern applied to the original input when the rewrite
    /// marks no terms
    #[serde(default = "default_capitalized_pattern")]
    pub capitalized_pattern: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            known_terms: default_known_terms(),
            phrase_patterns: default_phrase_patterns(),
            dosage_pattern: default_dosage_pattern(),
            long_word_min_len: default_long_word_min_len(),
            capitalized_pattern: default_capitalized_pattern(),
        }
    }
}

/// Per-term flags recorded with every merge
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlagConfig {
    /// Heuristic pass: misunderstood when the term has more letters than this
    #[serde(default = "default_misunderstood_letters")]
    pub misunderstood_letters: usize,

    /// Explained pass: misunderstood when the term has more characters than this
    #[serde(default = "default_explained_misunderstood_chars")]
    pub explained_misunderstood_chars: usize,

    /// Heuristic pass: usage-instruction pattern applied to the term itself
    #[serde(default = "default_term_usage_pattern")]
    pub term_usage_pattern: String,

    /// Explained pass: usage-instruction pattern applied to the rewritten text
    #[serde(default = "default_text_usage_pattern")]
    pub text_usage_pattern: String,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            misunderstood_letters: default_misunderstood_letters(),
            explained_misunderstood_chars: default_explained_misunderstood_chars(),
            term_usage_pattern: default_term_usage_pattern(),
            text_usage_pattern: default_text_usage_pattern(),
        }
    }
}

/// Readability formula coefficients and the friendliness lexicon
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    #[serde(default = "default_friendly_terms")]
    pub friendly_terms: Vec<String>,
    #[serde(default = "default_sentence_coefficient")]
    pub sentence_coefficient: f64,
    #[serde(default = "default_syllable_coefficient")]
    pub syllable_coefficient: f64,
    #[serde(default = "default_grade_offset")]
    pub grade_offset: f64,
    /// Points removed from 10 per grade level
    #[serde(default = "default_grade_weight")]
    pub grade_weight: f64,
    #[serde(default = "default_bracket_weight")]
    pub bracket_weight: f64,
    #[serde(default = "default_bracket_cap")]
    pub bracket_cap: f64,
    #[serde(default = "default_friendly_weight")]
    pub friendly_weight: f64,
    #[serde(default = "default_friendly_cap")]
    pub friendly_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            friendly_terms: default_friendly_terms(),
            sentence_coefficient: default_sentence_coefficient(),
            syllable_coefficient: default_syllable_coefficient(),
            grade_offset: default_grade_offset(),
            grade_weight: default_grade_weight(),
            bracket_weight: default_bracket_weight(),
            bracket_cap: default_bracket_cap(),
            friendly_weight: default_friendly_weight(),
            friendly_cap: default_friendly_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Score recorded by the intake pass before the rewrite exists
    #[serde(default)]
    pub placeholder_score: f64,

    /// Replace the rewrite with `off_topic_message` when the input looks non-medical
    #[serde(default = "default_guard_off_topic")]
    pub guard_off_topic: bool,

    #[serde(default = "default_medical_keywords")]
    pub medical_keywords: Vec<String>,

    #[serde(default = "default_off_topic_message")]
    pub off_topic_message: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            placeholder_score: 0.0,
            guard_off_topic: default_guard_off_topic(),
            medical_keywords: default_medical_keywords(),
            off_topic_message: default_off_topic_message(),
        }
    }
}

// Default values
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "deepseek-r1:1.5b".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_stream() -> bool {
    true
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./dataanalytics")
}

fn default_table_file() -> String {
    "medical_terms.json".to_string()
}

fn default_keep_backup() -> bool {
    true
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_known_terms() -> Vec<String> {
    strings(&[
        "hypertension", "diabetes", "infarction", "bronchitis", "indigestion",
        "cough", "fever", "fatigue", "shortness of breath", "chest pain",
        "auscultation", "wheezing", "crackles", "murmur", "erythema",
        "antibiotics", "OTC", "cough suppressant", "fluid intake", "rest",
        "vital signs", "BP", "HR", "Temp", "S1", "S2", "ENT", "diagnosis", "plan",
        "prescription", "symptom", "treatment", "procedure", "surgery", "injection",
        "tablet", "capsule", "ml", "mg", "daily", "twice", "three times", "morning", "night",
        "with food", "empty stomach", "as needed", "follow-up",
    ])
}

fn default_phrase_patterns() -> Vec<String> {
    strings(&[
        r"myocardial infarction",
        r"congestive heart failure",
        r"chronic obstructive pulmonary",
        r"deep vein thrombosis",
        r"pulmonary embolism",
        r"atrial fibrillation",
        r"coronary artery disease",
        r"type [12] diabetes",
        r"post[- ]?traumatic stress",
        r"blood pressure",
        r"heart rate",
        r"acute bronchitis",
        r"viral",
        r"OTC cough suppressant",
        r"follow-up",
        r"as needed",
    ])
}

fn default_dosage_pattern() -> String {
    r"\b[A-Z][a-z]+ \d+[mg]*\b".to_string()
}

fn default_long_word_min_len() -> usize {
    10
}

fn default_capitalized_pattern() -> String {
    r"\b[A-Z][a-zA-Z-]{3,}\b".to_string()
}

fn default_misunderstood_letters() -> usize {
    10
}

fn default_explained_misunderstood_chars() -> usize {
    8
}

fn default_term_usage_pattern() -> String {
    r"(?i)take|dose|daily|twice|mg|tablet|capsule|ml|injection|as needed".to_string()
}

fn default_text_usage_pattern() -> String {
    r"(?i)take|dosage|daily|per day".to_string()
}

fn default_friendly_terms() -> Vec<String> {
    strings(&[
        "you", "please", "easy", "simple", "just", "let", "we", "us", "friend", "take",
        "with food", "at bedtime",
    ])
}

fn default_sentence_coefficient() -> f64 {
    0.39
}

fn default_syllable_coefficient() -> f64 {
    11.8
}

fn default_grade_offset() -> f64 {
    15.59
}

fn default_grade_weight() -> f64 {
    0.8
}

fn default_bracket_weight() -> f64 {
    0.5
}

fn default_bracket_cap() -> f64 {
    3.0
}

fn default_friendly_weight() -> f64 {
    0.4
}

fn default_friendly_cap() -> f64 {
    3.0
}

fn default_guard_off_topic() -> bool {
    true
}

fn default_medical_keywords() -> Vec<String> {
    strings(&[
        "disease", "syndrome", "disorder", "heart", "infection", "treatment", "pain",
        "therapy", "blood", "diagnosed", "symptom", "virus", "bacteria", "injury", "doctor",
        "hospital", "nurse", "medicine", "surgery", "fever", "cough", "allergy", "pill",
        "tablet", "dose", "cyst", "lump", "bump",
    ])
}

fn default_off_topic_message() -> String {
    DEFAULT_OFF_TOPIC_MESSAGE.to_string()
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - MEDEXPLAIN_DATA_DIR: term table directory (default: ./dataanalytics)
    /// - MEDEXPLAIN_MODEL: generation model name
    /// - OLLAMA_BASE_URL: generation service base URL (default: http://localhost:11434)
    /// - MEDEXPLAIN_TIMEOUT_SECS: generation request timeout (default: 120)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(data_dir) = std::env::var("MEDEXPLAIN_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(model) = std::env::var("MEDEXPLAIN_MODEL") {
            config.generation.model = model;
        }

        if let Ok(base_url) = std::env::var("OLLAMA_BASE_URL") {
            config.generation.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("MEDEXPLAIN_TIMEOUT_SECS") {
            if let Ok(val) = timeout.parse() {
                config.generation.timeout_secs = val;
            }
        }

        config
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::merge_with_env(Self::default())
            }
            None => Self::merge_with_env(Self::default()),
        };

        Ok(config)
    }

    /// Apply environment overrides on top of defaults (only variables that are set)
    fn merge_with_env(mut config: Self) -> Self {
        let env_config = Self::from_env();

        if std::env::var("MEDEXPLAIN_DATA_DIR").is_ok() {
            config.storage.data_dir = env_config.storage.data_dir;
        }
        if std::env::var("MEDEXPLAIN_MODEL").is_ok() {
            config.generation.model = env_config.generation.model;
        }
        if std::env::var("OLLAMA_BASE_URL").is_ok() {
            config.generation.base_url = env_config.generation.base_url;
        }
        if std::env::var("MEDEXPLAIN_TIMEOUT_SECS").is_ok() {
            config.generation.timeout_secs = env_config.generation.timeout_secs;
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.generation.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "generation.base_url must be an http(s) URL, got '{}'",
                url
            )));
        }
        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::Invalid("generation.model is empty".to_string()));
        }
        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "generation.timeout_secs must be positive".to_string(),
            ));
        }
        if self.storage.table_file.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.table_file is empty".to_string()));
        }

        let s = &self.scoring;
        let coefficients = [
            s.sentence_coefficient,
            s.syllable_coefficient,
            s.grade_offset,
            s.grade_weight,
            s.bracket_weight,
            s.bracket_cap,
            s.friendly_weight,
            s.friendly_cap,
        ];
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid(
                "scoring coefficients must be finite".to_string(),
            ));
        }

        if !self.storage.data_dir.exists() {
            std::fs::create_dir_all(&self.storage.data_dir)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.generation.base_url, "http://localhost:11434");
        assert_eq!(config.generation.assembly, AssemblyMode::Concatenate);
        assert_eq!(config.extraction.phrase_patterns.len(), 16);
        assert!(config.extraction.known_terms.iter().any(|t| t == "daily"));
        assert_eq!(config.scoring.friendly_terms.len(), 12);
        assert!(config.orchestrator.guard_off_topic);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [generation]
            model = "llama3"
            assembly = "spaced"

            [scoring]
            friendly_terms = ["you"]
            "#,
        )
        .unwrap();

        assert_eq!(config.generation.model, "llama3");
        assert_eq!(config.generation.assembly, AssemblyMode::Spaced);
        assert_eq!(config.generation.timeout_secs, 120);
        assert_eq!(config.scoring.friendly_terms, vec!["you".to_string()]);
        assert_eq!(config.scoring.grade_weight, 0.8);
        assert_eq!(config.storage.table_file, "medical_terms.json");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medexplain.toml");
        std::fs::write(&path, "[storage]\ntable_file = \"terms.json\"\n").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.table_file, "terms.json");
        assert_eq!(
            config.storage.table_path(),
            PathBuf::from("./dataanalytics").join("terms.json")
        );
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("MEDEXPLAIN_MODEL", "mistral");
        std::env::set_var("MEDEXPLAIN_TIMEOUT_SECS", "15");

        let config = EngineConfig::from_env();
        assert_eq!(config.generation.model, "mistral");
        assert_eq!(config.generation.timeout_secs, 15);

        std::env::remove_var("MEDEXPLAIN_MODEL");
        std::env::remove_var("MEDEXPLAIN_TIMEOUT_SECS");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        assert!(config.validate().is_ok());

        config.generation.base_url = "localhost:11434".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
