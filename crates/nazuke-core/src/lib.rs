pub mod chart;
pub mod history;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

// --- Errors ---

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("a wish is required to propose names")]
    MissingWish,
    #[error("candidate count must be between 1 and {max}, got {got}")]
    InvalidCount { got: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct FormatParseError {
    pub kind: &'static str,
    pub value: String,
}

impl FormatParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// --- Scores ---

/// Value used for any category the model did not score.
pub const DEFAULT_SCORE: u8 = 50;

pub const MIN_SCORE: u8 = 0;
pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ScoreCategory {
    Sound,
    Form,
    Originality,
    Readability,
    Intent,
}

impl ScoreCategory {
    /// Fixed display and chart order.
    pub const ALL: [ScoreCategory; 5] = [
        ScoreCategory::Sound,
        ScoreCategory::Form,
        ScoreCategory::Originality,
        ScoreCategory::Readability,
        ScoreCategory::Intent,
    ];

    /// Canonical short key, as used in serialized output.
    pub fn key(self) -> &'static str {
        match self {
            ScoreCategory::Sound => "sound",
            ScoreCategory::Form => "form",
            ScoreCategory::Originality => "originality",
            ScoreCategory::Readability => "readability",
            ScoreCategory::Intent => "intent",
        }
    }

    /// Native label shown to users and used in the delimited reply template.
    pub fn label(self) -> &'static str {
        match self {
            ScoreCategory::Sound => "響き",
            ScoreCategory::Form => "字形",
            ScoreCategory::Originality => "独創",
            ScoreCategory::Readability => "可読",
            ScoreCategory::Intent => "願い",
        }
    }

    /// Romanized key used by the JSON reply template.
    pub fn romaji(self) -> &'static str {
        match self {
            ScoreCategory::Sound => "hibiki",
            ScoreCategory::Form => "jikei",
            ScoreCategory::Originality => "doku",
            ScoreCategory::Readability => "kadoku",
            ScoreCategory::Intent => "negai",
        }
    }

    /// Every spelling accepted for this category, canonical key first.
    ///
    /// Replies drifted between English short codes, romanized keys and native
    /// labels; all of them normalize to the same category.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            ScoreCategory::Sound => &["sound", "hibiki", "響き"],
            ScoreCategory::Form => &["form", "jikei", "字形"],
            ScoreCategory::Originality => &["originality", "doku", "dokusou", "独創", "独創性"],
            ScoreCategory::Readability => &["readability", "kadoku", "可読", "可読性"],
            ScoreCategory::Intent => &["intent", "negai", "願い"],
        }
    }

    /// Resolve any accepted spelling (ASCII case-insensitive) to a category.
    pub fn from_key(key: &str) -> Option<ScoreCategory> {
        let key = key.trim();
        ScoreCategory::ALL.into_iter().find(|cat| {
            cat.aliases()
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(key))
        })
    }
}

/// Saturate a raw numeric score into `[0, 100]`, rounding to the nearest integer.
/// NaN falls back to [`DEFAULT_SCORE`].
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return DEFAULT_SCORE;
    }
    raw.round().clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
}

/// Clamp an overall score into `[0, 100]` and round it to one decimal place.
pub fn clamp_overall(raw: f64) -> Option<f64> {
    if raw.is_nan() {
        return None;
    }
    let clamped = raw.clamp(MIN_SCORE as f64, MAX_SCORE as f64);
    Some(round_tenth(clamped))
}

fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// The five category scores of one candidate. Every category is always present.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scores {
    pub sound: u8,
    pub form: u8,
    pub originality: u8,
    pub readability: u8,
    pub intent: u8,
}

impl Default for Scores {
    fn default() -> Self {
        Self {
            sound: DEFAULT_SCORE,
            form: DEFAULT_SCORE,
            originality: DEFAULT_SCORE,
            readability: DEFAULT_SCORE,
            intent: DEFAULT_SCORE,
        }
    }
}

impl Scores {
    pub fn get(&self, category: ScoreCategory) -> u8 {
        match category {
            ScoreCategory::Sound => self.sound,
            ScoreCategory::Form => self.form,
            ScoreCategory::Originality => self.originality,
            ScoreCategory::Readability => self.readability,
            ScoreCategory::Intent => self.intent,
        }
    }

    /// Store a raw value for `category`, clamped into range.
    pub fn set(&mut self, category: ScoreCategory, raw: f64) {
        let value = clamp_score(raw);
        match category {
            ScoreCategory::Sound => self.sound = value,
            ScoreCategory::Form => self.form = value,
            ScoreCategory::Originality => self.originality = value,
            ScoreCategory::Readability => self.readability = value,
            ScoreCategory::Intent => self.intent = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScoreCategory, u8)> + '_ {
        ScoreCategory::ALL.into_iter().map(move |cat| (cat, self.get(cat)))
    }

    /// Arithmetic mean of the five categories, rounded to one decimal place.
    pub fn mean(&self) -> f64 {
        let sum: u32 = self.iter().map(|(_, v)| v as u32).sum();
        round_tenth(sum as f64 / ScoreCategory::ALL.len() as f64)
    }
}

// --- Candidates ---

/// One proposed name, validated and ready for display and logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NameCandidate {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
    pub scores: Scores,
    /// Supplied by the reply when present, otherwise the mean of `scores`.
    pub overall: f64,
    #[serde(default)]
    pub rationale: String,
    /// The unparsed fragment this candidate came from.
    pub source_fragment: String,
}

/// Shape the model was asked to reply in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ResponseFormat {
    /// `---`-separated blocks with labeled lines (`名前：`, `響き：80点`, ...).
    #[default]
    DelimitedText,
    /// A JSON document holding a `names` array of objects.
    StructuredJson,
}

impl FromStr for ResponseFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "delimited" | "delimitedtext" => Ok(ResponseFormat::DelimitedText),
            "json" | "structured" | "structuredjson" => Ok(ResponseFormat::StructuredJson),
            _ => Err(FormatParseError::new("response format", s)),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResponseFormat::DelimitedText => "text",
            ResponseFormat::StructuredJson => "json",
        })
    }
}

// --- Naming requests ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TargetType {
    #[default]
    Human,
    Pet,
    Character,
}

impl TargetType {
    pub fn label(self) -> &'static str {
        match self {
            TargetType::Human => "人間",
            TargetType::Pet => "ペット",
            TargetType::Character => "キャラクター",
        }
    }
}

impl FromStr for TargetType {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "人間" => Ok(TargetType::Human),
            "pet" | "ペット" => Ok(TargetType::Pet),
            "character" | "キャラクター" => Ok(TargetType::Character),
            _ => Err(FormatParseError::new("target type", s)),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Gender {
    #[default]
    Unspecified,
    Male,
    Female,
}

impl Gender {
    pub fn label(self) -> &'static str {
        match self {
            Gender::Unspecified => "指定なし",
            Gender::Male => "男",
            Gender::Female => "女",
        }
    }
}

impl FromStr for Gender {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unspecified" | "any" | "指定なし" => Ok(Gender::Unspecified),
            "male" | "男" => Ok(Gender::Male),
            "female" | "女" => Ok(Gender::Female),
            _ => Err(FormatParseError::new("gender", s)),
        }
    }
}

pub const DEFAULT_CANDIDATE_COUNT: usize = 3;
pub const MAX_CANDIDATE_COUNT: usize = 10;

/// The user's naming conditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NamingRequest {
    #[serde(default)]
    pub target: TargetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub use_kanji: String,
    #[serde(default)]
    pub avoid_kanji: String,
    pub wish: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    DEFAULT_CANDIDATE_COUNT
}

impl NamingRequest {
    pub fn new(wish: impl Into<String>) -> Self {
        Self {
            target: TargetType::default(),
            surname: None,
            gender: Gender::default(),
            use_kanji: String::new(),
            avoid_kanji: String::new(),
            wish: wish.into(),
            count: DEFAULT_CANDIDATE_COUNT,
        }
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.wish.trim().is_empty() {
            return Err(RequestError::MissingWish);
        }
        if self.count == 0 || self.count > MAX_CANDIDATE_COUNT {
            return Err(RequestError::InvalidCount {
                got: self.count,
                max: MAX_CANDIDATE_COUNT,
            });
        }
        Ok(())
    }

    /// Surname with surrounding whitespace removed, `None` when blank.
    pub fn surname(&self) -> Option<&str> {
        self.surname
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// --- Storage ---

/// Resolve the data directory (~/.nazuke/).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".nazuke")
}

/// Default location of the persistent CSV history.
pub fn history_path() -> PathBuf {
    data_dir().join("naming_log.csv")
}

// --- AI Settings ---

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub format: ResponseFormat,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            format: ResponseFormat::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

pub fn read_settings() -> AiSettings {
    read_settings_from(&settings_path())
}

/// Read settings from `path`, falling back to defaults when missing or unreadable.
pub fn read_settings_from(path: &std::path::Path) -> AiSettings {
    if !path.exists() {
        return AiSettings::default();
    }
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_settings(settings: &AiSettings) -> Result<(), StoreError> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &std::path::Path, settings: &AiSettings) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_saturates_both_bounds() {
        assert_eq!(clamp_score(150.0), 100);
        assert_eq!(clamp_score(-5.0), 0);
        assert_eq!(clamp_score(79.6), 80);
        assert_eq!(clamp_score(f64::NAN), DEFAULT_SCORE);
        assert_eq!(clamp_score(f64::INFINITY), 100);
    }

    #[test]
    fn overall_is_clamped_and_rounded() {
        assert_eq!(clamp_overall(123.0), Some(100.0));
        assert_eq!(clamp_overall(-1.0), Some(0.0));
        assert_eq!(clamp_overall(76.04), Some(76.0));
        assert_eq!(clamp_overall(f64::NAN), None);
    }

    #[test]
    fn default_scores_are_midpoint() {
        let scores = Scores::default();
        assert!(scores.iter().all(|(_, v)| v == DEFAULT_SCORE));
        assert_eq!(scores.mean(), 50.0);
    }

    #[test]
    fn mean_rounds_to_one_decimal() {
        let scores = Scores {
            sound: 70,
            form: 65,
            originality: 80,
            readability: 90,
            intent: 76,
        };
        assert_eq!(scores.mean(), 76.2);
    }

    #[test]
    fn aliases_resolve_to_one_category() {
        for cat in ScoreCategory::ALL {
            for alias in cat.aliases() {
                assert_eq!(ScoreCategory::from_key(alias), Some(cat));
            }
        }
        assert_eq!(ScoreCategory::from_key("HIBIKI"), Some(ScoreCategory::Sound));
        assert_eq!(ScoreCategory::from_key("color"), None);
    }

    #[test]
    fn request_requires_a_wish() {
        let req = NamingRequest::new("   ");
        assert_eq!(req.validate(), Err(RequestError::MissingWish));

        let mut req = NamingRequest::new("優しい子に");
        assert!(req.validate().is_ok());
        req.count = 0;
        assert!(matches!(req.validate(), Err(RequestError::InvalidCount { .. })));
    }

    #[test]
    fn blank_surname_is_none() {
        let mut req = NamingRequest::new("wish");
        req.surname = Some("  ".into());
        assert_eq!(req.surname(), None);
        req.surname = Some(" 佐藤 ".into());
        assert_eq!(req.surname(), Some("佐藤"));
    }

    #[test]
    fn format_parses_from_cli_words() {
        assert_eq!("json".parse::<ResponseFormat>(), Ok(ResponseFormat::StructuredJson));
        assert_eq!("Text".parse::<ResponseFormat>(), Ok(ResponseFormat::DelimitedText));
        assert!("yaml".parse::<ResponseFormat>().is_err());
        assert_eq!("ペット".parse::<TargetType>(), Ok(TargetType::Pet));
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        assert_eq!(read_settings_from(&path), AiSettings::default());

        let settings = AiSettings {
            provider: "anthropic".into(),
            api_key: "sk-test".into(),
            model: "claude".into(),
            format: ResponseFormat::StructuredJson,
            timeout_secs: 15,
        };
        write_settings_to(&path, &settings).unwrap();
        assert_eq!(read_settings_from(&path), settings);
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{\"provider\": \"openai\", ").unwrap();
        assert_eq!(read_settings_from(&path), AiSettings::default());
    }

    #[test]
    fn cli_words_are_case_insensitive() {
        assert_eq!("Human".parse::<TargetType>(), Ok(TargetType::Human));
        assert_eq!(" PET ".parse::<TargetType>(), Ok(TargetType::Pet));
        assert_eq!("Female".parse::<Gender>(), Ok(Gender::Female));
        assert!("robot".parse::<TargetType>().is_err());
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut settings = AiSettings::default();
        assert!(!ai_configured(&settings));
        settings.provider = "ollama".into();
        assert!(ai_configured(&settings));
    }
}
