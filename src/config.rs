//! Process settings and the static lexicon
//!
//! Settings come from the environment. The lexicon (yes/no words, names,
//! vocabularies, specialty questions, profiles) has built-in defaults and may
//! be overlaid by a TOML file; every table in the file is optional.

use crate::policy::TaskKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default "thinking time" before the guessing round starts
pub const DEFAULT_THINKING_TIME: Duration = Duration::from_secs(5);

/// Default silence timeout forwarded to the recognizer
pub const DEFAULT_NO_INPUT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid lexicon: {0}")]
    Invalid(String),
}

/// Process-level settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub task: TaskKind,
    pub port: u16,
    pub lexicon_path: Option<PathBuf>,
    pub thinking_time: Duration,
    /// `None` keeps re-prompting forever
    pub max_retries: Option<u32>,
    pub no_input_timeout: Duration,
    pub locale: String,
    pub voice: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            task: TaskKind::Appointment,
            port: 8000,
            lexicon_path: None,
            thinking_time: DEFAULT_THINKING_TIME,
            max_retries: None,
            no_input_timeout: DEFAULT_NO_INPUT_TIMEOUT,
            locale: "en-US".to_string(),
            voice: "en-US-DavisNeural".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let task = match std::env::var("DM_TASK") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Unknown DM_TASK, using default");
                defaults.task
            }),
            Err(_) => defaults.task,
        };

        Self {
            task,
            port: env_parse("DM_PORT").unwrap_or(defaults.port),
            lexicon_path: std::env::var("DM_CONFIG_PATH").ok().map(PathBuf::from),
            thinking_time: env_parse("DM_THINKING_TIME_MS")
                .map_or(defaults.thinking_time, Duration::from_millis),
            max_retries: env_parse("DM_MAX_RETRIES"),
            no_input_timeout: env_parse("DM_NO_INPUT_TIMEOUT_MS")
                .map_or(defaults.no_input_timeout, Duration::from_millis),
            locale: std::env::var("DM_LOCALE").unwrap_or(defaults.locale),
            voice: std::env::var("DM_VOICE").unwrap_or(defaults.voice),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

// ============================================================================
// Lexicon
// ============================================================================

/// Size class of a profile, answered through a yes/no "is it tall" question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Tall,
    Small,
}

/// A labeled reference profile for the guessing game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub color: Vec<String>,
    pub shape: Vec<String>,
    pub size: SizeClass,
    #[serde(default)]
    pub special: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// One of the randomly chosen yes/no questions and the trait it probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialtyQuestion {
    pub text: String,
    pub specialty: String,
}

/// Immutable grammar and reference data
#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    pub yes: Vec<String>,
    pub no: Vec<String>,
    pub names: Vec<String>,
    pub days: Vec<String>,
    pub colors: Vec<String>,
    pub shapes: Vec<String>,
    pub specialty_questions: Vec<SpecialtyQuestion>,
    pub profiles: Vec<Profile>,
}

/// On-disk overlay; absent tables keep the defaults
#[derive(Debug, Default, Deserialize)]
pub struct LexiconFile {
    #[serde(default)]
    pub yes: Option<Vec<String>>,
    #[serde(default)]
    pub no: Option<Vec<String>>,
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub days: Option<Vec<String>>,
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub shapes: Option<Vec<String>>,
    #[serde(default)]
    pub specialty_questions: Option<Vec<SpecialtyQuestion>>,
    #[serde(default)]
    pub profiles: Option<Vec<Profile>>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}

fn profile(name: &str, color: &[&str], shape: &[&str], size: SizeClass, special: &[&str], description: &str) -> Profile {
    Profile {
        name: name.to_string(),
        color: words(color),
        shape: words(shape),
        size,
        special: words(special),
        description: description.to_string(),
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            yes: words(&[
                "yes", "yeah", "yep", "yup", "sure", "of course", "definitely", "absolutely",
            ]),
            no: words(&["no", "nah", "nope", "no way", "not at all", "uh-uh"]),
            names: words(&[
                "john", "jane", "michael", "emily", "liam", "olivia", "noah", "emma", "james",
                "sophia", "william", "isabella", "benjamin", "mia", "lucas", "charlotte", "henry",
                "amelia", "alexander", "harper", "daniel", "evelyn", "matthew", "abigail",
                "joseph", "ella", "samuel", "avery", "david", "scarlett", "carter", "grace",
                "owen", "chloe", "wyatt", "victoria", "jack", "riley", "luke", "aria", "gabriel",
                "lily", "ethan", "hannah", "mason", "zoe", "logan", "nora", "elijah", "lillian",
                "jacob", "hazel", "aiden", "ellie", "sebastian", "lucy", "caleb", "madeline",
                "nathan", "aurora", "dylan", "savannah", "isaac", "penelope", "julian", "stella",
                "eli", "violet", "hunter", "bella", "anthony", "layla", "leo", "brooklyn",
                "thomas", "addison", "hudson", "natalie", "charles", "leah", "ezra", "skylar",
                "christopher", "autumn", "joshua", "paisley", "nicholas", "everly", "andrew",
                "maya", "ryan", "willow", "jaxon", "samantha", "aaron", "nova", "adam", "ariana",
                "alex", "vlad", "nayat", "staffan",
            ]),
            days: words(&[
                "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
                "today", "tomorrow",
            ]),
            colors: words(&["red", "black", "brown", "white", "yellow", "orange"]),
            shapes: words(&["bell", "umbrella", "funnel", "finger"]),
            specialty_questions: vec![
                SpecialtyQuestion {
                    text: "Do you think the fungus is edible?".to_string(),
                    specialty: "edible".to_string(),
                },
                SpecialtyQuestion {
                    text: "Do you think the fungus can glow in the dark?".to_string(),
                    specialty: "glow".to_string(),
                },
                SpecialtyQuestion {
                    text: "Do you think the fungus looks like dead man's fingers?".to_string(),
                    specialty: "fingers".to_string(),
                },
            ],
            profiles: vec![
                profile(
                    "fly agaric",
                    &["red"],
                    &["umbrella"],
                    SizeClass::Small,
                    &[],
                    "The red cap with white spots. Poisonous and hallucinogenic.",
                ),
                profile(
                    "chanterelle",
                    &["yellow", "orange"],
                    &["funnel"],
                    SizeClass::Small,
                    &["edible"],
                    "A golden funnel with a fruity smell, prized in cooking.",
                ),
                profile(
                    "parasol",
                    &["brown", "white"],
                    &["umbrella"],
                    SizeClass::Tall,
                    &["edible"],
                    "A tall scaly mushroom whose cap opens like a parasol.",
                ),
                profile(
                    "shaggy ink cap",
                    &["white", "black"],
                    &["bell"],
                    SizeClass::Tall,
                    &["edible", "self-digest"],
                    "A shaggy bell that digests itself into black ink.",
                ),
                profile(
                    "jack-o'-lantern",
                    &["orange"],
                    &["funnel", "umbrella"],
                    SizeClass::Small,
                    &["glow"],
                    "An orange cluster whose gills glow faintly in the dark.",
                ),
                profile(
                    "dead man's fingers",
                    &["black"],
                    &["finger"],
                    SizeClass::Small,
                    &["fingers"],
                    "Black club-shaped fingers poking out of rotting wood.",
                ),
            ],
        }
    }
}

impl Lexicon {
    /// Reference profile by name
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Built-in defaults overlaid with the file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: LexiconFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::default().overlay(file).validated()
    }

    /// Load from `settings`, falling back to defaults when no file is set
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        match &settings.lexicon_path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn overlay(mut self, file: LexiconFile) -> Self {
        fn lower(list: Vec<String>) -> Vec<String> {
            list.into_iter().map(|w| w.trim().to_lowercase()).collect()
        }

        if let Some(v) = file.yes {
            self.yes = lower(v);
        }
        if let Some(v) = file.no {
            self.no = lower(v);
        }
        if let Some(v) = file.names {
            self.names = lower(v);
        }
        if let Some(v) = file.days {
            self.days = lower(v);
        }
        if let Some(v) = file.colors {
            self.colors = lower(v);
        }
        if let Some(v) = file.shapes {
            self.shapes = lower(v);
        }
        if let Some(v) = file.specialty_questions {
            self.specialty_questions = v;
        }
        if let Some(v) = file.profiles {
            self.profiles = v;
        }
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.specialty_questions.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one specialty question is required".to_string(),
            ));
        }
        if let Some(word) = self.yes.iter().find(|w| self.no.contains(w)) {
            return Err(ConfigError::Invalid(format!(
                "\"{word}\" is listed as both yes and no"
            )));
        }
        Ok(self)
    }
}
