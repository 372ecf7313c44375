//! Utterance classification
//!
//! Pure functions mapping a raw utterance (or an NLU entity) to a semantic
//! category and a normalized value. Nothing here touches session state.

use crate::config::Lexicon;
use crate::state_machine::event::NluResult;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Semantic category a turn expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    YesNo,
    Name,
    Date,
    Time,
    Color,
    Shape,
}

/// Outcome of classifying one utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub valid: bool,
    /// Normalized value, present only when `valid`
    pub value: Option<String>,
}

impl Classification {
    fn accept(category: Category, value: impl Into<String>) -> Self {
        Self {
            category,
            valid: true,
            value: Some(value.into()),
        }
    }

    fn reject(category: Category) -> Self {
        Self {
            category,
            valid: false,
            value: None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Classify `utterance` as `category`
///
/// `today` anchors dates spoken without a year.
pub fn classify(category: Category, utterance: &str, lexicon: &Lexicon, today: NaiveDate) -> Classification {
    match category {
        Category::YesNo => yes_no(utterance, lexicon),
        Category::Name => name(utterance, lexicon),
        Category::Date => date(utterance, lexicon, today),
        Category::Time => time(utterance),
        Category::Color => vocabulary(Category::Color, utterance, &lexicon.colors),
        Category::Shape => vocabulary(Category::Shape, utterance, &lexicon.shapes),
    }
}

/// Classify using an NLU entity of `entity_category` when one is present,
/// otherwise the raw utterance
pub fn classify_input(
    category: Category,
    entity_category: Option<&str>,
    utterance: &str,
    nlu: Option<&NluResult>,
    lexicon: &Lexicon,
    today: NaiveDate,
) -> Classification {
    let entity = entity_category.zip(nlu).and_then(|(cat, nlu)| nlu.entity(cat));
    match entity {
        Some(entity) => classify(category, &entity.text, lexicon, today),
        None => classify(category, utterance, lexicon, today),
    }
}

/// Lowercase, trim, drop trailing punctuation, collapse whitespace
pub fn normalize(utterance: &str) -> String {
    utterance
        .trim()
        .trim_end_matches(|c| matches!(c, '.' | ',' | '!' | '?'))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn capitalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Yes / No
// ============================================================================

pub fn yes_no(utterance: &str, lexicon: &Lexicon) -> Classification {
    let word = normalize(utterance);
    if lexicon.yes.iter().any(|w| *w == word) {
        Classification::accept(Category::YesNo, "yes")
    } else if lexicon.no.iter().any(|w| *w == word) {
        Classification::accept(Category::YesNo, "no")
    } else {
        Classification::reject(Category::YesNo)
    }
}

// ============================================================================
// Name
// ============================================================================

pub fn name(utterance: &str, lexicon: &Lexicon) -> Classification {
    let word = normalize(utterance);
    if lexicon.names.iter().any(|n| *n == word) {
        Classification::accept(Category::Name, capitalize(&word))
    } else {
        Classification::reject(Category::Name)
    }
}

// ============================================================================
// Date
// ============================================================================

static MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?$").expect("valid regex")
});

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:the\s+)?(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]+)\.?(?:,?\s+(\d{4}))?$")
        .expect("valid regex")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"));

fn month_number(word: &str) -> Option<u32> {
    let month = match word {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Accept whitelisted day words or a real calendar date
///
/// Calendar dates go through `NaiveDate::from_ymd_opt`, so an overflowing
/// day such as "March 32" is rejected rather than rolled into April.
pub fn date(utterance: &str, lexicon: &Lexicon, today: NaiveDate) -> Classification {
    let normalized = normalize(utterance);
    let text = normalized.strip_prefix("on ").unwrap_or(&normalized);

    if lexicon.days.iter().any(|d| d == text) {
        return Classification::accept(Category::Date, capitalize(text));
    }

    let parts: Option<(Option<i32>, u32, u32)> = if let Some(caps) = ISO_DATE.captures(text) {
        let year = caps[1].parse().ok();
        let month = caps[2].parse().ok();
        let day = caps[3].parse().ok();
        year.zip(month).zip(day).map(|((y, m), d)| (Some(y), m, d))
    } else if let Some(caps) = MONTH_FIRST.captures(text) {
        let month = month_number(&caps[1]);
        let day = caps[2].parse().ok();
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        month.zip(day).map(|(m, d)| (year, m, d))
    } else if let Some(caps) = DAY_FIRST.captures(text) {
        let day = caps[1].parse().ok();
        let month = month_number(&caps[2]);
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        month.zip(day).map(|(m, d)| (year, m, d))
    } else {
        None
    };

    let Some((year, month, day)) = parts else {
        return Classification::reject(Category::Date);
    };

    match NaiveDate::from_ymd_opt(year.unwrap_or_else(|| today.year()), month, day) {
        Some(d) if year.is_some() => {
            Classification::accept(Category::Date, d.format("%B %-d, %Y").to_string())
        }
        Some(d) => Classification::accept(Category::Date, d.format("%B %-d").to_string()),
        None => Classification::reject(Category::Date),
    }
}

// ============================================================================
// Time
// ============================================================================

static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid regex"));

static FOUR_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

static HOUR_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}$").expect("valid regex"));

static TWELVE_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s?m$").expect("valid regex")
});

fn clock(hour: u32, minute: u32) -> Classification {
    if hour < 24 && minute < 60 {
        Classification::accept(Category::Time, format!("{hour:02}:{minute:02}"))
    } else {
        Classification::reject(Category::Time)
    }
}

/// Accept "HH:MM", "HHMM", a bare 1-2 digit hour, or a 12-hour "2 pm"
///
/// Three-digit input ("130") is ambiguous between 1:30 and 13:0 and is
/// rejected.
pub fn time(utterance: &str) -> Classification {
    let text = normalize(utterance);

    if let Some(caps) = CLOCK.captures(&text) {
        return match (caps[1].parse(), caps[2].parse()) {
            (Ok(h), Ok(m)) => clock(h, m),
            _ => Classification::reject(Category::Time),
        };
    }

    if FOUR_DIGITS.is_match(&text) || HOUR_ONLY.is_match(&text) {
        let Ok(n) = text.parse::<u32>() else {
            return Classification::reject(Category::Time);
        };
        return if text.len() == 4 {
            clock(n / 100, n % 100)
        } else {
            clock(n, 0)
        };
    }

    if let Some(caps) = TWELVE_HOUR.captures(&text) {
        let hour: Option<u32> = caps[1].parse().ok();
        let minute: Option<u32> = match caps.get(2) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        };
        let pm = &caps[3] == "p";
        return match hour.zip(minute) {
            Some((h, m)) if (1..=12).contains(&h) => {
                let h24 = match (h, pm) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h, true) => h + 12,
                    (h, false) => h,
                };
                clock(h24, m)
            }
            _ => Classification::reject(Category::Time),
        };
    }

    Classification::reject(Category::Time)
}

// ============================================================================
// Fixed vocabularies
// ============================================================================

const NEGATIONS: [&str; 5] = ["not", "no", "never", "neither", "nor"];

fn negates(token: &str) -> bool {
    NEGATIONS.contains(&token) || token.ends_with("n't")
}

/// Exact match, or exactly one vocabulary word among the tokens
///
/// A negated answer ("it's not red") or one naming several words is
/// ambiguous and rejected.
pub fn vocabulary(category: Category, utterance: &str, words: &[String]) -> Classification {
    let text = normalize(utterance);
    if let Some(word) = words.iter().find(|w| **w == text) {
        return Classification::accept(category, word.clone());
    }

    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'')
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.iter().any(|t| negates(t)) {
        return Classification::reject(category);
    }

    let mut found = words.iter().filter(|w| tokens.contains(&w.as_str()));
    match (found.next(), found.next()) {
        (Some(word), None) => Classification::accept(category, word.clone()),
        _ => Classification::reject(category),
    }
}
