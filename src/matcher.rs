//! Best-match profile selection for the guessing game

use crate::config::{Profile, SizeClass};

/// Attributes collected during a guessing round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    pub color: Option<String>,
    pub shape: Option<String>,
    /// Answer to "is it tall"
    pub tall: Option<bool>,
    pub specialty: Option<SpecialtyAnswer>,
}

/// Answer to the randomly chosen specialty question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialtyAnswer {
    pub specialty: String,
    pub present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'a> {
    pub profile: &'a Profile,
    pub score: u32,
}

/// One point per matching attribute
pub fn score(attributes: &Attributes, profile: &Profile) -> u32 {
    let mut score = 0;

    if let Some(color) = &attributes.color {
        if profile.color.iter().any(|c| c.eq_ignore_ascii_case(color)) {
            score += 1;
        }
    }
    if let Some(shape) = &attributes.shape {
        if profile.shape.iter().any(|s| s.eq_ignore_ascii_case(shape)) {
            score += 1;
        }
    }
    if let Some(tall) = attributes.tall {
        let expected = if tall { SizeClass::Tall } else { SizeClass::Small };
        if profile.size == expected {
            score += 1;
        }
    }
    if let Some(answer) = &attributes.specialty {
        let has = profile
            .special
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&answer.specialty));
        if has == answer.present {
            score += 1;
        }
    }

    score
}

/// Highest-scoring profile; ties keep the earlier profile, zero scores never win
pub fn best_match<'a>(attributes: &Attributes, profiles: &'a [Profile]) -> Option<Match<'a>> {
    let mut best: Option<Match<'a>> = None;
    for profile in profiles {
        let score = score(attributes, profile);
        if score > best.map_or(0, |m| m.score) {
            best = Some(Match { profile, score });
        }
    }
    best
}
