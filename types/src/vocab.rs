//! Closed vocabularies and keyword inference.
//!
//! Abilities, pricing tiers, and tags are canonicalized against fixed
//! sets: unknown pricing collapses to `trial`, unknown abilities and tags
//! are dropped. Inference scans combined name/description/pricing text
//! with case-insensitive keyword automatons.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};

/// What a catalog tool can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Text,
    Image,
    Video,
    Audio,
    Code,
    Automation,
    Learning,
}

impl Ability {
    pub const ALL: [Self; 7] = [
        Self::Text,
        Self::Image,
        Self::Video,
        Self::Audio,
        Self::Code,
        Self::Automation,
        Self::Learning,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Code => "code",
            Self::Automation => "automation",
            Self::Learning => "learning",
        }
    }

    /// Parse a single ability label. Unknown labels are dropped by callers.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "code" => Some(Self::Code),
            "automation" => Some(Self::Automation),
            "learning" => Some(Self::Learning),
            _ => None,
        }
    }

    /// Canonicalize a loose list of labels: parse, drop unknowns, dedup.
    #[must_use]
    pub fn canonicalize_list<I, S>(values: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<Self> = values
            .into_iter()
            .filter_map(|v| Self::parse(v.as_ref()))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Pricing tier of a catalog tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingTier {
    Free,
    #[default]
    Trial,
    Paid,
}

impl PricingTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Trial => "trial",
            Self::Paid => "paid",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "trial" => Some(Self::Trial),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }

    /// Unknown tiers collapse to `trial`.
    #[must_use]
    pub fn canonicalize(value: &str) -> Self {
        Self::parse(value).unwrap_or(Self::Trial)
    }
}

/// Catalog entry tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Watermarked,
}

impl Tag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Watermarked => "watermarked",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "watermarked" => Some(Self::Watermarked),
            _ => None,
        }
    }

    /// Canonicalize a loose list of labels: parse, drop unknowns, dedup.
    #[must_use]
    pub fn canonicalize_list<I, S>(values: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<Self> = values
            .into_iter()
            .filter_map(|v| Self::parse(v.as_ref()))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Keyword table per ability. Substring matches, case-insensitive.
const ABILITY_KEYWORDS: &[(Ability, &[&str])] = &[
    (
        Ability::Text,
        &[
            "chat", "write", "writing", "copywrit", "summar", "translat", "article", "blog",
            "grammar", "paraphras",
        ],
    ),
    (
        Ability::Image,
        &[
            "image", "photo", "picture", "logo", "illustration", "avatar", "upscal", "wallpaper",
            "art generat",
        ],
    ),
    (
        Ability::Video,
        &["video", "animation", "clip", "film", "subtitle", "lip sync", "motion graphic"],
    ),
    (
        Ability::Audio,
        &[
            "audio", "voice", "music", "speech", "podcast", "text-to-speech", "transcrib",
            "sound effect",
        ],
    ),
    (
        Ability::Code,
        &["code", "coding", "program", "developer", "sql", "debug", "autocomplete", "api client"],
    ),
    (
        Ability::Automation,
        &["automation", "automate", "workflow", "agent", "bot", "scrape", "no-code", "integrat"],
    ),
    (
        Ability::Learning,
        &["learn", "course", "tutor", "study", "education", "quiz", "flashcard", "lesson"],
    ),
];

static ABILITY_SCANNER: LazyLock<(AhoCorasick, Vec<Ability>)> = LazyLock::new(|| {
    let mut patterns = Vec::new();
    let mut owners = Vec::new();
    for (ability, keywords) in ABILITY_KEYWORDS {
        for keyword in *keywords {
            patterns.push(*keyword);
            owners.push(*ability);
        }
    }
    let automaton = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&patterns)
        .expect("ability keyword automaton");
    (automaton, owners)
});

/// Infer abilities from free text by keyword match.
#[must_use]
pub fn infer_abilities(text: &str) -> Vec<Ability> {
    let (automaton, owners) = &*ABILITY_SCANNER;
    let mut found: Vec<Ability> = automaton
        .find_overlapping_iter(text)
        .map(|m| owners[m.pattern().as_usize()])
        .collect();
    found.sort_unstable();
    found.dedup();
    found
}

const FREE_KEYWORDS: &[&str] = &["free", "freemium", "no cost", "open source"];
const TRIAL_KEYWORDS: &[&str] = &["trial", "demo", "try it", "try for"];
const PAID_KEYWORDS: &[&str] = &[
    "paid",
    "premium",
    "subscription",
    "per month",
    "/mo",
    "per year",
    "one-time",
    "credits",
];

static PRICING_SCANNER: LazyLock<(AhoCorasick, Vec<u8>)> = LazyLock::new(|| {
    let mut patterns = Vec::new();
    let mut owners = Vec::new();
    for (bucket, keywords) in [(0u8, FREE_KEYWORDS), (1, TRIAL_KEYWORDS), (2, PAID_KEYWORDS)] {
        for keyword in keywords {
            patterns.push(*keyword);
            owners.push(bucket);
        }
    }
    let automaton = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&patterns)
        .expect("pricing keyword automaton");
    (automaton, owners)
});

/// Derive `(is_free, has_trial, is_paid)` from pricing text.
#[must_use]
pub fn pricing_flags_from_text(text: &str) -> (bool, bool, bool) {
    let (automaton, owners) = &*PRICING_SCANNER;
    let mut flags = (false, false, false);
    for m in automaton.find_overlapping_iter(text) {
        match owners[m.pattern().as_usize()] {
            0 => flags.0 = true,
            1 => flags.1 = true,
            _ => flags.2 = true,
        }
    }
    flags
}
