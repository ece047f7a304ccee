//! Pattern tables for output classification.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Precise form: a limit notice followed by a reset-time phrase, which
/// gets captured for the verdict.
fn reset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:usage|rate)\s+limit\b[^\n]*?\b(?:resets?|try again|available(?: again)?)\b\s*(?:at|in|on)?\s*([^\n.]+)",
        )
        .expect("reset pattern compiles")
    })
}

/// Looser indicators: any match classifies as rate-limited without
/// reset-time detail.
fn indicator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)rate[\s-]limit|too many requests|\b429\b|quota exceeded|over capacity|overloaded|usage limit",
        )
        .expect("indicator pattern compiles")
    })
}

/// A reset phrase is weekly when it names a calendar date or the word
/// "week"; everything else is a session limit.
fn weekly_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\bweek\w*\b|\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2}\b|\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}\b",
        )
        .expect("weekly pattern compiles")
    })
}

pub fn reset_phrase(text: &str) -> Option<String> {
    let captures = reset_pattern().captures(text)?;
    let phrase = captures
        .get(1)?
        .as_str()
        .trim()
        .trim_end_matches([',', '!', ')'])
        .trim();
    if phrase.is_empty() {
        None
    } else {
        Some(phrase.to_string())
    }
}

pub fn has_rate_limit_indicator(text: &str) -> bool {
    indicator_pattern().is_match(text)
}

pub fn is_weekly_phrase(phrase: &str) -> bool {
    weekly_pattern().is_match(phrase)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailureType {
    Missing,
    Expired,
    Invalid,
    Unknown,
}

impl AuthFailureType {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Missing => "No credentials found for this profile. Log in or set an API token.",
            Self::Expired => "Credentials have expired. Re-authenticate to continue.",
            Self::Invalid => "Credentials were rejected. Check the API token for this profile.",
            Self::Unknown => {
                "Authentication failed for an unknown reason. Check the profile configuration."
            }
        }
    }
}

/// Ordered auth-failure table; the first matching pattern decides the
/// sub-type.
fn auth_patterns() -> &'static [(Regex, AuthFailureType)] {
    static PATTERNS: OnceLock<Vec<(Regex, AuthFailureType)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                r"(?i)(?:api key|credentials?|token)\s+(?:not\s+(?:found|set)|missing)|\bno\s+(?:api key|credentials)\b|not logged in",
                AuthFailureType::Missing,
            ),
            (
                r"(?i)(?:token|session|credentials?|key)[^\n]{0,40}?\bexpired\b|\bexpired\s+(?:token|session|credentials)",
                AuthFailureType::Expired,
            ),
            (
                r"(?i)invalid\s+(?:api key|x-api-key|token|credentials)|authentication[_\s]error|\b401\b|\bunauthorized\b",
                AuthFailureType::Invalid,
            ),
            (
                r"(?i)authentication\s+(?:failed|failure)|auth\s+(?:error|failure)|could not authenticate",
                AuthFailureType::Unknown,
            ),
        ]
        .into_iter()
        .map(|(pattern, failure_type)| {
            (
                Regex::new(pattern).expect("auth pattern compiles"),
                failure_type,
            )
        })
        .collect()
    })
}

pub fn auth_failure_type(text: &str) -> Option<AuthFailureType> {
    auth_patterns()
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, failure_type)| *failure_type)
}
