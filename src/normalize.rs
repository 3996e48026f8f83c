use ahash::AHasher;
use regex::Regex;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid punctuation regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Canonical comparison form of a question text.
///
/// Lowercases, drops everything that is not a letter, digit or whitespace,
/// then collapses whitespace runs to a single space and trims. Punctuation
/// goes first so that `"a - b"` ends up as `"a b"` in a single pass, which
/// keeps the function idempotent.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = punctuation_re().replace_all(&lower, "");
    whitespace_re().replace_all(&stripped, " ").trim().to_string()
}

/// Short stable fingerprint of a question and its answer.
///
/// Two records share a fingerprint only when their normalized text and
/// normalized answer are identical.
pub fn fingerprint(text: &str, answer: &str) -> String {
    let mut hasher = AHasher::default();
    normalize(text).hash(&mut hasher);
    normalize(answer).hash(&mut hasher);
    let hex = format!("{:016x}", hasher.finish());
    hex[..12].to_string()
}
