//! Text heuristics shared by detection and resolution
//!
//! All matching is on lower-cased text. Keyword matching is whole-word so
//! that `set` does not fire on `unset` or `offset`.

use crate::config::RuleTables;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid number pattern"));

static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:-|–|\bto\b|\.\.)\s*(\d+(?:\.\d+)?)").expect("valid range pattern")
});

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9_]+").expect("valid word pattern"));

/// Numeric tokens of a text, in order
pub fn numbers(text: &str) -> Vec<&str> {
    NUMBER.find_iter(text).map(|m| m.as_str()).collect()
}

/// First numeric range (`a-b`, `a–b`, `a to b`, `a..b`) in a text
pub fn numeric_range(text: &str) -> Option<(f64, f64)> {
    let caps = RANGE.captures(text)?;
    let lo: f64 = caps.get(1)?.as_str().parse().ok()?;
    let hi: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some(if lo <= hi { (lo, hi) } else { (hi, lo) })
}

/// Lower-cased word tokens of a text
pub fn words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Distinct lower-cased word tokens of a text
pub fn word_set(text: &str) -> BTreeSet<String> {
    words(text).into_iter().collect()
}

const INFLECTIONS: [&str; 5] = ["s", "es", "d", "ed", "ing"];

fn word_matches(word: &str, term: &str) -> bool {
    match word.strip_prefix(term) {
        Some("") => true,
        Some(rest) => INFLECTIONS.contains(&rest),
        None => false,
    }
}

/// Whether `term` occurs in `text` as whole words
///
/// Simple inflections count (`increments` matches `increment`).
/// Multi-word terms (`turn on`) match their word sequence.
pub fn contains_term(text: &str, term: &str) -> bool {
    let haystack = words(text);
    let needle = words(term);
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| {
        window
            .iter()
            .zip(needle.iter())
            .all(|(word, term)| word_matches(word, term))
    })
}

fn any_term(text: &str, terms: &[String]) -> bool {
    terms.iter().any(|t| contains_term(text, t))
}

/// Boolean reading of a text: `Some(true)`, `Some(false)`, or unknown
///
/// Text matching both keyword tables is unknown.
pub fn boolean_reading(text: &str, rules: &RuleTables) -> Option<bool> {
    let t = any_term(text, &rules.true_keywords);
    let f = any_term(text, &rules.false_keywords);
    match (t, f) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// Whether the two texts take opposite poles of an antonym group
pub fn antonym_contradiction(a: &str, b: &str, rules: &RuleTables) -> bool {
    rules.antonym_groups.iter().any(|group| {
        let (pa, na) = (any_term(a, &group.positive), any_term(a, &group.negative));
        let (pb, nb) = (any_term(b, &group.positive), any_term(b, &group.negative));
        (pa && !na && nb && !pb) || (na && !pa && pb && !nb)
    })
}

/// Whether the two texts contradict by boolean reading or antonyms
pub fn contradicts(a: &str, b: &str, rules: &RuleTables) -> bool {
    match (boolean_reading(a, rules), boolean_reading(b, rules)) {
        (Some(x), Some(y)) if x != y => return true,
        _ => {}
    }
    antonym_contradiction(a, b, rules)
}

/// Share of `shorter`'s distinct words that also occur in `longer`
pub fn overlap_ratio(shorter: &str, longer: &str) -> f64 {
    let small = word_set(shorter);
    if small.is_empty() {
        return 0.0;
    }
    let large = word_set(longer);
    let shared = small.intersection(&large).count();
    shared as f64 / small.len() as f64
}

/// Precision score of a value
///
/// Length bonus (one point per ten characters), +10 for a numeric range,
/// +2 per technical term, +5 for parenthetical detail.
pub fn precision_score(text: &str, rules: &RuleTables) -> u32 {
    let mut score = (text.chars().count() / 10) as u32;
    if numeric_range(text).is_some() {
        score += 10;
    }
    let terms = rules
        .technical_terms
        .iter()
        .filter(|t| contains_term(text, t))
        .count() as u32;
    score += 2 * terms;
    if text.contains('(') && text.contains(')') {
        score += 5;
    }
    score
}

/// Share of `rejected`'s tokens that occur (as substrings) in `chosen`
///
/// An empty rejected value is fully covered.
pub fn coverage(rejected: &str, chosen: &str) -> f64 {
    let tokens = words(rejected);
    if tokens.is_empty() {
        return 1.0;
    }
    let chosen = chosen.to_lowercase();
    let found = tokens.iter().filter(|t| chosen.contains(t.as_str())).count();
    found as f64 / tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleTables {
        RuleTables::default()
    }

    #[test]
    fn test_numbers_and_ranges() {
        assert_eq!(numbers("2 cycles"), vec!["2"]);
        assert_eq!(numbers("13-20"), vec!["13", "20"]);
        assert_eq!(numeric_range("13-20 clocks"), Some((13.0, 20.0)));
        assert_eq!(numeric_range("2 to 9"), Some((2.0, 9.0)));
        assert_eq!(numeric_range("1.5..3"), Some((1.5, 3.0)));
        assert_eq!(numeric_range("9–2"), Some((2.0, 9.0)));
        assert_eq!(numeric_range("2 cycles"), None);
    }

    #[test]
    fn test_whole_word_terms() {
        assert!(contains_term("Flag is SET", "set"));
        assert!(!contains_term("unset", "set"));
        assert!(!contains_term("offset", "set"));
        assert!(contains_term("you must turn on the pin", "turn on"));
        assert!(!contains_term("turn", "turn on"));
    }

    #[test]
    fn test_boolean_reading() {
        let r = rules();
        assert_eq!(boolean_reading("true", &r), Some(true));
        assert_eq!(boolean_reading("Disabled", &r), Some(false));
        assert_eq!(boolean_reading("yes or no", &r), None);
        assert_eq!(boolean_reading("stops a cog", &r), None);
    }

    #[test]
    fn test_contradictions() {
        let r = rules();
        assert!(contradicts("false", "true", &r));
        assert!(contradicts("increments the counter", "decrements the counter", &r));
        assert!(!contradicts("Stops a cog.", "Stops a cog; it becomes available for reuse.", &r));
        assert!(!contradicts("fast path", "fast path or slow path", &r));
    }

    #[test]
    fn test_overlap_ratio() {
        assert_eq!(overlap_ratio("Stops a cog.", "Stops a cog; it becomes available"), 1.0);
        assert_eq!(overlap_ratio("", "anything"), 0.0);
        assert!(overlap_ratio("alpha beta", "beta gamma") < 0.7);
    }

    #[test]
    fn test_precision_score() {
        let r = rules();
        assert_eq!(precision_score("2", &r), 0);
        assert_eq!(precision_score("13-20", &r), 10);
        assert_eq!(precision_score("13-20 clocks (hub window)", &r), 2 + 10 + 4 + 5);
    }

    #[test]
    fn test_coverage() {
        assert_eq!(coverage("2", "13-20"), 1.0);
        assert_eq!(coverage("", "x"), 1.0);
        assert_eq!(coverage("alpha beta", "alpha"), 0.5);
    }
}
