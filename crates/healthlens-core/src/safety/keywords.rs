//! Crisis keyword matching.
//!
//! The built-in list covers eating disorders, self-harm, suicidal ideation
//! and medical emergencies in English and Spanish. It is a starting point
//! pending clinical review, not an authoritative screen.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

/// Built-in high-risk phrases.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    // Eating disorders
    "eating disorder",
    "anorexia",
    "anorexic",
    "bulimia",
    "bulimic",
    "binge eating",
    "binge and purge",
    "purging",
    "starve myself",
    "starving myself",
    // Self-harm and suicidal ideation
    "self-harm",
    "self harm",
    "hurt myself",
    "cutting myself",
    "suicide",
    "suicidal",
    "kill myself",
    "end my life",
    "want to die",
    "overdose",
    // Medical emergencies
    "chest pain",
    "can't breathe",
    "cannot breathe",
    "heart attack",
    "unconscious",
    "severe bleeding",
    // Spanish
    "trastorno alimenticio",
    "trastorno de la conducta alimentaria",
    "autolesión",
    "suicidio",
    "quitarme la vida",
    "matarme",
    "dolor en el pecho",
    "no puedo respirar",
];

lazy_static! {
    static ref DEFAULT_MATCHER: KeywordMatcher = KeywordMatcher::new(DEFAULT_KEYWORDS)
        .expect("built-in keyword list compiles");
}

/// Case-insensitive substring matcher over a fixed phrase list.
///
/// All phrases are compiled into one escaped alternation, so matching is a
/// single pass and no phrase is ever interpreted as a pattern.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    regex: Regex,
    keywords: Vec<String>,
}

impl KeywordMatcher {
    /// Compile a phrase list. Blank phrases are ignored.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        // Longest first so overlapping phrases report the most specific one.
        let mut ordered: Vec<&str> = keywords.iter().map(String::as_str).collect();
        ordered.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));

        let alternation = ordered
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        // An empty alternation would match everything.
        let source = if alternation.is_empty() {
            r"[^\s\S]".to_string()
        } else {
            format!("(?:{})", alternation)
        };

        let regex = RegexBuilder::new(&source).case_insensitive(true).build()?;
        Ok(Self { regex, keywords })
    }

    /// The shared matcher for the built-in list.
    pub fn builtin() -> &'static KeywordMatcher {
        &DEFAULT_MATCHER
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// First matching phrase, lowercased.
    pub fn find(&self, text: &str) -> Option<String> {
        self.regex.find(text).map(|m| m.as_str().to_lowercase())
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_matches_case_insensitively() {
        let matcher = KeywordMatcher::builtin();
        assert_eq!(
            matcher.find("I think I have an Eating Disorder"),
            Some("eating disorder".to_string())
        );
        assert_eq!(
            matcher.find("Tengo DOLOR EN EL PECHO"),
            Some("dolor en el pecho".to_string())
        );
        assert!(matcher.find("I want to eat more vegetables").is_none());
    }

    #[test]
    fn test_phrases_are_literal() {
        let matcher = KeywordMatcher::new(&["a.b", "(x)"]).unwrap();
        assert!(matcher.is_match("A.B"));
        assert!(!matcher.is_match("axb"));
        assert!(matcher.is_match("call (x) now"));
    }

    #[test]
    fn test_longest_phrase_reported() {
        let matcher = KeywordMatcher::new(&["binge", "binge eating"]).unwrap();
        assert_eq!(matcher.find("binge eating"), Some("binge eating".to_string()));
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let matcher = KeywordMatcher::new(&["", "  "]).unwrap();
        assert!(matcher.keywords().is_empty());
        assert!(!matcher.is_match("anything"));
        assert!(!matcher.is_match(""));
    }
}
