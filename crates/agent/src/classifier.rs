//! Question classifier: does a free-text reply expect an answer?
//!
//! Models often ask the user something in plain prose instead of calling
//! `ask_user`. The loop uses this heuristic to catch those replies so the
//! run suspends instead of silently stalling. False positives cost an
//! unnecessary pause; false negatives cost a stuck run. Both are tunable:
//! extra patterns can be added, and the agent accepts any
//! [`QuestionDetector`].

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Anything that can decide whether a reply is asking the user for input.
pub trait QuestionDetector: Send + Sync {
    fn is_question(&self, text: &str) -> bool;
}

#[derive(Debug, Clone)]
struct QuestionPattern {
    regex: Regex,
    /// Matches of this pattern are ignored when the text reads as a
    /// closing remark ("if you need anything else, please let me know").
    closing_remark_exempt: bool,
}

/// Phrases that request input, checked in order.
const BUILTIN_PATTERNS: &[&str] = &[
    "would you like",
    "do you want",
    "can you",
    "could you",
    "please provide",
    "please let me know",
    "please specify",
    "tell me",
    "what.*(?:would|should|can|could)",
    "how.*(?:would|should|can|could)",
    "which.*(?:option|choice)",
    "if you have",
    "if you would like",
];

const CLOSING_REMARK_PATTERN: &str = "please let me know";

static DEFAULT_PATTERNS: Lazy<Vec<QuestionPattern>> = Lazy::new(|| {
    BUILTIN_PATTERNS
        .iter()
        .map(|p| QuestionPattern {
            regex: case_insensitive(p).expect("invalid built-in question pattern"),
            closing_remark_exempt: *p == CLOSING_REMARK_PATTERN,
        })
        .collect()
});

static DEFAULT_CLASSIFIER: Lazy<QuestionClassifier> = Lazy::new(QuestionClassifier::default);

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// The default heuristic [`QuestionDetector`].
///
/// Rules, first match wins:
/// 1. status reports ("I successfully…", "…sum of…", "…sum is…") are never questions;
/// 2. a literal `?` is a question;
/// 3. any request phrase is a question, except "please let me know" inside
///    a closing remark ("if you need…", "…further assistance…");
/// 4. anything else is not.
#[derive(Debug, Clone)]
pub struct QuestionClassifier {
    patterns: Vec<QuestionPattern>,
}

impl QuestionClassifier {
    /// Append a case-insensitive pattern, checked after the built-in ones.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.patterns.push(QuestionPattern {
            regex: case_insensitive(pattern)?,
            closing_remark_exempt: false,
        });
        Ok(self)
    }

    /// Append several patterns at once.
    pub fn with_patterns<'a>(
        self,
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, regex::Error> {
        patterns.into_iter().try_fold(self, |c, p| c.with_pattern(p))
    }

    fn is_status_report(text: &str) -> bool {
        let lower = text.to_lowercase();
        text.starts_with("I successfully") || lower.contains("sum of") || lower.contains("sum is")
    }

    fn is_closing_remark(text: &str) -> bool {
        let lower = text.to_lowercase();
        lower.contains("if you need") || lower.contains("further assistance")
    }
}

impl Default for QuestionClassifier {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
        }
    }
}

impl QuestionDetector for QuestionClassifier {
    fn is_question(&self, text: &str) -> bool {
        if Self::is_status_report(text) {
            return false;
        }

        if text.contains('?') {
            return true;
        }

        match self.patterns.iter().find(|p| p.regex.is_match(text)) {
            Some(p) if p.closing_remark_exempt && Self::is_closing_remark(text) => false,
            Some(_) => true,
            None => false,
        }
    }
}

/// Classify `text` with the built-in rules.
pub fn is_asking_question(text: &str) -> bool {
    DEFAULT_CLASSIFIER.is_question(text)
}
