use regex::Regex;

use crate::process_manager::OutputStream;

use super::activity::ActivityMarker;

/// Maps an output chunk to the activity marker recorded for it.
pub trait OutputClassifier: Send + Sync {
    fn classify(&self, stream: OutputStream, chunk: &str) -> ActivityMarker;
}

/// Case-insensitive whole-word keyword matching on stdout; stderr is always an
/// error.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    error: Regex,
    warning: Regex,
}

impl KeywordClassifier {
    pub fn new(error_words: &[&str], warning_words: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            error: word_pattern(error_words)?,
            warning: word_pattern(warning_words)?,
        })
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            error: Regex::new(r"(?i)\b(?:err|error|fail|failure)\b")
                .expect("static error pattern"),
            warning: Regex::new(r"(?i)\b(?:warn|warning)\b").expect("static warning pattern"),
        }
    }
}

impl OutputClassifier for KeywordClassifier {
    fn classify(&self, stream: OutputStream, chunk: &str) -> ActivityMarker {
        if stream == OutputStream::Stderr {
            return ActivityMarker::Error;
        }
        if self.error.is_match(chunk) {
            ActivityMarker::Error
        } else if self.warning.is_match(chunk) {
            ActivityMarker::Warning
        } else {
            ActivityMarker::Success
        }
    }
}

fn word_pattern(words: &[&str]) -> Result<Regex, regex::Error> {
    let alternation = words
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<String>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
}
