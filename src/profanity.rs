//! Fixed set of words flagged as derogatory in SMS bodies

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::FeatureError;

/// Word list compiled into the crate, one word per line
const BUILTIN_BAD_WORDS: &str = include_str!("../resources/bad_words.txt");

/// Case-sensitive set of flagged words.
///
/// Matching is exact: a message word matches only if it appears verbatim in
/// the set, punctuation included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfanitySet {
    words: HashSet<String>,
}

impl Default for ProfanitySet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfanitySet {
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_BAD_WORDS)
    }

    /// Build a set from newline-separated text. Blank lines are ignored.
    pub fn parse(text: &str) -> Self {
        let words = text
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { words }
    }

    pub fn from_file(path: &Path) -> Result<Self, FeatureError> {
        let text = fs::read_to_string(path).map_err(|e| FeatureError::io(path, e))?;
        Ok(Self::parse(&text))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ProfanitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            words: iter.into_iter().map(Into::into).collect(),
        }
    }
}
