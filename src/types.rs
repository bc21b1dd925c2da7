//! Fundamental types used by this crate: readings, tokens, analyzed sentences and suggestions.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::{
    hash::{Hash, Hasher},
    ops::Range,
};

use crate::Error;

/// Tag of the reading carried by the synthetic zero-width token at the start of every sentence.
pub const SENT_START: &str = "SENT_START";
/// Tag appended to the readings of the last non-whitespace token of a sentence.
pub const SENT_END: &str = "SENT_END";
/// Tag appended to the readings of a newline which ends a paragraph.
pub const PARA_END: &str = "PARA_END";

/// Lemma and part-of-speech tag associated with a word.
/// The tag is absent for punctuation and whitespace pseudo-readings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reading {
    lemma: String,
    tag: Option<String>,
}

impl Reading {
    pub fn new<S1: Into<String>, S2: Into<String>>(lemma: S1, tag: S2) -> Self {
        Reading {
            lemma: lemma.into(),
            tag: Some(tag.into()),
        }
    }

    /// A reading without part-of-speech tag.
    pub fn untagged<S: Into<String>>(lemma: S) -> Self {
        Reading {
            lemma: lemma.into(),
            tag: None,
        }
    }

    pub fn lemma(&self) -> &str {
        &self.lemma
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Whether this reading carries one of the sentence / paragraph boundary tags.
    pub fn is_sentinel(&self) -> bool {
        matches!(self.tag(), Some(SENT_START) | Some(SENT_END) | Some(PARA_END))
    }
}

/// A single token: a word, punctuation or whitespace run together with its candidate readings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    text: String,
    char_span: (usize, usize),
    readings: Vec<Reading>,
    is_whitespace: bool,
    has_space_before: bool,
    is_sentence_start: bool,
    is_sentence_end: bool,
    is_paragraph_end: bool,
}

impl Token {
    /// Creates a token. `start` is the character offset of the token in the original text.
    pub fn new<S: Into<String>>(text: S, start: usize, readings: Vec<Reading>) -> Self {
        let text = text.into();
        let end = start + text.chars().count();
        let is_whitespace = !text.is_empty() && text.chars().all(crate::utils::is_space);

        Token {
            text,
            char_span: (start, end),
            readings,
            is_whitespace,
            has_space_before: false,
            is_sentence_start: false,
            is_sentence_end: false,
            is_paragraph_end: false,
        }
    }

    /// Get the special zero-width sentence start token.
    pub fn sent_start(offset: usize) -> Self {
        let mut token = Token::new("", offset, vec![Reading::new("", SENT_START)]);
        token.is_sentence_start = true;
        token
    }

    pub fn with_space_before(mut self, value: bool) -> Self {
        self.has_space_before = value;
        self
    }

    /// Marks this token as the end of the sentence and appends the `SENT_END` reading.
    pub fn with_sentence_end(mut self) -> Self {
        if !self.is_sentence_end {
            self.is_sentence_end = true;
            let lemma = self.text.clone();
            self.readings.push(Reading::new(lemma, SENT_END));
        }
        self
    }

    /// Marks this token as the end of a paragraph and appends the `PARA_END` reading.
    pub fn with_paragraph_end(mut self) -> Self {
        if !self.is_paragraph_end {
            self.is_paragraph_end = true;
            let lemma = self.text.clone();
            self.readings.push(Reading::new(lemma, PARA_END));
        }
        self
    }

    /// Returns a copy of this token with a different reading set.
    pub fn with_readings(&self, readings: Vec<Reading>) -> Self {
        Token {
            readings,
            ..self.clone()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The character span (start inclusive, end exclusive) in the original text.
    pub fn char_span(&self) -> (usize, usize) {
        self.char_span
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn lemmas(&self) -> impl Iterator<Item = &str> {
        self.readings.iter().map(Reading::lemma)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.readings.iter().filter_map(Reading::tag)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().any(|x| x == tag)
    }

    /// Whether no dictionary entry was found for this token.
    pub fn is_unknown(&self) -> bool {
        self.readings.iter().all(Reading::is_sentinel)
    }

    pub fn is_whitespace(&self) -> bool {
        self.is_whitespace
    }

    pub fn has_space_before(&self) -> bool {
        self.has_space_before
    }

    pub fn is_sentence_start(&self) -> bool {
        self.is_sentence_start
    }

    pub fn is_sentence_end(&self) -> bool {
        self.is_sentence_end
    }

    pub fn is_paragraph_end(&self) -> bool {
        self.is_paragraph_end
    }

    pub fn is_sentence_boundary(&self) -> bool {
        self.is_sentence_start || self.is_sentence_end || self.is_paragraph_end
    }

    /// Whether the token is a word, as opposed to whitespace, punctuation or a boundary pseudo-token.
    pub fn is_word(&self) -> bool {
        self.text.chars().any(char::is_alphanumeric)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// A sentence as an ordered sequence of tokens, whitespace included.
///
/// The mapping from whitespace-filtered to full indices is computed once on first access and
/// cached. The sentence is immutable, so the cache never goes stale. [AnalyzedSentence::filtered_view]
/// only collects token references along the cached mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedSentence {
    tokens: Vec<Token>,
    #[serde(skip)]
    mapping: OnceCell<Vec<usize>>,
}

impl PartialEq for AnalyzedSentence {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for AnalyzedSentence {}

impl Hash for AnalyzedSentence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tokens.hash(state);
    }
}

impl AnalyzedSentence {
    pub fn new(tokens: Vec<Token>) -> Self {
        AnalyzedSentence {
            tokens,
            mapping: OnceCell::new(),
        }
    }

    /// All tokens, whitespace included.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// The text this sentence was built from, reconstructed from the token surfaces.
    pub fn text(&self) -> String {
        self.tokens.iter().map(Token::as_str).collect()
    }

    /// The character span covered by this sentence.
    pub fn char_span(&self) -> (usize, usize) {
        let start = self.tokens.first().map_or(0, |x| x.char_span.0);
        let end = self.tokens.last().map_or(start, |x| x.char_span.1);
        (start, end)
    }

    fn mapping(&self) -> &[usize] {
        self.mapping.get_or_init(|| {
            self.tokens
                .iter()
                .enumerate()
                .filter(|(_, token)| !token.is_whitespace() || token.is_sentence_boundary())
                .map(|(i, _)| i)
                .collect()
        })
    }

    /// The tokens without whitespace (boundary tokens are kept) and their positions in the full sequence.
    /// Every view shares the cached mapping, the references to the tokens are gathered per call.
    pub fn filtered_view(&self) -> FilteredView<'_> {
        let mapping = self.mapping();

        FilteredView {
            tokens: mapping.iter().map(|i| &self.tokens[*i]).collect(),
            mapping,
            sentence: self,
        }
    }
}

/// Whitespace-filtered tokens of an [AnalyzedSentence], all matching happens in this coordinate system.
#[derive(Debug, Clone)]
pub struct FilteredView<'t> {
    tokens: Vec<&'t Token>,
    mapping: &'t [usize],
    sentence: &'t AnalyzedSentence,
}

impl<'t> FilteredView<'t> {
    pub fn tokens(&self) -> &[&'t Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn mapping(&self) -> &'t [usize] {
        self.mapping
    }

    pub fn sentence(&self) -> &'t AnalyzedSentence {
        self.sentence
    }

    /// Maps a filtered index to the index of the same token in the full token sequence.
    pub fn to_full_offset(&self, index: usize) -> Result<usize, Error> {
        self.mapping.get(index).copied().ok_or(Error::Index {
            index,
            len: self.mapping.len(),
        })
    }

    /// The character span of a non-empty range of filtered tokens.
    pub fn char_span(&self, range: Range<usize>) -> Result<(usize, usize), Error> {
        if range.start >= range.end {
            return Err(Error::Index {
                index: range.start,
                len: self.mapping.len(),
            });
        }

        let full = self.sentence.tokens();
        let start = full[self.to_full_offset(range.start)?].char_span.0;
        let end = full[self.to_full_offset(range.end - 1)?].char_span.1;

        Ok((start, end))
    }

    /// The original text covered by a range of filtered tokens, including inner whitespace.
    pub fn text(&self, range: Range<usize>) -> Result<String, Error> {
        if range.start >= range.end {
            return Ok(String::new());
        }

        let start = self.to_full_offset(range.start)?;
        let end = self.to_full_offset(range.end - 1)?;

        Ok(self.sentence.tokens()[start..=end]
            .iter()
            .map(Token::as_str)
            .collect())
    }
}

/// Suggestion for a change in a text, i. e. one rule match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Suggestion {
    /// The ID of the rule this suggestion is from.
    pub source: String,
    /// A human-readable message.
    pub message: String,
    /// The start character index (inclusive).
    pub start: usize,
    /// The end character index (exclusive).
    pub end: usize,
    /// The suggested replacement options for the text.
    pub replacements: Vec<String>,
    /// For bitext matches: the character span of the match in the source sentence.
    #[serde(default)]
    pub source_context: Option<(usize, usize)>,
}

impl Suggestion {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        source: S1,
        message: S2,
        (start, end): (usize, usize),
        replacements: Vec<String>,
    ) -> Self {
        Suggestion {
            source: source.into(),
            message: message.into(),
            start,
            end,
            replacements,
            source_context: None,
        }
    }

    pub fn overlaps(&self, other: &Suggestion) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Correct a text by applying suggestions to it.
/// In the case of multiple possible replacements, always chooses the first one.
/// Suggestions without replacements are skipped. `suggestions` must be sorted by start and not overlap.
pub fn apply_suggestions(text: &str, suggestions: &[Suggestion]) -> String {
    let mut offset: isize = 0;
    let mut chars: Vec<_> = text.chars().collect();

    for suggestion in suggestions {
        let replacement: Vec<_> = match suggestion.replacements.first() {
            Some(replacement) => replacement.chars().collect(),
            None => continue,
        };

        chars.splice(
            (suggestion.start as isize + offset) as usize
                ..(suggestion.end as isize + offset) as usize,
            replacement.iter().cloned(),
        );
        offset = offset + replacement.len() as isize - (suggestion.end - suggestion.start) as isize;
    }

    chars.into_iter().collect()
}
