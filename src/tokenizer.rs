//! Turns text into [AnalyzedSentence]s: sentence splitting, word splitting, tagging and disambiguation.

use fnv::FnvHashMap;
use fs_err::File;
use lazy_static::lazy_static;
use log::warn;
use onig::Regex;
use serde::{Deserialize, Serialize};
use std::{
    io::{BufRead, BufReader},
    ops::Range,
    path::Path,
    sync::Arc,
};

use crate::{
    rule::disambiguation::Disambiguator,
    types::*,
    utils::is_space,
    Error,
};

/// Looks up the readings of a word.
pub trait Tag: Send + Sync {
    fn tag(&self, word: &str) -> Vec<Reading>;
}

/// Provides the surface forms of a lemma in a given tag.
pub trait Inflect: Send + Sync {
    /// All forms of `lemma` with the tag `tag`, in a stable order. May be empty.
    fn inflect(&self, lemma: &str, tag: &str) -> Vec<String>;
}

/// An inflector which never finds any form.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInflection;

impl Inflect for NoInflection {
    fn inflect(&self, _lemma: &str, _tag: &str) -> Vec<String> {
        Vec::new()
    }
}

/// A tagger backed by an in-memory word list.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ManualTagger {
    tags: FnvHashMap<String, Vec<Reading>>,
    // lemma -> (tag, word) in insertion order
    forms: FnvHashMap<String, Vec<(String, String)>>,
}

impl ManualTagger {
    pub fn add<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        &mut self,
        word: S1,
        lemma: S2,
        tag: S3,
    ) {
        let (word, lemma, tag) = (word.into(), lemma.into(), tag.into());

        let forms = self.forms.entry(lemma.clone()).or_insert_with(Vec::new);
        if !forms.iter().any(|(t, w)| *t == tag && *w == word) {
            forms.push((tag.clone(), word.clone()));
        }

        let reading = Reading::new(lemma, tag);
        let readings = self.tags.entry(word).or_insert_with(Vec::new);
        if !readings.contains(&reading) {
            readings.push(reading);
        }
    }

    /// Reads `word<TAB>lemma<TAB>tag` lines. Lines starting with `#` are comments.
    pub fn from_lines<'a, I: IntoIterator<Item = &'a str>>(lines: I) -> Self {
        let mut tagger = ManualTagger::default();

        for line in lines {
            let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<_> = line.split('\t').collect();
            if let [word, lemma, tag] = parts[..] {
                tagger.add(word, lemma, tag);
            } else {
                warn!("skipping malformed tagger line: {:?}", line);
            }
        }

        tagger
    }

    /// Reads a tagger from a file in the format of [from_lines][ManualTagger::from_lines].
    pub fn new<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(p.as_ref())?);
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;

        Ok(ManualTagger::from_lines(lines.iter().map(String::as_str)))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Tag for ManualTagger {
    fn tag(&self, word: &str) -> Vec<Reading> {
        self.tags.get(word).cloned().unwrap_or_default()
    }
}

impl Inflect for ManualTagger {
    fn inflect(&self, lemma: &str, tag: &str) -> Vec<String> {
        self.forms.get(lemma).map_or_else(Vec::new, |forms| {
            forms
                .iter()
                .filter(|(t, _)| t == tag)
                .map(|(_, word)| word.clone())
                .collect()
        })
    }
}

const DELIMITERS: &str = ",.;()[]{}<>!?:/|\\\"'«»„”“`´‘’‛′…¿¡";

fn is_delimiter(c: char) -> bool {
    is_space(c) || DELIMITERS.contains(c)
}

fn is_newline(c: char) -> bool {
    c == '\n' || c == '\u{2028}' || c == '\u{2029}'
}

/// Splits into byte ranges of words, single delimiters and runs of whitespace.
/// Newlines are never merged so paragraph ends stay visible.
fn split_words(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    // start of the current word or whitespace run, and whether it is whitespace
    let mut current: Option<(usize, bool)> = None;

    for (i, c) in text.char_indices() {
        if is_space(c) && !is_newline(c) {
            match current {
                Some((_, true)) => continue,
                Some((start, false)) => ranges.push(start..i),
                None => {}
            }
            current = Some((i, true));
        } else if is_delimiter(c) {
            if let Some((start, _)) = current.take() {
                ranges.push(start..i);
            }
            ranges.push(i..i + c.len_utf8());
        } else {
            match current {
                Some((_, false)) => continue,
                Some((start, true)) => ranges.push(start..i),
                None => {}
            }
            current = Some((i, false));
        }
    }

    if let Some((start, _)) = current {
        ranges.push(start..text.len());
    }

    ranges
}

fn is_space_str(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_space)
}

/// Merges the pieces of URLs back together.
/// A protocol followed by `:`, `/`, `/` starts a URL. It ends at whitespace, a closing parenthesis,
/// sentence punctuation followed by whitespace or a final piece with characters not allowed in URLs.
fn join_urls(text: &str, ranges: Vec<Range<usize>>, protocols: &[String]) -> Vec<Range<usize>> {
    lazy_static! {
        static ref URL_CHARS: Regex = Regex::new(r"^[a-zA-Z0-9/%$-_.+!*'(),\?]+$")
            .expect("url character regex is valid");
    }

    let piece = |i: usize| &text[ranges[i].clone()];

    let starts_at = |i: usize| {
        protocols.iter().any(|x| x.as_str() == piece(i))
            && ranges.len() > i + 3
            && piece(i + 1) == ":"
            && piece(i + 2) == "/"
            && piece(i + 3) == "/"
    };

    let ends_at = |i: usize| {
        let token = piece(i);
        if is_space_str(token) || token == ")" {
            true
        } else if ranges.len() > i + 1 {
            is_space_str(piece(i + 1)) && matches!(token, "." | "," | ";" | ":" | "!" | "?")
        } else {
            !URL_CHARS.is_match(token)
        }
    };

    let mut joined = Vec::with_capacity(ranges.len());
    let mut url: Option<Range<usize>> = None;

    for i in 0..ranges.len() {
        let range = ranges[i].clone();

        url = match url {
            None if starts_at(i) => Some(range),
            None => {
                joined.push(range);
                None
            }
            Some(current) if ends_at(i) => {
                joined.push(current);
                joined.push(range);
                None
            }
            Some(current) => Some(current.start..range.end),
        }
    }

    if let Some(current) = url {
        joined.push(current);
    }

    joined
}

/// Options for a tokenizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerOptions {
    /// Whether to look up the lowercased word if the word itself has no readings.
    pub lowercase_fallback: bool,
    /// Tokens which start a URL when followed by `://`.
    pub protocols: Vec<String>,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        TokenizerOptions {
            lowercase_fallback: true,
            protocols: vec!["http".into(), "https".into(), "ftp".into()],
        }
    }
}

/// Splits text into sentences and tokens and annotates the tokens with readings.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Tokenizer {
    tagger: Arc<ManualTagger>,
    disambiguator: Disambiguator,
    options: TokenizerOptions,
}

impl Tokenizer {
    pub fn new(tagger: ManualTagger) -> Self {
        Tokenizer {
            tagger: Arc::new(tagger),
            disambiguator: Disambiguator::default(),
            options: TokenizerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TokenizerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_disambiguator(mut self, disambiguator: Disambiguator) -> Self {
        self.disambiguator = disambiguator;
        self
    }

    pub fn tagger(&self) -> &Arc<ManualTagger> {
        &self.tagger
    }

    pub fn disambiguator(&self) -> &Disambiguator {
        &self.disambiguator
    }

    pub fn options(&self) -> &TokenizerOptions {
        &self.options
    }

    fn readings(&self, word: &str) -> Vec<Reading> {
        let readings = self.tagger.tag(word);

        if readings.is_empty() && self.options.lowercase_fallback {
            let lower = word.to_lowercase();
            if lower != word {
                return self.tagger.tag(&lower);
            }
        }

        readings
    }

    /// Splits a text into sentences. Returns the character offset of each sentence and its text.
    /// Whitespace following a sentence belongs to it, so the sentences concatenate to the text.
    pub fn sentences<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut char_start = 0;
        let mut char_pos = 0;

        let mut chars = text.char_indices().peekable();
        while let Some((_, c)) = chars.next() {
            char_pos += 1;

            let ends_sentence = matches!(c, '.' | '!' | '?')
                && chars.peek().map_or(false, |(_, next)| is_space(*next));
            let paragraph_break = is_newline(c)
                && chars.peek().map_or(false, |(_, next)| is_newline(*next));

            if !ends_sentence && !paragraph_break {
                continue;
            }

            let mut end = text.len();
            while let Some((i, next)) = chars.peek() {
                if !is_space(*next) {
                    end = *i;
                    break;
                }
                chars.next();
                char_pos += 1;
            }

            sentences.push((char_start, &text[start..end]));
            start = end;
            char_start = char_pos;
        }

        if start < text.len() {
            sentences.push((char_start, &text[start..]));
        }

        sentences
    }

    /// Tokenizes and tags a single sentence. `offset` is the character offset of the sentence in the text.
    pub fn analyze_sentence(&self, sentence: &str, offset: usize) -> AnalyzedSentence {
        let ranges = join_urls(sentence, split_words(sentence), &self.options.protocols);

        let mut tokens = vec![Token::sent_start(offset)];
        let mut char_pos = offset;
        let mut space_before = false;

        for range in ranges {
            let text = &sentence[range];
            let readings = if is_space_str(text) {
                Vec::new()
            } else {
                self.readings(text)
            };

            let token = Token::new(text, char_pos, readings).with_space_before(space_before);
            space_before = token.is_whitespace();
            char_pos += text.chars().count();
            tokens.push(token);
        }

        if let Some(i) = tokens
            .iter()
            .rposition(|x| !x.is_whitespace() && !x.is_sentence_start())
        {
            tokens[i] = tokens[i].clone().with_sentence_end();
        }

        // the last newline of a run of at least two ends a paragraph
        let mut newlines = Vec::new();
        for i in 0..tokens.len() {
            let token = &tokens[i];
            if token.as_str().chars().any(is_newline) {
                newlines.push(i);
            } else if token.is_whitespace() {
                continue;
            } else {
                newlines.clear();
            }

            let run_ends = tokens[i + 1..]
                .iter()
                .find(|x| !x.is_whitespace() || x.as_str().chars().any(is_newline))
                .map_or(true, |x| !x.as_str().chars().any(is_newline));

            if newlines.len() >= 2 && newlines.last() == Some(&i) && run_ends {
                tokens[i] = tokens[i].clone().with_paragraph_end();
                newlines.clear();
            }
        }

        let sentence = AnalyzedSentence::new(tokens);
        self.disambiguator.apply(sentence)
    }

    /// Splits a text into sentences and analyzes each of them.
    pub fn analyze(&self, text: &str) -> Vec<AnalyzedSentence> {
        self.sentences(text)
            .into_iter()
            .map(|(offset, sentence)| self.analyze_sentence(sentence, offset))
            .collect()
    }

    /// The surface strings of the tokens in a text, whitespace excluded.
    pub fn words(&self, text: &str) -> Vec<String> {
        join_urls(text, split_words(text), &self.options.protocols)
            .into_iter()
            .map(|x| &text[x])
            .filter(|x| !is_space_str(x))
            .map(str::to_string)
            .collect()
    }
}

impl Inflect for Tokenizer {
    fn inflect(&self, lemma: &str, tag: &str) -> Vec<String> {
        self.tagger.inflect(lemma, tag)
    }
}
