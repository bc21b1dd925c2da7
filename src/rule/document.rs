//! Rules which look at more than one sentence of a document.
//!
//! The rules themselves are immutable. Everything they remember about earlier sentences lives in a
//! [DocumentCheck], so independent checks never see each other's state.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use super::id::RuleId;
use crate::{types::*, utils};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentRule {
    /// Pairs of accepted spellings. Once one variant is used, the other one is flagged.
    WordCoherency {
        id: RuleId,
        pairs: Vec<(String, String)>,
    },
    /// Flags the third of three successive sentences beginning with the same word.
    /// Sentences beginning with one of `adverbs` are flagged on the second repetition already.
    RepeatedBeginning {
        id: RuleId,
        /// Words which may begin successive sentences.
        #[serde(default)]
        allowed: Vec<String>,
        #[serde(default)]
        adverbs: Vec<String>,
    },
}

#[derive(Debug, Clone)]
enum DocumentState {
    /// Lowercased spelling which must not appear anymore -> the spelling used first.
    Coherency(FnvHashMap<String, String>),
    /// Lowercased first word of the previous sentence and how many sentences in a row began with it.
    Beginning(Option<(String, usize)>),
}

/// State of one check over a document.
#[derive(Debug, Default, Clone)]
pub struct DocumentCheck {
    states: FnvHashMap<usize, DocumentState>,
}

impl DocumentCheck {
    pub fn new() -> Self {
        DocumentCheck::default()
    }

    /// Forgets everything seen so far.
    pub fn reset(&mut self) {
        self.states.clear();
    }

    /// Checks the next sentence of the document with all rules.
    pub fn check(&mut self, rules: &[DocumentRule], sentence: &AnalyzedSentence) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        for (i, rule) in rules.iter().enumerate() {
            suggestions.extend(rule.apply(sentence, &mut self.states, i));
        }

        suggestions
    }
}

fn matchable_tokens(sentence: &AnalyzedSentence) -> impl Iterator<Item = &Token> {
    sentence
        .tokens()
        .iter()
        .filter(|x| !x.is_whitespace() && !x.is_sentence_start())
}

/// Replaces `from` inside `surface` (ignoring case) by `to`, so inflected forms keep their ending.
/// Falls back to `to` if `surface` does not contain `from`.
fn respell(surface: &str, from: &str, to: &str) -> String {
    let lower = surface.to_lowercase();
    let from = from.to_lowercase();

    match lower.find(&from) {
        Some(start)
            if lower.len() == surface.len()
                && surface.is_char_boundary(start)
                && surface.is_char_boundary(start + from.len()) =>
        {
            format!(
                "{}{}{}",
                &surface[..start],
                to,
                &surface[start + from.len()..]
            )
        }
        _ => to.to_string(),
    }
}

impl DocumentRule {
    pub fn id(&self) -> &RuleId {
        match self {
            DocumentRule::WordCoherency { id, .. } => id,
            DocumentRule::RepeatedBeginning { id, .. } => id,
        }
    }

    fn apply(
        &self,
        sentence: &AnalyzedSentence,
        states: &mut FnvHashMap<usize, DocumentState>,
        index: usize,
    ) -> Vec<Suggestion> {
        match self {
            DocumentRule::WordCoherency { id, pairs } => {
                let state = match states
                    .entry(index)
                    .or_insert_with(|| DocumentState::Coherency(FnvHashMap::default()))
                {
                    DocumentState::Coherency(state) => state,
                    _ => return Vec::new(),
                };

                let mut suggestions = Vec::new();

                for token in matchable_tokens(sentence) {
                    let word = token
                        .readings()
                        .iter()
                        .find(|x| !x.is_sentinel())
                        .map_or(token.as_str(), Reading::lemma);
                    let key = word.to_lowercase();

                    if let Some(first_spelling) = state.get(&key) {
                        let respelled = respell(token.as_str(), word, first_spelling);
                        let replacement = if utils::starts_uppercase(token.as_str()) {
                            utils::apply_to_first(&respelled, |c| c.to_uppercase().collect())
                        } else {
                            respelled
                        };

                        suggestions.push(Suggestion::new(
                            id.to_string(),
                            format!(
                                "'{}' and '{}' should not be used together.",
                                word, first_spelling
                            ),
                            token.char_span(),
                            vec![replacement],
                        ));
                        continue;
                    }

                    let other = pairs.iter().find_map(|(a, b)| {
                        if a.to_lowercase() == key {
                            Some(b)
                        } else if b.to_lowercase() == key {
                            Some(a)
                        } else {
                            None
                        }
                    });

                    if let Some(other) = other {
                        state
                            .entry(other.to_lowercase())
                            .or_insert_with(|| word.to_string());
                    }
                }

                suggestions
            }
            DocumentRule::RepeatedBeginning {
                id,
                allowed,
                adverbs,
            } => {
                let previous = match states
                    .entry(index)
                    .or_insert(DocumentState::Beginning(None))
                {
                    DocumentState::Beginning(previous) => previous,
                    _ => return Vec::new(),
                };

                let first = match matchable_tokens(sentence).next() {
                    Some(token) if token.is_word() => token,
                    _ => {
                        *previous = None;
                        return Vec::new();
                    }
                };

                let key = first.as_str().to_lowercase();
                let count = match previous {
                    Some((word, count)) if *word == key => *count + 1,
                    _ => 1,
                };

                let is_adverb = adverbs.iter().any(|x| x.to_lowercase() == key);
                let repeated = (count >= 3 || (count >= 2 && is_adverb))
                    && !allowed.iter().any(|x| x.to_lowercase() == key);
                *previous = Some((key, count));

                if repeated {
                    vec![Suggestion::new(
                        id.to_string(),
                        format!(
                            "The previous sentences also begin with '{}'.",
                            first.as_str()
                        ),
                        first.char_span(),
                        Vec::new(),
                    )]
                } else {
                    Vec::new()
                }
            }
        }
    }
}
