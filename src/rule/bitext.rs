//! Rules checking a sentence together with its translation.

use serde::{Deserialize, Serialize};

use super::{id::RuleId, Rule};
use crate::{tokenizer::Inflect, types::*, utils, Error};

/// Decides when a bitext rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitextPolicy {
    /// The source rule matches the source and the target rule matches the target.
    BothMatch,
    /// The source rule matches the source but the target rule does not match the target.
    SourceOnly,
}

impl Default for BitextPolicy {
    fn default() -> Self {
        BitextPolicy::BothMatch
    }
}

/// Character span of the tokens of a sentence, excluding whitespace and the sentence start token.
fn content_span(sentence: &AnalyzedSentence) -> Option<(usize, usize)> {
    let mut content = sentence
        .tokens()
        .iter()
        .filter(|x| !x.is_whitespace() && !x.is_sentence_start());

    let first = content.next()?;
    let last = content.last().unwrap_or(first);

    Some((first.char_span().0, last.char_span().1))
}

/// Two independent rules, one for the source sentence and one for its translation.
/// Suggestions are reported in the coordinates of the target sentence.
#[derive(Debug, Serialize, Deserialize)]
pub struct BitextRule {
    pub(crate) id: RuleId,
    pub(crate) source: Rule,
    pub(crate) target: Rule,
    pub(crate) policy: BitextPolicy,
}

impl BitextRule {
    pub fn new(id: RuleId, source: Rule, target: Rule, policy: BitextPolicy) -> Self {
        BitextRule {
            id,
            source,
            target,
            policy,
        }
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn policy(&self) -> BitextPolicy {
        self.policy
    }

    pub fn source(&self) -> &Rule {
        &self.source
    }

    pub fn target(&self) -> &Rule {
        &self.target
    }

    pub(crate) fn set_step_budget(&mut self, step_budget: usize) {
        self.source.set_step_budget(step_budget);
        self.target.set_step_budget(step_budget);
    }

    /// Checks a source sentence and its translation.
    ///
    /// With [BitextPolicy::BothMatch] there is one suggestion per match of the target rule.
    /// With [BitextPolicy::SourceOnly] there is at most one suggestion, spanning the whole target sentence.
    /// The span of the first source match is attached as `source_context`.
    pub fn apply(
        &self,
        source: &AnalyzedSentence,
        target: &AnalyzedSentence,
        inflector: &dyn Inflect,
    ) -> Result<Vec<Suggestion>, Error> {
        let source_matches = self.source.apply(source, inflector)?;
        let first_source = match source_matches.first() {
            Some(x) => x,
            None => return Ok(Vec::new()),
        };
        let source_context = Some((first_source.start, first_source.end));

        let target_matches = self.target.apply(target, inflector)?;

        let suggestions = match self.policy {
            BitextPolicy::BothMatch => target_matches
                .into_iter()
                .map(|mut suggestion| {
                    suggestion.source = self.id.to_string();
                    suggestion.source_context = source_context;
                    suggestion
                })
                .collect(),
            BitextPolicy::SourceOnly => {
                if !target_matches.is_empty() {
                    return Ok(Vec::new());
                }

                content_span(target)
                    .map(|span| {
                        let mut suggestion = Suggestion::new(
                            self.id.to_string(),
                            first_source.message.clone(),
                            span,
                            Vec::new(),
                        );
                        suggestion.source_context = source_context;
                        suggestion
                    })
                    .into_iter()
                    .collect()
            }
        };

        Ok(suggestions)
    }
}

fn default_min_words() -> usize {
    3
}

/// Flags translations which are identical to their source.
/// Short sentences (e. g. proper names) are allowed to stay the same.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SameTranslationRule {
    pub(crate) id: RuleId,
    /// The source must have more words than this.
    #[serde(default = "default_min_words")]
    pub(crate) min_words: usize,
}

impl SameTranslationRule {
    pub fn new(id: RuleId) -> Self {
        SameTranslationRule {
            id,
            min_words: default_min_words(),
        }
    }

    pub fn with_min_words(mut self, min_words: usize) -> Self {
        self.min_words = min_words;
        self
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn apply(&self, source: &AnalyzedSentence, target: &AnalyzedSentence) -> Option<Suggestion> {
        let words = source.tokens().iter().filter(|x| x.is_word()).count();

        if words <= self.min_words
            || utils::loose_key(&source.text()) != utils::loose_key(&target.text())
        {
            return None;
        }

        let mut suggestion = Suggestion::new(
            self.id.to_string(),
            "Source and target translation are the same.",
            content_span(target)?,
            Vec::new(),
        );
        suggestion.source_context = content_span(source);
        Some(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{ManualTagger, Tokenizer};
    use std::convert::TryFrom;

    #[test]
    fn same_translation_ignores_short_sentences() {
        let tokenizer = Tokenizer::new(ManualTagger::default());
        let rule = SameTranslationRule::new(RuleId::try_from("BITEXT/SAME_TRANSLATION").unwrap());

        let check = |source: &str, target: &str| {
            rule.apply(
                &tokenizer.analyze_sentence(source, 0),
                &tokenizer.analyze_sentence(target, 0),
            )
        };

        assert!(check("This is a test sentence.", "C'est la vie !").is_none());
        assert!(check("Elvis Presley", "Elvis Presley").is_none());

        let suggestion = check(
            "This this is a test sentence.",
            "This  this is a test sentence.",
        )
        .unwrap();
        assert_eq!((suggestion.start, suggestion.end), (0, 30));
        assert_eq!(suggestion.source_context, Some((0, 29)));
    }
}
