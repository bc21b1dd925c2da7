use fnv::FnvHashMap;
use log::warn;
use serde::{Deserialize, Serialize};

use super::{
    engine::{
        composition::{MatchGraph, PosMatcher, StepBudget},
        Engine,
    },
    id::RuleId,
    DEFAULT_STEP_BUDGET,
};
use crate::{compile::DisambiguationRuleSpec, types::*, Error};
use std::{convert::TryFrom, io::Read};

/// What to do with the readings of the marked tokens.
#[derive(Debug, Serialize, Deserialize)]
pub enum Disambiguation {
    /// Keep only the readings whose tag matches. If none matches, the readings are left as they are.
    Filter(PosMatcher),
    /// Remove the readings whose tag matches.
    Remove(PosMatcher),
    /// Replace all readings with one reading. An empty lemma is replaced by the token text.
    Replace(Reading),
    /// Add a reading. An empty lemma is replaced by the token text.
    Add(Reading),
}

impl Disambiguation {
    fn with_lemma(reading: &Reading, token: &Token) -> Reading {
        if reading.lemma().is_empty() {
            match reading.tag() {
                Some(tag) => Reading::new(token.as_str(), tag),
                None => Reading::untagged(token.as_str()),
            }
        } else {
            reading.clone()
        }
    }

    /// The new readings of a token. Sentence and paragraph boundary readings are always kept.
    fn apply(&self, token: &Token) -> Vec<Reading> {
        let (sentinels, readings): (Vec<&Reading>, Vec<&Reading>) =
            token.readings().iter().partition(|x| x.is_sentinel());

        let mut output: Vec<Reading> = match self {
            Disambiguation::Filter(matcher) => {
                let kept: Vec<_> = readings
                    .iter()
                    .filter(|x| matcher.is_match(x.tag()))
                    .map(|x| (*x).clone())
                    .collect();

                if kept.is_empty() {
                    return token.readings().to_vec();
                }
                kept
            }
            Disambiguation::Remove(matcher) => readings
                .iter()
                .filter(|x| !matcher.is_match(x.tag()))
                .map(|x| (*x).clone())
                .collect(),
            Disambiguation::Replace(reading) => vec![Disambiguation::with_lemma(reading, token)],
            Disambiguation::Add(reading) => {
                let reading = Disambiguation::with_lemma(reading, token);
                let mut output: Vec<_> = readings.into_iter().cloned().collect();
                if !output.contains(&reading) {
                    output.push(reading);
                }
                output
            }
        };

        output.extend(sentinels.into_iter().cloned());
        output
    }
}

/// A rule which changes the readings of the tokens it matches instead of reporting an error.
#[derive(Debug, Serialize, Deserialize)]
pub struct DisambiguationRule {
    pub(crate) id: RuleId,
    pub(crate) engine: Engine,
    pub(crate) disambiguation: Disambiguation,
    pub(crate) step_budget: usize,
}

impl DisambiguationRule {
    pub fn new(id: RuleId, engine: Engine, disambiguation: Disambiguation) -> Self {
        DisambiguationRule {
            id,
            engine,
            disambiguation,
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }

    pub fn with_step_budget(mut self, step_budget: usize) -> Self {
        self.step_budget = step_budget;
        self
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// Filtered indices of the tokens in the marked parts, or of the whole match if no part is marked.
    fn marked_indices(&self, graph: &MatchGraph) -> Vec<usize> {
        let parts = self.engine.composition().parts();

        if parts.iter().any(|x| x.marker) {
            parts
                .iter()
                .enumerate()
                .filter(|(_, part)| part.marker)
                .filter_map(|(i, _)| graph.by_id(i + 1))
                .flat_map(|group| group.span.clone())
                .collect()
        } else {
            graph.span().collect()
        }
    }

    /// Returns the sentence with the readings of all matched tokens changed.
    ///
    /// # Errors
    /// - [Error::PatternTooComplex] if matching takes more steps than the budget allows.
    pub fn apply(&self, sentence: &AnalyzedSentence) -> Result<AnalyzedSentence, Error> {
        let view = sentence.filtered_view();
        let mut budget = StepBudget::new(self.step_budget);

        let graphs = self
            .engine
            .get_matches(view.tokens(), true, &mut budget)
            .map_err(|_| Error::PatternTooComplex {
                id: self.id.to_string(),
                budget: self.step_budget,
            })?;

        if graphs.is_empty() {
            return Ok(sentence.clone());
        }

        let mut changed: FnvHashMap<usize, Token> = FnvHashMap::default();

        for graph in &graphs {
            for index in self.marked_indices(graph) {
                let full_index = view.to_full_offset(index)?;
                let token = changed
                    .get(&full_index)
                    .unwrap_or(&sentence.tokens()[full_index]);

                let readings = self.disambiguation.apply(token);
                let token = token.with_readings(readings);
                changed.insert(full_index, token);
            }
        }

        Ok(AnalyzedSentence::new(
            sentence
                .tokens()
                .iter()
                .enumerate()
                .map(|(i, token)| changed.remove(&i).unwrap_or_else(|| token.clone()))
                .collect(),
        ))
    }
}

/// Applies disambiguation rules one after another.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Disambiguator {
    rules: Vec<DisambiguationRule>,
}

impl Disambiguator {
    pub fn new(rules: Vec<DisambiguationRule>) -> Self {
        Disambiguator { rules }
    }

    /// Compiles a JSON list of disambiguation rules.
    pub fn from_json<R: Read>(reader: R) -> Result<Self, Error> {
        let specs: Vec<DisambiguationRuleSpec> = serde_json::from_reader(reader)?;

        Ok(Disambiguator::new(
            specs
                .into_iter()
                .map(DisambiguationRule::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }

    pub fn rules(&self) -> &[DisambiguationRule] {
        &self.rules
    }

    /// Applies all rules in order. A rule which fails is skipped with a warning.
    pub fn apply(&self, mut sentence: AnalyzedSentence) -> AnalyzedSentence {
        for rule in &self.rules {
            match rule.apply(&sentence) {
                Ok(output) => sentence = output,
                Err(error) => warn!("skipping disambiguation rule {}: {}", rule.id, error),
            }
        }

        sentence
    }
}
