//! Implementations related to single rules.

use crate::{
    tokenizer::{Inflect, Tokenizer},
    types::*,
    Error,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub mod bitext;
pub mod disambiguation;
pub mod document;
pub mod engine;
pub mod grammar;
pub mod id;

use engine::{
    composition::{GraphId, MatchGraph, StepBudget},
    Engine,
};
use grammar::{Example, Synthesizer};
use id::RuleId;

pub use bitext::{BitextPolicy, BitextRule, SameTranslationRule};
pub use disambiguation::{DisambiguationRule, Disambiguator};
pub use document::{DocumentCheck, DocumentRule};

/// Number of steps a rule may take to match one sentence unless configured otherwise.
pub const DEFAULT_STEP_BUDGET: usize = 50_000;

/// A grammar rule: a pattern, a message and the templates of its replacements.
#[derive(Debug, Serialize, Deserialize)]
pub struct Rule {
    pub(crate) id: RuleId,
    pub(crate) engine: Engine,
    pub(crate) message: Synthesizer,
    pub(crate) suggesters: Vec<Synthesizer>,
    pub(crate) find_all: bool,
    pub(crate) step_budget: usize,
    pub(crate) examples: Vec<Example>,
}

impl Rule {
    pub fn new(id: RuleId, engine: Engine, message: Synthesizer, suggesters: Vec<Synthesizer>) -> Self {
        Rule {
            id,
            engine,
            message,
            suggesters,
            find_all: false,
            step_budget: DEFAULT_STEP_BUDGET,
            examples: Vec::new(),
        }
    }

    /// Report every non-overlapping match instead of only the leftmost one.
    pub fn with_find_all(mut self, find_all: bool) -> Self {
        self.find_all = find_all;
        self
    }

    pub fn with_step_budget(mut self, step_budget: usize) -> Self {
        self.step_budget = step_budget;
        self
    }

    pub fn with_examples(mut self, examples: Vec<Example>) -> Self {
        self.examples = examples;
        self
    }

    /// A unique identifier of this rule.
    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn find_all(&self) -> bool {
        self.find_all
    }

    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    pub(crate) fn set_step_budget(&mut self, step_budget: usize) {
        self.step_budget = step_budget;
    }

    /// The first group of the reported span and the span itself.
    /// The span covers the marked parts which consumed tokens, or the whole match if there are none.
    fn marked_span(&self, graph: &MatchGraph) -> (GraphId, Range<usize>) {
        let mut marked = self
            .engine
            .composition()
            .parts()
            .iter()
            .enumerate()
            .filter(|(_, part)| part.marker)
            .map(|(i, _)| i + 1)
            .filter(|id| graph.by_id(*id).map_or(false, |group| !group.is_empty()));

        match marked.next() {
            Some(first) => {
                let last = marked.last().unwrap_or(first);
                (
                    first,
                    graph.groups()[first].span.start..graph.groups()[last].span.end,
                )
            }
            None => (1, graph.span()),
        }
    }

    pub(crate) fn apply_view(
        &self,
        view: &FilteredView,
        inflector: &dyn Inflect,
    ) -> Result<Vec<Suggestion>, Error> {
        let mut budget = StepBudget::new(self.step_budget);
        let graphs = self
            .engine
            .get_matches(view.tokens(), self.find_all, &mut budget)
            .map_err(|_| Error::PatternTooComplex {
                id: self.id.to_string(),
                budget: self.step_budget,
            })?;

        let mut suggestions = Vec::with_capacity(graphs.len());

        for graph in graphs {
            let (first_group, span) = self.marked_span(&graph);
            let char_span = view.char_span(span)?;

            let message = self
                .message
                .apply(&graph, view, inflector, first_group)?
                .into_iter()
                .next()
                .unwrap_or_default();

            let mut replacements: Vec<String> = Vec::new();
            for suggester in &self.suggesters {
                for replacement in suggester.apply(&graph, view, inflector, first_group)? {
                    if !replacements.contains(&replacement) {
                        replacements.push(replacement);
                    }
                }
            }

            suggestions.push(Suggestion::new(
                self.id.to_string(),
                message,
                char_span,
                replacements,
            ));
        }

        Ok(suggestions)
    }

    /// Matches this rule against a sentence.
    ///
    /// # Errors
    /// - [Error::PatternTooComplex] if matching takes more steps than the budget of this rule allows.
    pub fn apply(
        &self,
        sentence: &AnalyzedSentence,
        inflector: &dyn Inflect,
    ) -> Result<Vec<Suggestion>, Error> {
        self.apply_view(&sentence.filtered_view(), inflector)
    }

    /// Checks the examples of this rule. Failures are logged.
    pub fn test(&self, tokenizer: &Tokenizer) -> bool {
        let mut passes = Vec::new();

        for example in self.examples.iter() {
            let sentences = tokenizer.analyze(example.text());
            info!("Sentences: {:#?}", sentences);

            let mut suggestions = Vec::new();
            let mut error = None;
            for sentence in &sentences {
                match self.apply(sentence, tokenizer) {
                    Ok(x) => suggestions.extend(x),
                    Err(e) => error = Some(e),
                }
            }

            let pass = if error.is_some() || suggestions.len() > 1 {
                false
            } else {
                match example.suggestion() {
                    Some(expected) => {
                        suggestions.len() == 1 && Example::is_equivalent(expected, &suggestions[0])
                    }
                    None => suggestions.is_empty(),
                }
            };

            if !pass {
                warn!(
                    "Rule {}: test \"{}\" failed. Expected: {:#?}. Found: {:#?}. Error: {:?}.",
                    self.id,
                    example.text(),
                    example.suggestion(),
                    suggestions,
                    error
                );
            }

            passes.push(pass);
        }

        passes.iter().all(|x| *x)
    }
}

#[cfg(test)]
mod tests {
    use super::engine::composition::*;
    use super::*;
    use crate::tokenizer::NoInflection;
    use std::convert::TryFrom;

    fn text(string: &str) -> Atom {
        concrete::TextAtom::new(Matcher::new_string(
            either::Left(string.into()),
            false,
            false,
            true,
        ))
        .into()
    }

    fn sentence(words: &[&str]) -> AnalyzedSentence {
        let mut tokens = vec![Token::sent_start(0)];
        let mut offset = 0;
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                tokens.push(Token::new(" ", offset, vec![]));
                offset += 1;
            }
            tokens.push(Token::new(*word, offset, vec![]).with_space_before(i > 0));
            offset += word.chars().count();
        }
        AnalyzedSentence::new(tokens)
    }

    fn rule(parts: Vec<Part>, suggestion: &str) -> Rule {
        let n = parts.len();
        Rule::new(
            RuleId::try_from("TEST/RULE").unwrap(),
            Engine::new(Composition::new(parts).unwrap(), Vec::new()),
            Synthesizer::parse("Check this.", n, false).unwrap(),
            vec![Synthesizer::parse(suggestion, n, true).unwrap()],
        )
    }

    #[test]
    fn span_covers_marked_parts_only() {
        let rule = rule(
            vec![
                Part::new(text("a"), Quantifier::once(), false),
                Part::new(text("lot"), Quantifier::once(), true),
                Part::new(text("of"), Quantifier::new(0, 1).unwrap(), true),
                Part::new(text("people"), Quantifier::once(), false),
            ],
            "many",
        );

        let suggestions = rule
            .apply(&sentence(&["a", "lot", "people"]), &NoInflection)
            .unwrap();

        assert_eq!(suggestions.len(), 1);
        // the empty optional part does not extend the span
        assert_eq!((suggestions[0].start, suggestions[0].end), (2, 5));
        assert_eq!(suggestions[0].source, "TEST/RULE");
        assert_eq!(suggestions[0].message, "Check this.");
        assert_eq!(suggestions[0].replacements, vec!["many"]);
    }

    #[test]
    fn find_all_reports_every_match() {
        let parts = || vec![Part::new(text("very"), Quantifier::new(1, 5).unwrap(), false)];
        let sentence = sentence(&["very", "very", "good", "very", "bad"]);

        let leftmost = rule(parts(), "\\1").apply(&sentence, &NoInflection).unwrap();
        assert_eq!(leftmost.len(), 1);
        assert_eq!(leftmost[0].replacements, vec!["very very"]);

        let all = rule(parts(), "\\1")
            .with_find_all(true)
            .apply(&sentence, &NoInflection)
            .unwrap();
        let spans: Vec<_> = all.iter().map(|x| (x.start, x.end)).collect();
        assert_eq!(spans, vec![(0, 9), (15, 19)]);
    }

    #[test]
    fn exceeding_the_budget_is_an_error() {
        let mut parts: Vec<_> = (0..6)
            .map(|_| Part::new(text("x"), Quantifier::new(0, 10).unwrap(), false))
            .collect();
        parts.push(Part::new(text("y"), Quantifier::once(), false));

        let sentence = sentence(&["x"; 40]);
        let result = rule(parts, "").with_step_budget(1000).apply(&sentence, &NoInflection);

        assert!(matches!(
            result,
            Err(Error::PatternTooComplex { budget: 1000, .. })
        ));
    }
}
