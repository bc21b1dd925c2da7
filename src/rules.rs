//! Sets of grammatical error correction rules.

use crate::compile::{RuleSetSpec, RuleSpec};
use crate::rule::{
    id::Selector, BitextRule, DocumentCheck, DocumentRule, Rule, SameTranslationRule,
};
use crate::types::*;
use crate::utils::parallelism::MaybeParallelRefIterator;
use crate::{
    tokenizer::{Inflect, Tokenizer},
    Error,
};
use fs_err::File;
use log::{info, warn};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::{
    convert::TryFrom,
    io::{BufReader, Read, Write},
    iter::{IntoIterator, Iterator},
    path::Path,
};

/// Options for a rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesOptions {
    /// Whether to skip (and log) rules which can not be compiled. If false, the first invalid rule fails the whole set.
    pub allow_errors: bool,
    /// Rules enabled by default. If empty, all rules are enabled.
    pub ids: Vec<Selector>,
    /// Rules disabled by default. Takes precedence over `ids`.
    pub ignore_ids: Vec<Selector>,
    /// Overrides the step budget of every rule.
    pub step_budget: Option<usize>,
}

impl Default for RulesOptions {
    fn default() -> Self {
        RulesOptions {
            allow_errors: true,
            ids: Vec::new(),
            ignore_ids: Vec::new(),
            step_budget: None,
        }
    }
}

impl RulesOptions {
    fn default_selectors(&self) -> Vec<(Selector, bool)> {
        self.ids
            .iter()
            .map(|x| (x.clone(), true))
            .chain(self.ignore_ids.iter().map(|x| (x.clone(), false)))
            .collect()
    }
}

/// A set of grammatical error correction rules.
#[derive(Serialize, Deserialize, Default)]
pub struct Rules {
    pub(crate) rules: Vec<Rule>,
    pub(crate) bitext_rules: Vec<BitextRule>,
    pub(crate) same_translation_rules: Vec<SameTranslationRule>,
    pub(crate) document_rules: Vec<DocumentRule>,
    pub(crate) default_selectors: Vec<(Selector, bool)>,
    /// Whether a rule no selector matches is enabled.
    pub(crate) enabled_by_default: bool,
    #[serde(default)]
    pub(crate) selectors: Vec<(Selector, bool)>,
    #[serde(skip)]
    pub(crate) enabled_mask: OnceCell<Vec<bool>>,
}

fn compile_all<S, T>(specs: Vec<S>, allow_errors: bool, id: impl Fn(&S) -> String) -> Result<Vec<T>, Error>
where
    T: TryFrom<S, Error = Error>,
{
    let mut output = Vec::with_capacity(specs.len());

    for spec in specs {
        let spec_id = id(&spec);

        match T::try_from(spec) {
            Ok(x) => output.push(x),
            Err(error) if allow_errors => warn!("skipping rule {}: {}", spec_id, error),
            Err(error) => return Err(error),
        }
    }

    Ok(output)
}

impl Rules {
    /// Creates a new rules set from a path to a binary.
    ///
    /// # Errors
    /// - If the file can not be opened.
    /// - If the file content can not be deserialized to a rules set.
    pub fn new<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(p.as_ref())?);
        Self::from_reader(reader)
    }

    /// Creates a new rules set from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Serializes this rules set to a writer. Enabled and disabled rules are preserved.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        Ok(bincode::serialize_into(writer, self)?)
    }

    /// Compiles a rules set from grammar rule definitions.
    ///
    /// # Errors
    /// - [Error::MalformedPattern] (or an id error) for the first invalid rule, unless `options.allow_errors` is set.
    ///   In that case invalid rules are skipped with a warning.
    pub fn from_specs(specs: Vec<RuleSpec>, options: RulesOptions) -> Result<Self, Error> {
        Self::from_rule_set(
            RuleSetSpec {
                rules: specs,
                ..RuleSetSpec::default()
            },
            options,
        )
    }

    /// Compiles a complete rule file.
    pub fn from_rule_set(spec: RuleSetSpec, options: RulesOptions) -> Result<Self, Error> {
        let mut rules: Vec<Rule> = compile_all(spec.rules, options.allow_errors, |x| x.id.clone())?;
        let mut bitext_rules: Vec<BitextRule> =
            compile_all(spec.bitext_rules, options.allow_errors, |x| x.id.clone())?;

        if let Some(step_budget) = options.step_budget {
            rules.iter_mut().for_each(|x| x.set_step_budget(step_budget));
            bitext_rules
                .iter_mut()
                .for_each(|x| x.set_step_budget(step_budget));
        }

        info!(
            "Compiled {} rules and {} bitext rules.",
            rules.len(),
            bitext_rules.len()
        );

        Ok(Rules {
            rules,
            bitext_rules,
            same_translation_rules: spec.same_translation_rules,
            document_rules: spec.document_rules,
            default_selectors: options.default_selectors(),
            enabled_by_default: options.ids.is_empty(),
            selectors: Vec::new(),
            enabled_mask: OnceCell::new(),
        })
    }

    /// Compiles a rule file in JSON format. See [RuleSetSpec] for the structure.
    pub fn from_json<R: Read>(reader: R, options: RulesOptions) -> Result<Self, Error> {
        let spec: RuleSetSpec = serde_json::from_reader(reader)?;
        Self::from_rule_set(spec, options)
    }

    /// All rules ordered by priority.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn bitext_rules(&self) -> &[BitextRule] {
        &self.bitext_rules
    }

    pub fn document_rules(&self) -> &[DocumentRule] {
        &self.document_rules
    }

    /// Returns an iterator over all rules matching the selector.
    pub fn select<'a>(&'a self, selector: &'a Selector) -> RulesIter<'a> {
        RulesIter {
            inner: self.rules.iter(),
            selector: Some(selector),
        }
    }

    /// Enables all rules matching the selector.
    pub fn enable(&mut self, selector: &Selector) {
        self.selectors.push((selector.clone(), true));
        self.enabled_mask = OnceCell::new();
    }

    /// Disables all rules matching the selector.
    pub fn disable(&mut self, selector: &Selector) {
        self.selectors.push((selector.clone(), false));
        self.enabled_mask = OnceCell::new();
    }

    /// Whether the rule at this position is checked. The last matching selector decides.
    pub fn is_enabled(&self, index: usize) -> bool {
        self.mask().get(index).copied().unwrap_or(false)
    }

    fn mask(&self) -> &[bool] {
        self.enabled_mask.get_or_init(|| {
            self.rules
                .iter()
                .map(|rule| {
                    self.default_selectors
                        .iter()
                        .chain(self.selectors.iter())
                        .rev()
                        .find_map(|(selector, enabled)| {
                            if selector.is_match(rule.id()) {
                                Some(*enabled)
                            } else {
                                None
                            }
                        })
                        .unwrap_or(self.enabled_by_default)
                })
                .collect()
        })
    }

    /// Compute the suggestions for a sentence by checking all enabled rules.
    ///
    /// If two suggestions overlap, the one of the rule listed first is kept.
    /// Rules which exceed their step budget are skipped with a warning.
    pub fn apply(&self, sentence: &AnalyzedSentence, inflector: &dyn Inflect) -> Vec<Suggestion> {
        if sentence.tokens().is_empty() {
            return Vec::new();
        }

        let mask = self.mask();
        let view = sentence.filtered_view();

        let output: Vec<(usize, Suggestion)> = self
            .rules
            .maybe_par_iter()
            .enumerate()
            .filter(|(i, _)| mask[*i])
            .map(|(i, rule)| -> Vec<(usize, Suggestion)> {
                match rule.apply_view(&view, inflector) {
                    Ok(suggestions) => suggestions.into_iter().map(|x| (i, x)).collect(),
                    Err(error) => {
                        warn!("skipping rule {}: {}", rule.id(), error);
                        Vec::new()
                    }
                }
            })
            .flatten()
            .collect();

        resolve_overlaps(output)
    }

    /// Checks a source sentence and its translation with all bitext rules and same translation rules.
    pub fn apply_bitext(
        &self,
        source: &AnalyzedSentence,
        target: &AnalyzedSentence,
        inflector: &dyn Inflect,
    ) -> Vec<Suggestion> {
        let mut output: Vec<(usize, Suggestion)> = Vec::new();

        for (i, rule) in self.bitext_rules.iter().enumerate() {
            match rule.apply(source, target, inflector) {
                Ok(suggestions) => output.extend(suggestions.into_iter().map(|x| (i, x))),
                Err(error) => warn!("skipping bitext rule {}: {}", rule.id(), error),
            }
        }

        let offset = self.bitext_rules.len();
        for (i, rule) in self.same_translation_rules.iter().enumerate() {
            if let Some(suggestion) = rule.apply(source, target) {
                output.push((offset + i, suggestion));
            }
        }

        resolve_overlaps(output)
    }

    /// Compute the suggestions for a text by checking all rules sentence by sentence.
    pub fn suggest(&self, text: &str, tokenizer: &Tokenizer) -> Vec<Suggestion> {
        if text.is_empty() {
            return Vec::new();
        }

        tokenizer
            .analyze(text)
            .iter()
            .flat_map(|sentence| self.apply(sentence, tokenizer))
            .collect()
    }

    /// Correct a text by first tokenizing, then finding all suggestions and choosing the first replacement of each suggestion.
    pub fn correct(&self, text: &str, tokenizer: &Tokenizer) -> String {
        let suggestions = self.suggest(text, tokenizer);
        apply_suggestions(text, &suggestions)
    }

    /// Checks a whole document with the sentence rules and the document rules.
    /// Each call starts from a fresh document state.
    pub fn check_document(&self, text: &str, tokenizer: &Tokenizer) -> Vec<Suggestion> {
        let mut check = DocumentCheck::new();
        let mut suggestions = Vec::new();

        for sentence in tokenizer.analyze(text) {
            let mut output: Vec<(usize, Suggestion)> = self
                .apply(&sentence, tokenizer)
                .into_iter()
                .map(|x| (0, x))
                .collect();
            output.extend(
                check
                    .check(&self.document_rules, &sentence)
                    .into_iter()
                    .map(|x| (1, x)),
            );

            suggestions.extend(resolve_overlaps(output));
        }

        suggestions
    }

    /// Runs the examples of all rules.
    ///
    /// # Errors
    /// - [Error::TestFailed] if any example fails. Failures are logged.
    pub fn test(&self, tokenizer: &Tokenizer) -> Result<(), Error> {
        let n_failed = self
            .rules
            .iter()
            .filter(|rule| !rule.test(tokenizer))
            .count();

        info!(
            "{} out of {} rules passed the tests.",
            self.rules.len() - n_failed,
            self.rules.len()
        );

        if n_failed == 0 {
            Ok(())
        } else {
            Err(Error::TestFailed)
        }
    }

    /// A referential iterator.
    pub fn iter(&self) -> RulesIter {
        RulesIter {
            inner: self.rules.iter(),
            selector: None,
        }
    }
}

/// Keeps the suggestions which do not overlap a suggestion of a higher priority (lower index) and sorts them by start.
fn resolve_overlaps(mut output: Vec<(usize, Suggestion)>) -> Vec<Suggestion> {
    output.sort_by(|(ia, a), (ib, b)| ia.cmp(ib).then_with(|| a.start.cmp(&b.start)));

    let mut kept: Vec<Suggestion> = Vec::with_capacity(output.len());
    for (_, suggestion) in output {
        if kept.iter().all(|x| !x.overlaps(&suggestion)) {
            kept.push(suggestion);
        }
    }

    kept.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));
    kept
}

/// A wrapping helper iterator.
pub struct RulesIter<'a> {
    selector: Option<&'a Selector>,
    inner: std::slice::Iter<'a, Rule>,
}

impl<'a> Iterator for RulesIter<'a> {
    type Item = &'a Rule;
    fn next(&mut self) -> Option<Self::Item> {
        let selector = self.selector.as_ref();

        self.inner
            .find(|rule| selector.map_or(true, |s| s.is_match(rule.id())))
    }
}

pub struct RulesIntoIter {
    inner: std::vec::IntoIter<Rule>,
}

impl Iterator for RulesIntoIter {
    type Item = Rule;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl IntoIterator for Rules {
    type Item = Rule;
    type IntoIter = RulesIntoIter;
    fn into_iter(self) -> Self::IntoIter {
        RulesIntoIter {
            inner: self.rules.into_iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::ManualTagger;

    fn spec(json: &str) -> RuleSpec {
        serde_json::from_str(json).unwrap()
    }

    fn rules(options: RulesOptions) -> Rules {
        Rules::from_specs(
            vec![
                spec(r#"{ "id": "TYPOS/TEH", "message": "Typo.", "pattern": [{ "text": "teh" }], "suggestions": ["the"] }"#),
                spec(r#"{ "id": "TYPOS/TEH_CAT", "message": "Typo.", "pattern": [{ "text": "teh" }, { "text": "cat" }], "suggestions": ["the cat"] }"#),
                spec(r#"{ "id": "STYLE/CAT", "message": "Cat.", "pattern": [{ "text": "cat" }], "suggestions": ["kitten"] }"#),
            ],
            options,
        )
        .unwrap()
    }

    #[test]
    fn earlier_rule_wins_overlaps() {
        let tokenizer = Tokenizer::new(ManualTagger::default());
        let suggestions = rules(RulesOptions::default()).suggest("Where is teh cat?", &tokenizer);

        let ids: Vec<_> = suggestions.iter().map(|x| x.source.as_str()).collect();
        assert_eq!(ids, vec!["TYPOS/TEH", "STYLE/CAT"]);
        assert_eq!(
            rules(RulesOptions::default()).correct("Where is teh cat?", &tokenizer),
            "Where is the kitten?"
        );
    }

    #[test]
    fn selectors() {
        let tokenizer = Tokenizer::new(ManualTagger::default());
        let options = RulesOptions {
            ignore_ids: vec![Selector::try_from("typos/teh").unwrap()],
            ..RulesOptions::default()
        };

        let mut rules = rules(options);
        let ids = |rules: &Rules| -> Vec<String> {
            rules
                .suggest("Where is teh cat?", &tokenizer)
                .into_iter()
                .map(|x| x.source)
                .collect()
        };

        assert_eq!(ids(&rules), vec!["TYPOS/TEH_CAT"]);

        rules.disable(&Selector::try_from("TYPOS").unwrap());
        assert_eq!(ids(&rules), vec!["STYLE/CAT"]);

        rules.enable(&Selector::try_from("TYPOS/TEH").unwrap());
        assert_eq!(ids(&rules), vec!["TYPOS/TEH", "STYLE/CAT"]);
    }

    #[test]
    fn only_selected_ids() {
        let options = RulesOptions {
            ids: vec![Selector::try_from("STYLE/CAT").unwrap()],
            ..RulesOptions::default()
        };
        let rules = rules(options);

        assert!(!rules.is_enabled(0));
        assert!(!rules.is_enabled(1));
        assert!(rules.is_enabled(2));
    }

    #[test]
    fn invalid_rules() {
        let specs = || {
            vec![
                spec(r#"{ "id": "A/B", "message": "", "pattern": [] }"#),
                spec(r#"{ "id": "A/C", "message": "", "pattern": [{ "text": "c" }] }"#),
            ]
        };

        let rules = Rules::from_specs(specs(), RulesOptions::default()).unwrap();
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.rules()[0].id().to_string(), "A/C");

        assert!(matches!(
            Rules::from_specs(
                specs(),
                RulesOptions {
                    allow_errors: false,
                    ..RulesOptions::default()
                },
            ),
            Err(Error::MalformedPattern(_))
        ));
    }

    #[test]
    fn select() {
        let rules = rules(RulesOptions::default());
        let selector = Selector::try_from("TYPOS").unwrap();

        assert_eq!(rules.select(&selector).count(), 2);
        assert_eq!(rules.iter().count(), 3);
    }
}
