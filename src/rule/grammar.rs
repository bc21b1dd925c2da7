use super::engine::composition::{GraphId, MatchGraph};
use crate::types::*;
use crate::{
    tokenizer::Inflect,
    utils::{self, regex::SerializeRegex},
    Error,
};
use itertools::Itertools;
use onig::Captures;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    Nop,
    AllLower,
    StartLower,
    AllUpper,
    StartUpper,
}

impl Default for Conversion {
    fn default() -> Self {
        Conversion::Nop
    }
}

impl Conversion {
    fn convert(&self, input: &str) -> String {
        match &self {
            Conversion::Nop => input.to_string(),
            Conversion::AllLower => input.to_lowercase(),
            Conversion::StartLower => utils::apply_to_first(input, |c| c.to_lowercase().collect()),
            Conversion::AllUpper => input.to_uppercase(),
            Conversion::StartUpper => utils::apply_to_first(input, |c| c.to_uppercase().collect()),
        }
    }
}

/// An example associated with a [Rule][crate::rule::Rule].
#[derive(Debug, Serialize, Deserialize)]
pub struct Example {
    pub(crate) text: String,
    pub(crate) suggestion: Option<Suggestion>,
}

impl Example {
    pub fn new(text: String, suggestion: Option<Suggestion>) -> Self {
        Example { text, suggestion }
    }

    /// Gets the text of this example.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Gets the suggestion for this example.
    /// * If this is `None`, the associated rule should not trigger for this example.
    /// * If it is `Some`, the associated rule should return a suggestion with equivalent range and suggestions.
    pub fn suggestion(&self) -> Option<&Suggestion> {
        self.suggestion.as_ref()
    }

    /// Whether `suggestion` has the expected span and shares at least one replacement with the expected suggestion.
    /// If no replacements are expected, only the span is compared.
    pub(crate) fn is_equivalent(expected: &Suggestion, suggestion: &Suggestion) -> bool {
        let a: HashSet<&String> = expected.replacements.iter().collect();
        let b: HashSet<&String> = suggestion.replacements.iter().collect();

        (a.is_empty() || a.intersection(&b).count() > 0)
            && expected.start == suggestion.start
            && expected.end == suggestion.end
    }
}

/// Candidate forms of one token in the given tag.
/// The surface is used if one of the token's own readings already carries the tag.
fn inflections(token: &Token, tag: &str, inflector: &dyn Inflect) -> Vec<String> {
    if token.has_tag(tag) {
        return vec![token.as_str().to_string()];
    }

    let mut seen_lemmas = HashSet::new();
    let mut seen_forms = HashSet::new();
    let mut forms = Vec::new();

    for reading in token.readings().iter().filter(|x| !x.is_sentinel()) {
        if !seen_lemmas.insert(reading.lemma()) {
            continue;
        }

        for form in inflector.inflect(reading.lemma(), tag) {
            if seen_forms.insert(form.clone()) {
                forms.push(form);
            }
        }
    }

    forms
}

/// A back-reference to the text of a group in the match.
#[derive(Serialize, Deserialize, Debug)]
pub struct Match {
    pub(crate) id: GraphId,
    pub(crate) conversion: Conversion,
    /// Target tag, if the referenced tokens should be inflected.
    pub(crate) inflect: Option<String>,
    pub(crate) regex_replacer: Option<(SerializeRegex, String)>,
}

impl Match {
    pub fn new(id: GraphId) -> Self {
        Match {
            id,
            conversion: Conversion::Nop,
            inflect: None,
            regex_replacer: None,
        }
    }

    pub fn with_conversion(mut self, conversion: Conversion) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn with_inflection<S: Into<String>>(mut self, tag: S) -> Self {
        self.inflect = Some(tag.into());
        self
    }

    pub fn with_regex_replacer(mut self, regex: SerializeRegex, replacement: String) -> Self {
        self.regex_replacer = Some((regex, replacement));
        self
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    fn candidates(
        &self,
        graph: &MatchGraph,
        view: &FilteredView,
        inflector: &dyn Inflect,
    ) -> Result<Vec<String>, Error> {
        let group = graph.by_id(self.id).ok_or(Error::Index {
            index: self.id,
            len: graph.groups().len(),
        })?;

        let texts = match &self.inflect {
            None => vec![view.text(group.span.clone())?],
            Some(_) if group.is_empty() => vec![String::new()],
            Some(tag) => group
                .tokens(graph.tokens())
                .iter()
                .map(|token| inflections(token, tag, inflector))
                .multi_cartesian_product()
                .map(|forms| forms.join(" "))
                .collect(),
        };

        Ok(texts
            .into_iter()
            .map(|text| {
                let text = if let Some((regex, replacement)) = &self.regex_replacer {
                    regex.replace_all(&text, |caps: &Captures| {
                        utils::dollar_replace(replacement.to_string(), caps)
                    })
                } else {
                    text
                };

                self.conversion.convert(&text)
            })
            .collect())
    }

    fn has_conversion(&self) -> bool {
        !matches!(self.conversion, Conversion::Nop)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub enum SynthesizerPart {
    Text(String),
    Match(Match),
}

/// Builds messages and replacements from literal text and references to the matched groups.
#[derive(Debug, Serialize, Deserialize)]
pub struct Synthesizer {
    pub(crate) use_titlecase_adjust: bool,
    pub(crate) parts: Vec<SynthesizerPart>,
}

impl Synthesizer {
    pub fn new(parts: Vec<SynthesizerPart>, use_titlecase_adjust: bool) -> Self {
        Synthesizer {
            use_titlecase_adjust,
            parts,
        }
    }

    /// Parses a template. `\N` and `{N}` are replaced by the text of group `N`,
    /// `{N:TAG}` by the forms of group `N` inflected to `TAG`.
    /// Groups are numbered from 1 in pattern order, 0 is the whole match.
    pub fn parse(template: &str, n_groups: usize, use_titlecase_adjust: bool) -> Result<Self, Error> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let chars: Vec<char> = template.chars().collect();

        let mut i = 0;
        while i < chars.len() {
            let reference = match chars[i] {
                '\\' => parse_number(&chars[i + 1..]).map(|(id, len)| (Match::new(id), len + 1)),
                '{' => parse_braced(&chars[i + 1..]).map(|(m, len)| (m, len + 1)),
                _ => None,
            };

            match reference {
                Some((m, len)) => {
                    if m.id > n_groups {
                        return Err(Error::MalformedPattern(format!(
                            "template \"{}\" references group {}, but the pattern has {} elements",
                            template, m.id, n_groups
                        )));
                    }

                    if !text.is_empty() {
                        parts.push(SynthesizerPart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(SynthesizerPart::Match(m));
                    i += len;
                }
                None => {
                    text.push(chars[i]);
                    i += 1;
                }
            }
        }

        if !text.is_empty() {
            parts.push(SynthesizerPart::Text(text));
        }

        Ok(Synthesizer::new(parts, use_titlecase_adjust))
    }

    pub fn parts(&self) -> &[SynthesizerPart] {
        &self.parts
    }

    /// Builds all candidate strings for a match. Each combination of inflection candidates yields one string.
    /// If a referenced group has no candidates, the result is empty.
    ///
    /// `first_group` is the first group inside the reported span, it decides whether the result is title-cased.
    pub fn apply(
        &self,
        graph: &MatchGraph,
        view: &FilteredView,
        inflector: &dyn Inflect,
        first_group: GraphId,
    ) -> Result<Vec<String>, Error> {
        let mut candidates = Vec::with_capacity(self.parts.len());

        for part in &self.parts {
            match part {
                SynthesizerPart::Text(t) => candidates.push(vec![t.clone()]),
                SynthesizerPart::Match(m) => {
                    let texts = m.candidates(graph, view, inflector)?;
                    if texts.is_empty() {
                        return Ok(Vec::new());
                    }
                    candidates.push(texts);
                }
            }
        }

        let starts_with_conversion = match &self.parts[..] {
            [SynthesizerPart::Match(m), ..] => m.has_conversion(),
            _ => false,
        };

        // if the output does not start with a case conversion match, make it title case if the replaced text is
        let make_uppercase = self.use_titlecase_adjust
            && !starts_with_conversion
            && graph.groups()[first_group.max(1).min(graph.groups().len())..]
                .iter()
                .find_map(|x| x.tokens(graph.tokens()).first())
                .map_or(false, |first_token| utils::starts_uppercase(first_token.as_str()));

        let joined: Vec<String> = if candidates.is_empty() {
            vec![String::new()]
        } else {
            candidates
                .into_iter()
                .multi_cartesian_product()
                .map(|x| x.join(""))
                .collect()
        };

        Ok(joined
            .into_iter()
            .map(|x| {
                let x = utils::normalize_whitespace(&x);
                if make_uppercase {
                    utils::apply_to_first(&x, |c| c.to_uppercase().collect())
                } else {
                    x
                }
            })
            .unique()
            .collect())
    }
}

fn parse_number(chars: &[char]) -> Option<(usize, usize)> {
    let len = chars.iter().take_while(|c| c.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }

    chars[..len]
        .iter()
        .collect::<String>()
        .parse()
        .ok()
        .map(|id| (id, len))
}

fn parse_braced(chars: &[char]) -> Option<(Match, usize)> {
    let (id, mut len) = parse_number(chars)?;
    let mut m = Match::new(id);

    if chars.get(len) == Some(&':') {
        let tag_len = chars[len + 1..].iter().take_while(|c| **c != '}').count();
        if tag_len == 0 {
            return None;
        }
        m = m.with_inflection(chars[len + 1..len + 1 + tag_len].iter().collect::<String>());
        len += tag_len + 1;
    }

    if chars.get(len) == Some(&'}') {
        Some((m, len + 1))
    } else {
        None
    }
}
