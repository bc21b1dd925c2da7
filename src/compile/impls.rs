use std::convert::TryFrom;

use super::structure::*;
use crate::{
    rule::{
        bitext::BitextRule,
        disambiguation::{Disambiguation, DisambiguationRule},
        engine::{
            composition::{
                concrete::{SpaceBeforeAtom, TextAtom, WordDataAtom},
                AndAtom, Atom, Composition, Exception, Matcher, NotAtom, OrAtom, Part, PosMatcher,
                Quantifier, WordDataMatcher,
            },
            Engine,
        },
        grammar::{Example, Match, Synthesizer, SynthesizerPart},
        id::RuleId,
        Rule,
    },
    types::{Reading, Suggestion},
    utils::{self, regex::SerializeRegex},
    Error,
};

fn compile_regex(pattern: &str, case_sensitive: bool, full_match: bool) -> Result<SerializeRegex, Error> {
    SerializeRegex::new(pattern.trim(), case_sensitive, full_match)
        .map_err(|e| Error::MalformedPattern(format!("invalid regex {:?}: {}", pattern, e)))
}

fn compile_pos_matcher(postag: &str, is_regex: bool, negate: bool) -> Result<PosMatcher, Error> {
    let matcher = if is_regex {
        Matcher::new_regex(compile_regex(postag, true, true)?, negate, true)
    } else {
        Matcher::new_string(either::Left(postag.trim().to_string()), negate, true, true)
    };

    Ok(PosMatcher::new(matcher))
}

/// Compiles the constraints on one token. `position` is the 1-based number of the element,
/// back-references must point to an element before it.
fn compile_token(token: &TokenSpec, case_sensitive: bool, position: usize) -> Result<Atom, Error> {
    let mut atoms: Vec<Atom> = Vec::new();
    let case_sensitive = token.case_sensitive.unwrap_or(case_sensitive);

    let text_matcher = match (&token.text, token.back_reference) {
        (Some(_), Some(_)) => {
            return Err(Error::MalformedPattern(
                "token can not have both text and a back-reference".into(),
            ))
        }
        (None, Some(id)) => {
            if id == 0 || id >= position {
                return Err(Error::MalformedPattern(format!(
                    "element {} references element {}, which does not precede it",
                    position, id
                )));
            }
            Some(Matcher::new_string(
                either::Right(id),
                token.negate,
                case_sensitive,
                true,
            ))
        }
        (Some(text), None) if token.regexp => Some(Matcher::new_regex(
            compile_regex(text, case_sensitive, true)?,
            token.negate,
            true,
        )),
        (Some(text), None) => Some(Matcher::new_string(
            either::Left(text.trim().to_string()),
            token.negate,
            case_sensitive,
            true,
        )),
        (None, None) => None,
    };

    if let Some(matcher) = text_matcher {
        atoms.push(TextAtom::new(matcher).into());
    }

    let pos_matcher = token
        .postag
        .as_deref()
        .map(|postag| compile_pos_matcher(postag, token.postag_regexp, token.negate_pos))
        .transpose()?;

    let lemma_matcher = match &token.lemma {
        Some(lemma) if token.regexp => Some(Matcher::new_regex(
            compile_regex(lemma, case_sensitive, true)?,
            false,
            true,
        )),
        Some(lemma) => Some(Matcher::new_string(
            either::Left(lemma.trim().to_string()),
            false,
            case_sensitive,
            true,
        )),
        None => None,
    };

    if pos_matcher.is_some() || lemma_matcher.is_some() {
        atoms.push(WordDataAtom::new(WordDataMatcher::new(pos_matcher, lemma_matcher)).into());
    }

    if let Some(value) = token.space_before {
        atoms.push(SpaceBeforeAtom::new(value).into());
    }

    Ok(AndAtom::and(atoms))
}

fn compile_element(element: &ElementSpec, case_sensitive: bool, position: usize) -> Result<Part, Error> {
    let mut atoms = vec![compile_token(&element.token, case_sensitive, position)?];

    if !element.any_of.is_empty() {
        let alternatives = element
            .any_of
            .iter()
            .map(|x| compile_token(x, case_sensitive, position))
            .collect::<Result<Vec<_>, _>>()?;
        atoms.push(OrAtom::or(alternatives));
    }

    let mut atom = AndAtom::and(atoms);
    if element.negate_element {
        atom = NotAtom::not(atom);
    }

    let quantifier = Quantifier::new(element.min, element.max.unwrap_or(usize::MAX))?;

    let exceptions = element
        .exceptions
        .iter()
        .map(|x| -> Result<Exception, Error> {
            Ok(Exception::new(
                compile_token(&x.token, case_sensitive, position)?,
                x.scope,
                x.absent,
            ))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(Part::new(atom, quantifier, element.marker).with_exceptions(exceptions))
}

fn compile_composition(elements: &[ElementSpec], case_sensitive: bool) -> Result<Composition, Error> {
    let parts = elements
        .iter()
        .enumerate()
        .map(|(i, x)| compile_element(x, case_sensitive, i + 1))
        .collect::<Result<Vec<_>, _>>()?;

    Composition::new(parts)
}

fn compile_engine(
    pattern: &[ElementSpec],
    antipatterns: &[Vec<ElementSpec>],
    case_sensitive: bool,
) -> Result<Engine, Error> {
    let composition = compile_composition(pattern, case_sensitive)?;
    let antipatterns = antipatterns
        .iter()
        .map(|x| compile_composition(x, case_sensitive))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Engine::new(composition, antipatterns))
}

fn compile_synthesizer(spec: &SuggestionSpec, n_groups: usize) -> Result<Synthesizer, Error> {
    let parts = match spec {
        SuggestionSpec::Template(template) => return Synthesizer::parse(template, n_groups, true),
        SuggestionSpec::Parts(parts) => parts,
    };

    let parts = parts
        .iter()
        .map(|part| -> Result<SynthesizerPart, Error> {
            Ok(match part {
                SuggestionPartSpec::Text { text } => SynthesizerPart::Text(text.clone()),
                SuggestionPartSpec::Match {
                    id,
                    conversion,
                    postag,
                    regexp_match,
                    regexp_replace,
                } => {
                    if *id > n_groups {
                        return Err(Error::MalformedPattern(format!(
                            "suggestion references group {}, but the pattern has {} elements",
                            id, n_groups
                        )));
                    }

                    let mut m = Match::new(*id).with_conversion(*conversion);
                    if let Some(postag) = postag {
                        m = m.with_inflection(postag.as_str());
                    }

                    match (regexp_match, regexp_replace) {
                        (Some(regex), Some(replacement)) => {
                            m = m.with_regex_replacer(
                                compile_regex(regex, true, false)?,
                                replacement.clone(),
                            );
                        }
                        (None, None) => {}
                        _ => {
                            return Err(Error::MalformedPattern(
                                "regexp_match and regexp_replace must be given together".into(),
                            ))
                        }
                    }

                    SynthesizerPart::Match(m)
                }
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(Synthesizer::new(parts, true))
}

const MARKER_START: &str = "<marker>";
const MARKER_END: &str = "</marker>";

fn compile_example(spec: &ExampleSpec) -> Result<Example, Error> {
    let text = &spec.text;

    let marker = match (text.find(MARKER_START), text.find(MARKER_END)) {
        (Some(start), Some(end)) if start < end => Some((start, end)),
        (None, None) => None,
        _ => {
            return Err(Error::MalformedPattern(format!(
                "example {:?} has an unbalanced marker",
                text
            )))
        }
    };

    let (start, end) = match marker {
        Some(x) => x,
        None => {
            if spec.correction.is_some() {
                return Err(Error::MalformedPattern(format!(
                    "example {:?} has a correction but no marker",
                    text
                )));
            }
            return Ok(Example::new(text.clone(), None));
        }
    };

    let before = &text[..start];
    let marked = &text[start + MARKER_START.len()..end];
    let after = &text[end + MARKER_END.len()..];

    let char_start = before.chars().count();
    let char_end = char_start + marked.chars().count();

    let replacements = spec.correction.as_deref().map_or_else(Vec::new, |correction| {
        correction
            .split('|')
            .map(|x| {
                // title case if at start
                if char_start == 0 {
                    utils::apply_to_first(x, |c| c.to_uppercase().collect())
                } else {
                    x.to_string()
                }
            })
            .collect()
    });

    Ok(Example::new(
        format!("{}{}{}", before, marked, after),
        Some(Suggestion::new(
            "_Test",
            "_Test",
            (char_start, char_end),
            replacements,
        )),
    ))
}

impl TryFrom<RuleSpec> for Rule {
    type Error = Error;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        let id = RuleId::try_from(spec.id.as_str())?;
        let n_groups = spec.pattern.len();

        let engine = compile_engine(&spec.pattern, &spec.antipatterns, spec.case_sensitive)?;
        let message = Synthesizer::parse(&spec.message, n_groups, false)?;
        let suggesters = spec
            .suggestions
            .iter()
            .map(|x| compile_synthesizer(x, n_groups))
            .collect::<Result<Vec<_>, _>>()?;
        let examples = spec
            .examples
            .iter()
            .map(compile_example)
            .collect::<Result<Vec<_>, _>>()?;

        let mut rule = Rule::new(id, engine, message, suggesters)
            .with_find_all(spec.find_all)
            .with_examples(examples);

        if let Some(step_budget) = spec.step_budget {
            rule = rule.with_step_budget(step_budget);
        }

        Ok(rule)
    }
}

impl TryFrom<BitextRuleSpec> for BitextRule {
    type Error = Error;

    fn try_from(spec: BitextRuleSpec) -> Result<Self, Self::Error> {
        Ok(BitextRule::new(
            RuleId::try_from(spec.id.as_str())?,
            Rule::try_from(spec.source)?,
            Rule::try_from(spec.target)?,
            spec.policy,
        ))
    }
}

impl TryFrom<DisambiguationRuleSpec> for DisambiguationRule {
    type Error = Error;

    fn try_from(spec: DisambiguationRuleSpec) -> Result<Self, Self::Error> {
        let engine = compile_engine(&spec.pattern, &spec.antipatterns, spec.case_sensitive)?;

        let disambiguation = match spec.action {
            DisambiguationActionSpec::Filter { postag } => {
                Disambiguation::Filter(compile_pos_matcher(&postag, true, false)?)
            }
            DisambiguationActionSpec::Remove { postag } => {
                Disambiguation::Remove(compile_pos_matcher(&postag, true, false)?)
            }
            DisambiguationActionSpec::Replace { lemma, postag } => {
                Disambiguation::Replace(Reading::new(lemma, postag))
            }
            DisambiguationActionSpec::Add { lemma, postag } => {
                Disambiguation::Add(Reading::new(lemma, postag))
            }
        };

        Ok(DisambiguationRule::new(
            RuleId::try_from(spec.id.as_str())?,
            engine,
            disambiguation,
        ))
    }
}
