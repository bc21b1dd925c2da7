use crate::{types::Token, Error};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use unicase::UniCase;

pub use crate::utils::regex::SerializeRegex;

/// Index of a group in a [MatchGraph]. Group `0` is the whole match, group `i` is the i-th part.
pub type GraphId = usize;

#[derive(Debug, Serialize, Deserialize)]
pub struct Matcher {
    matcher: either::Either<either::Either<String, GraphId>, SerializeRegex>,
    negate: bool,
    case_sensitive: bool,
    empty_always_false: bool,
}

impl Matcher {
    pub fn new_regex(regex: SerializeRegex, negate: bool, empty_always_false: bool) -> Self {
        Matcher {
            matcher: either::Right(regex),
            negate,
            case_sensitive: true, // handled by regex
            empty_always_false,
        }
    }

    /// Compiles `pattern` into a matcher which must match the entire input.
    pub fn regex(pattern: &str, case_sensitive: bool, negate: bool) -> Result<Self, Error> {
        let regex = SerializeRegex::new(pattern, case_sensitive, true)
            .map_err(|e| Error::MalformedPattern(format!("invalid regex {:?}: {}", pattern, e)))?;

        Ok(Matcher::new_regex(regex, negate, true))
    }

    pub fn new_string(
        string_or_idx: either::Either<String, GraphId>,
        negate: bool,
        case_sensitive: bool,
        empty_always_false: bool,
    ) -> Self {
        Matcher {
            matcher: either::Left(string_or_idx),
            negate,
            case_sensitive,
            empty_always_false,
        }
    }

    /// The group this matcher compares against, if it is a back-reference.
    pub fn group_ref(&self) -> Option<GraphId> {
        match &self.matcher {
            either::Left(either::Right(id)) => Some(*id),
            _ => None,
        }
    }

    fn equals(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            UniCase::new(a) == UniCase::new(b)
        }
    }

    pub fn is_match(&self, input: &str, graph: &MatchGraph) -> bool {
        if input.is_empty() {
            return if self.empty_always_false {
                false
            } else {
                self.negate
            };
        }

        let matches = match &self.matcher {
            either::Left(string_or_idx) => match string_or_idx {
                either::Left(string) => self.equals(string, input),
                either::Right(id) => graph
                    .group_tokens(*id)
                    .and_then(|tokens| tokens.first())
                    .map_or(false, |token| self.equals(token.as_str(), input)),
            },
            either::Right(regex) => regex.is_match(input),
        };

        if self.negate {
            !matches
        } else {
            matches
        }
    }
}

/// Matches part-of-speech tags. A missing tag never matches, regardless of negation.
#[derive(Debug, Serialize, Deserialize)]
pub struct PosMatcher {
    matcher: Matcher,
}

impl PosMatcher {
    pub fn new(matcher: Matcher) -> Self {
        PosMatcher { matcher }
    }

    pub fn is_match(&self, tag: Option<&str>) -> bool {
        lazy_static::lazy_static! {
            static ref EMPTY_GRAPH: MatchGraph<'static> = MatchGraph::default();
        }

        tag.map_or(false, |tag| self.matcher.is_match(tag, &EMPTY_GRAPH))
    }
}

/// Matches the readings of a token. Lemma and tag constraints must hold for the same reading,
/// and it is enough if *any* reading satisfies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct WordDataMatcher {
    pos_matcher: Option<PosMatcher>,
    lemma_matcher: Option<Matcher>,
}

impl WordDataMatcher {
    pub fn new(pos_matcher: Option<PosMatcher>, lemma_matcher: Option<Matcher>) -> Self {
        WordDataMatcher {
            pos_matcher,
            lemma_matcher,
        }
    }

    pub fn is_match(&self, token: &Token, graph: &MatchGraph) -> bool {
        token.readings().iter().any(|reading| {
            // matching the tag is cheaper, check it first and exit early if it doesn't match
            let pos_matches = self
                .pos_matcher
                .as_ref()
                .map_or(true, |m| m.is_match(reading.tag()));

            if !pos_matches {
                return false;
            }

            self.lemma_matcher
                .as_ref()
                .map_or(true, |m| m.is_match(reading.lemma(), graph))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantifier {
    pub min: usize,
    pub max: usize,
}

impl Quantifier {
    pub fn new(min: usize, max: usize) -> Result<Self, Error> {
        if max < min {
            return Err(Error::MalformedPattern(format!(
                "quantifier minimum {} is larger than maximum {}",
                min, max
            )));
        }
        if max == 0 {
            return Err(Error::MalformedPattern(
                "quantifier maximum must be at least one".into(),
            ));
        }

        Ok(Quantifier { min, max })
    }

    /// Matches exactly once.
    pub fn once() -> Self {
        Quantifier { min: 1, max: 1 }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max == usize::MAX
    }
}

impl Default for Quantifier {
    fn default() -> Self {
        Quantifier::once()
    }
}

#[enum_dispatch]
pub trait Atomable: Send + Sync {
    fn is_match(&self, input: &[&Token], graph: &MatchGraph, position: usize) -> bool;
}

#[enum_dispatch(Atomable)]
#[derive(Debug, Serialize, Deserialize)]
pub enum Atom {
    SpaceBeforeAtom(concrete::SpaceBeforeAtom),
    TextAtom(concrete::TextAtom),
    WordDataAtom(concrete::WordDataAtom),
    TrueAtom,
    FalseAtom,
    AndAtom,
    OrAtom,
    NotAtom,
}

pub mod concrete {
    use super::{Atomable, MatchGraph, Matcher, Token, WordDataMatcher};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TextAtom {
        matcher: Matcher,
    }

    impl Atomable for TextAtom {
        fn is_match(&self, input: &[&Token], graph: &MatchGraph, position: usize) -> bool {
            self.matcher.is_match(input[position].as_str(), graph)
        }
    }

    impl TextAtom {
        pub fn new(matcher: Matcher) -> Self {
            TextAtom { matcher }
        }

        pub fn matcher(&self) -> &Matcher {
            &self.matcher
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SpaceBeforeAtom {
        value: bool,
    }

    impl Atomable for SpaceBeforeAtom {
        fn is_match(&self, input: &[&Token], _graph: &MatchGraph, position: usize) -> bool {
            input[position].has_space_before() == self.value
        }
    }

    impl SpaceBeforeAtom {
        pub fn new(value: bool) -> Self {
            SpaceBeforeAtom { value }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WordDataAtom {
        matcher: WordDataMatcher,
    }

    impl Atomable for WordDataAtom {
        fn is_match(&self, input: &[&Token], graph: &MatchGraph, position: usize) -> bool {
            self.matcher.is_match(input[position], graph)
        }
    }

    impl WordDataAtom {
        pub fn new(matcher: WordDataMatcher) -> Self {
            WordDataAtom { matcher }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct TrueAtom {}

impl Atomable for TrueAtom {
    fn is_match(&self, _input: &[&Token], _graph: &MatchGraph, _position: usize) -> bool {
        true
    }
}

impl TrueAtom {
    pub fn new() -> Self {
        TrueAtom {}
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct FalseAtom {}

impl Atomable for FalseAtom {
    fn is_match(&self, _input: &[&Token], _graph: &MatchGraph, _position: usize) -> bool {
        false
    }
}

impl FalseAtom {
    pub fn new() -> Self {
        FalseAtom {}
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AndAtom {
    atoms: Vec<Atom>,
}

impl AndAtom {
    pub fn and(atoms: Vec<Atom>) -> Atom {
        let mut atoms: Vec<_> = atoms
            .into_iter()
            .filter(|x| !matches!(x, Atom::TrueAtom { .. }))
            .collect();

        if atoms.is_empty() {
            (TrueAtom {}).into()
        } else if atoms.len() == 1 {
            atoms.remove(0)
        } else {
            (AndAtom { atoms }).into()
        }
    }
}

impl Atomable for AndAtom {
    fn is_match(&self, input: &[&Token], graph: &MatchGraph, position: usize) -> bool {
        self.atoms
            .iter()
            .all(|x| x.is_match(input, graph, position))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrAtom {
    atoms: Vec<Atom>,
}

impl OrAtom {
    pub fn or(atoms: Vec<Atom>) -> Atom {
        let mut atoms: Vec<_> = atoms
            .into_iter()
            .filter(|x| !matches!(x, Atom::FalseAtom { .. }))
            .collect();

        if atoms.is_empty() {
            (FalseAtom {}).into()
        } else if atoms.len() == 1 {
            atoms.remove(0)
        } else {
            (OrAtom { atoms }).into()
        }
    }
}

impl Atomable for OrAtom {
    fn is_match(&self, input: &[&Token], graph: &MatchGraph, position: usize) -> bool {
        self.atoms
            .iter()
            .any(|x| x.is_match(input, graph, position))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotAtom {
    atom: Box<Atom>,
}

impl NotAtom {
    pub fn not(atom: Atom) -> Atom {
        match atom {
            Atom::TrueAtom { .. } => FalseAtom::new().into(),
            Atom::FalseAtom { .. } => TrueAtom::new().into(),
            x => (NotAtom { atom: Box::new(x) }).into(),
        }
    }
}

impl Atomable for NotAtom {
    fn is_match(&self, input: &[&Token], graph: &MatchGraph, position: usize) -> bool {
        !self.atom.is_match(input, graph, position)
    }
}

/// Where an [Exception] looks relative to the token the element matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionScope {
    Current,
    /// Any of the `n` preceding tokens.
    Previous(usize),
    /// Any of the `n` following tokens.
    Next(usize),
}

impl Default for ExceptionScope {
    fn default() -> Self {
        ExceptionScope::Current
    }
}

/// Vetoes an otherwise successful element match.
/// A negated exception fires when its atom does *not* match anywhere in its scope.
#[derive(Debug, Serialize, Deserialize)]
pub struct Exception {
    atom: Atom,
    scope: ExceptionScope,
    negate: bool,
}

impl Exception {
    pub fn new(atom: Atom, scope: ExceptionScope, negate: bool) -> Self {
        Exception {
            atom,
            scope,
            negate,
        }
    }

    pub fn is_match(&self, input: &[&Token], graph: &MatchGraph, position: usize) -> bool {
        let mut window = match self.scope {
            ExceptionScope::Current => position..position + 1,
            ExceptionScope::Previous(n) => position.saturating_sub(n)..position,
            ExceptionScope::Next(n) => position + 1..(position + 1 + n).min(input.len()),
        };

        let found = window.any(|i| self.atom.is_match(input, graph, i));
        found != self.negate
    }
}

/// A range of (whitespace-filtered) token indices.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Group {
    pub span: Range<usize>,
}

impl Group {
    pub fn new(span: Range<usize>) -> Self {
        Group { span }
    }

    pub fn is_empty(&self) -> bool {
        self.span.start >= self.span.end
    }

    pub fn tokens<'t>(&self, tokens: &'t [&'t Token]) -> &'t [&'t Token] {
        &tokens[self.span.clone()]
    }
}

/// The groups consumed by each part of a composition, in filtered token coordinates.
#[derive(Debug, Default)]
pub struct MatchGraph<'t> {
    groups: Vec<Group>,
    tokens: &'t [&'t Token],
}

impl<'t> MatchGraph<'t> {
    pub fn new(groups: Vec<Group>, tokens: &'t [&'t Token]) -> Self {
        MatchGraph { groups, tokens }
    }

    pub fn by_id(&self, id: GraphId) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn group_tokens(&self, id: GraphId) -> Option<&'t [&'t Token]> {
        self.by_id(id).map(|group| group.tokens(self.tokens))
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups[..]
    }

    pub fn tokens(&self) -> &'t [&'t Token] {
        self.tokens
    }

    /// The range of tokens consumed by the entire match.
    pub fn span(&self) -> Range<usize> {
        self.groups[0].span.clone()
    }
}

/// One element of a pattern.
#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    pub atom: Atom,
    pub quantifier: Quantifier,
    pub exceptions: Vec<Exception>,
    /// Whether this part is inside the reported span.
    pub marker: bool,
}

impl Part {
    pub fn new(atom: Atom, quantifier: Quantifier, marker: bool) -> Self {
        Part {
            atom,
            quantifier,
            exceptions: Vec::new(),
            marker,
        }
    }

    pub fn with_exceptions(mut self, exceptions: Vec<Exception>) -> Self {
        self.exceptions = exceptions;
        self
    }

    pub fn is_match(&self, input: &[&Token], graph: &MatchGraph, position: usize) -> bool {
        self.atom.is_match(input, graph, position)
            && !self
                .exceptions
                .iter()
                .any(|x| x.is_match(input, graph, position))
    }
}

/// Returned when matching takes more steps than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetExceeded;

/// Bounds the work done matching one rule against one sentence.
#[derive(Debug)]
pub struct StepBudget {
    limit: usize,
    used: usize,
}

impl StepBudget {
    pub fn new(limit: usize) -> Self {
        StepBudget { limit, used: 0 }
    }

    #[inline]
    pub fn step(&mut self) -> Result<(), BudgetExceeded> {
        self.used += 1;
        if self.used > self.limit {
            Err(BudgetExceeded)
        } else {
            Ok(())
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Backtracking frame: the part with this frame's stack depth starts at `start` and consumes `count` tokens.
#[derive(Debug, Clone, Copy)]
struct Frame {
    start: usize,
    count: usize,
}

impl Frame {
    fn end(&self) -> usize {
        self.start + self.count
    }
}

/// An ordered sequence of parts which is matched against a token sequence.
#[derive(Debug, Serialize, Deserialize)]
pub struct Composition {
    parts: Vec<Part>,
}

impl Composition {
    pub fn new(parts: Vec<Part>) -> Result<Self, Error> {
        if parts.is_empty() {
            return Err(Error::MalformedPattern(
                "pattern must have at least one element".into(),
            ));
        }

        if parts.iter().all(|x| x.quantifier.min == 0) {
            return Err(Error::MalformedPattern(
                "pattern can match the empty sequence: every element is optional".into(),
            ));
        }

        Ok(Composition { parts })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Number of tokens part `index` matches in a row starting at `position`, at most its maximum.
    fn greedy_run(
        &self,
        index: usize,
        tokens: &[&Token],
        graph: &MatchGraph,
        position: usize,
        budget: &mut StepBudget,
    ) -> Result<usize, BudgetExceeded> {
        let part = &self.parts[index];
        let mut count = 0;

        while count < part.quantifier.max && position + count < tokens.len() {
            budget.step()?;
            if !part.is_match(tokens, graph, position + count) {
                break;
            }
            count += 1;
        }

        Ok(count)
    }

    /// Tries to match the composition starting exactly at token `start`.
    ///
    /// Quantified parts first consume as many tokens as they can, then give them back one at a
    /// time whenever the remainder of the pattern fails. The first complete match found this
    /// way is returned.
    pub fn apply<'t>(
        &self,
        tokens: &'t [&'t Token],
        start: usize,
        budget: &mut StepBudget,
    ) -> Result<Option<MatchGraph<'t>>, BudgetExceeded> {
        let n = self.parts.len();
        let mut graph = MatchGraph::new(vec![Group::new(start..start); n + 1], tokens);
        let mut frames: Vec<Frame> = Vec::with_capacity(n);

        let mut position = start;

        loop {
            budget.step()?;

            let index = frames.len();
            if index == n {
                break;
            }

            let run = self.greedy_run(index, tokens, &graph, position, budget)?;

            if run >= self.parts[index].quantifier.min {
                let frame = Frame {
                    start: position,
                    count: run,
                };
                graph.groups[index + 1] = Group::new(frame.start..frame.end());
                position = frame.end();
                frames.push(frame);
                continue;
            }

            // give back one repetition of the innermost part which still can
            loop {
                let depth = frames.len();
                let frame = match frames.last_mut() {
                    Some(frame) => frame,
                    None => return Ok(None),
                };

                if frame.count > self.parts[depth - 1].quantifier.min {
                    frame.count -= 1;
                    graph.groups[depth] = Group::new(frame.start..frame.end());
                    position = frame.end();
                    break;
                }

                graph.groups[depth] = Group::new(frame.start..frame.start);
                frames.pop();
            }
        }

        let end = frames.last().map_or(start, Frame::end);
        if end == start {
            return Ok(None);
        }

        graph.groups[0] = Group::new(start..end);
        Ok(Some(graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reading;

    fn tagged(tags: &[&str]) -> Vec<Token> {
        let mut tokens = vec![Token::sent_start(0)];
        for (i, tag) in tags.iter().enumerate() {
            tokens.push(Token::new(
                format!("w{}", i),
                i * 3,
                vec![Reading::new(format!("w{}", i), *tag)],
            ));
        }
        tokens
    }

    fn pos(regex: &str) -> Atom {
        concrete::WordDataAtom::new(WordDataMatcher::new(
            Some(PosMatcher::new(Matcher::new_regex(
                SerializeRegex::new(regex, true, true).unwrap(),
                false,
                true,
            ))),
            None,
        ))
        .into()
    }

    fn text(string: &str) -> Atom {
        concrete::TextAtom::new(Matcher::new_string(
            either::Left(string.into()),
            false,
            true,
            true,
        ))
        .into()
    }

    fn part(atom: Atom, min: usize, max: usize) -> Part {
        Part::new(atom, Quantifier::new(min, max).unwrap(), false)
    }

    fn spans(graph: &MatchGraph) -> Vec<Range<usize>> {
        graph.groups().iter().map(|x| x.span.clone()).collect()
    }

    #[test]
    fn greedy_quantifier_takes_everything() {
        let tokens = tagged(&["N", "N", "N", "Adj"]);
        let refs: Vec<&Token> = tokens.iter().collect();
        let composition =
            Composition::new(vec![part(pos("N"), 1, 3), part(pos("Adj"), 1, 1)]).unwrap();

        let graph = composition
            .apply(&refs, 1, &mut StepBudget::new(1000))
            .unwrap()
            .unwrap();

        assert_eq!(spans(&graph), vec![1..5, 1..4, 4..5]);
    }

    #[test]
    fn quantifier_gives_back_repetitions() {
        let tokens = tagged(&["N", "N", "N"]);
        let refs: Vec<&Token> = tokens.iter().collect();
        let composition =
            Composition::new(vec![part(pos("N"), 1, 3), part(pos("N"), 1, 1)]).unwrap();

        let graph = composition
            .apply(&refs, 1, &mut StepBudget::new(1000))
            .unwrap()
            .unwrap();

        assert_eq!(spans(&graph), vec![1..4, 1..3, 3..4]);
    }

    #[test]
    fn backtracking_reaches_earlier_parts() {
        // the first part must give back a token so that the optional part stays empty
        // and the last part can match
        let tokens = tagged(&["N", "N", "V"]);
        let refs: Vec<&Token> = tokens.iter().collect();
        let composition = Composition::new(vec![
            part(pos("N|V"), 1, usize::MAX),
            part(pos("X"), 0, 2),
            part(pos("N|V"), 1, 1),
        ])
        .unwrap();

        let graph = composition
            .apply(&refs, 1, &mut StepBudget::new(1000))
            .unwrap()
            .unwrap();

        assert_eq!(spans(&graph), vec![1..4, 1..3, 3..3, 3..4]);
    }

    #[test]
    fn failing_non_quantified_part_fails_attempt() {
        let tokens = tagged(&["N", "V"]);
        let refs: Vec<&Token> = tokens.iter().collect();
        let composition =
            Composition::new(vec![part(pos("N"), 1, 1), part(pos("Adj"), 1, 1)]).unwrap();

        assert!(composition
            .apply(&refs, 1, &mut StepBudget::new(1000))
            .unwrap()
            .is_none());
    }

    #[test]
    fn pos_matching_is_disjunctive_over_readings() {
        let tokens = vec![Token::new(
            "run",
            0,
            vec![Reading::new("run", "VB"), Reading::new("run", "NN")],
        )];
        let refs: Vec<&Token> = tokens.iter().collect();
        let graph = MatchGraph::default();

        assert!(pos("NN").is_match(&refs, &graph, 0));
        assert!(NotAtom::not(pos("JJ")).is_match(&refs, &graph, 0));
        assert!(!NotAtom::not(pos("VB")).is_match(&refs, &graph, 0));
    }

    #[test]
    fn exception_vetoes_like_a_non_match() {
        let tokens: Vec<Token> = ["a", ")", "b"]
            .iter()
            .enumerate()
            .map(|(i, x)| Token::new(*x, i * 2, vec![]))
            .collect();
        let refs: Vec<&Token> = tokens.iter().collect();

        let composition = Composition::new(vec![Part::new(text(")"), Quantifier::once(), true)
            .with_exceptions(vec![Exception::new(
                text("("),
                ExceptionScope::Previous(5),
                true,
            )])])
        .unwrap();

        assert!(composition
            .apply(&refs, 1, &mut StepBudget::new(100))
            .unwrap()
            .is_none());
    }

    #[test]
    fn back_reference_compares_group_text() {
        let tokens: Vec<Token> = ["the", "The", "cat"]
            .iter()
            .enumerate()
            .map(|(i, x)| Token::new(*x, i * 4, vec![]))
            .collect();
        let refs: Vec<&Token> = tokens.iter().collect();

        let repeat = |case_sensitive| {
            concrete::TextAtom::new(Matcher::new_string(
                either::Right(1),
                false,
                case_sensitive,
                true,
            ))
        };

        let insensitive =
            Composition::new(vec![part(TrueAtom::new().into(), 1, 1), part(repeat(false).into(), 1, 1)])
                .unwrap();
        let sensitive =
            Composition::new(vec![part(TrueAtom::new().into(), 1, 1), part(repeat(true).into(), 1, 1)])
                .unwrap();

        assert!(insensitive
            .apply(&refs, 0, &mut StepBudget::new(100))
            .unwrap()
            .is_some());
        assert!(sensitive
            .apply(&refs, 0, &mut StepBudget::new(100))
            .unwrap()
            .is_none());
    }

    #[test]
    fn budget_stops_runaway_backtracking() {
        let tokens = tagged(&["N"; 30]);
        let refs: Vec<&Token> = tokens.iter().collect();

        let mut parts: Vec<_> = (0..8).map(|_| part(pos("N"), 0, 20)).collect();
        parts.push(part(pos("Adj"), 1, 1));
        let composition = Composition::new(parts).unwrap();

        assert_eq!(
            composition
                .apply(&refs, 1, &mut StepBudget::new(10_000))
                .unwrap_err(),
            BudgetExceeded
        );
    }

    #[test]
    fn invalid_compositions_are_rejected() {
        assert!(matches!(
            Composition::new(Vec::new()),
            Err(Error::MalformedPattern(_))
        ));
        assert!(matches!(
            Composition::new(vec![part(pos("N"), 0, 1)]),
            Err(Error::MalformedPattern(_))
        ));
        assert!(matches!(
            Quantifier::new(3, 1),
            Err(Error::MalformedPattern(_))
        ));
    }
}
