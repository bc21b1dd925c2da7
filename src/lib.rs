//! Rule-based proofreading through declarative token patterns.
//! # Overview
//!
//! nlpattern has the following core abstractions:
//! - An [AnalyzedSentence][types::AnalyzedSentence]: tokens with ambiguous readings (lemma and part-of-speech tag),
//!   whitespace included, plus a cached whitespace-filtered view in which all matching happens.
//! - A [Rule][rule::Rule]: an ordered sequence of token constraints with quantifiers and exceptions,
//!   a message and suggestion templates. Matching is greedy with backtracking and bounded by a step budget.
//! - A [Rules][rules::Rules] structure containing a set of rules which can be applied to a text.
//! - A [BitextRule][rule::bitext::BitextRule] checking a source sentence and its translation jointly.
//!
//! A small [Tokenizer][tokenizer::Tokenizer] and [ManualTagger][tokenizer::ManualTagger] are included
//! to turn text into analyzed sentences.
//!
//! # Examples
//!
//! ```
//! use nlpattern::{compile::RuleSpec, rules::Rules, tokenizer::{ManualTagger, Tokenizer}};
//!
//! let tagger = ManualTagger::from_lines("has\thave\tVBZ\nhave\thave\tVB\nbeen\tbe\tVBN".lines());
//! let tokenizer = Tokenizer::new(tagger);
//!
//! let spec: RuleSpec = serde_json::from_str(r#"{
//!     "id": "GRAMMAR/HAS_BEEN",
//!     "message": "Did you mean {1:VB}?",
//!     "pattern": [
//!         { "text": "has", "marker": true },
//!         { "text": "been" }
//!     ],
//!     "suggestions": ["{1:VB}"]
//! }"#)?;
//!
//! let rules = Rules::from_specs(vec![spec], Default::default())?;
//! let suggestions = rules.suggest("They has been here.", &tokenizer);
//!
//! assert_eq!(suggestions[0].start, 5);
//! assert_eq!(suggestions[0].end, 8);
//! assert_eq!(suggestions[0].replacements, vec!["have"]);
//! # Ok::<(), nlpattern::Error>(())
//! ```

use std::io;

use thiserror::Error;

pub mod compile;
pub mod rule;
pub mod rules;
pub mod tokenizer;
pub mod types;
pub(crate) mod utils;

pub use rules::Rules;
pub use tokenizer::Tokenizer;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    /// (De)serialization error. Can have occured during deserialization or during serialization.
    #[error(transparent)]
    Serialization(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    IdError(#[from] rule::id::Error),
    /// A rule definition is invalid. Raised when compiling a rule, never while matching.
    #[error("malformed pattern: {0}")]
    MalformedPattern(String),
    /// Matching a rule against a sentence took more steps than allowed.
    #[error("pattern of rule {id} exceeded its budget of {budget} steps")]
    PatternTooComplex { id: String, budget: usize },
    /// An index into the whitespace-filtered tokens was out of range.
    #[error("index {index} is out of range for {len} tokens")]
    Index { index: usize, len: usize },
    #[error("Test failed. See logs for details.")]
    TestFailed,
}
