use serde::{Deserialize, Serialize};

use crate::rule::{
    bitext::BitextPolicy, document::DocumentRule, engine::composition::ExceptionScope,
    grammar::Conversion, SameTranslationRule,
};

/// Constraints on a single token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSpec {
    /// The token text. Compared as a literal unless `regexp` is set.
    pub text: Option<String>,
    /// The token text must equal the text of the element with this (1-based) number.
    pub back_reference: Option<usize>,
    /// Whether `text` and `lemma` are regular expressions.
    #[serde(default)]
    pub regexp: bool,
    #[serde(default)]
    pub negate: bool,
    /// Overrides the case sensitivity of the rule.
    pub case_sensitive: Option<bool>,
    pub postag: Option<String>,
    #[serde(default)]
    pub postag_regexp: bool,
    #[serde(default)]
    pub negate_pos: bool,
    /// Must hold for the same reading as `postag`.
    pub lemma: Option<String>,
    pub space_before: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionSpec {
    #[serde(flatten)]
    pub token: TokenSpec,
    #[serde(default)]
    pub scope: ExceptionScope,
    /// The exception fires if the token is *not* found in its scope.
    #[serde(default)]
    pub absent: bool,
}

fn one() -> usize {
    1
}

fn one_max() -> Option<usize> {
    Some(1)
}

/// One element of a pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSpec {
    #[serde(flatten)]
    pub token: TokenSpec,
    /// Alternatives, at least one of which must match in addition to `token`.
    #[serde(default)]
    pub any_of: Vec<TokenSpec>,
    /// Inverts the whole element.
    #[serde(default)]
    pub negate_element: bool,
    #[serde(default = "one")]
    pub min: usize,
    /// `null` means unbounded.
    #[serde(default = "one_max")]
    pub max: Option<usize>,
    #[serde(default)]
    pub marker: bool,
    #[serde(default)]
    pub exceptions: Vec<ExceptionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestionPartSpec {
    Match {
        #[serde(rename = "match")]
        id: usize,
        #[serde(default)]
        conversion: Conversion,
        /// Inflect the referenced tokens to this tag.
        postag: Option<String>,
        regexp_match: Option<String>,
        regexp_replace: Option<String>,
    },
    Text {
        text: String,
    },
}

/// A suggestion template: a string with `\N`, `{N}` and `{N:TAG}` references or a list of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestionSpec {
    Template(String),
    Parts(Vec<SuggestionPartSpec>),
}

/// An example text. The expected span is enclosed in `<marker>` and `</marker>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleSpec {
    pub text: String,
    /// Expected replacements separated by `|`.
    pub correction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub message: String,
    pub pattern: Vec<ElementSpec>,
    #[serde(default)]
    pub antipatterns: Vec<Vec<ElementSpec>>,
    #[serde(default)]
    pub suggestions: Vec<SuggestionSpec>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub find_all: bool,
    pub step_budget: Option<usize>,
    #[serde(default)]
    pub examples: Vec<ExampleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitextRuleSpec {
    pub id: String,
    pub source: RuleSpec,
    pub target: RuleSpec,
    #[serde(default)]
    pub policy: BitextPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisambiguationActionSpec {
    /// `postag` is a regular expression.
    Filter { postag: String },
    /// `postag` is a regular expression.
    Remove { postag: String },
    Replace {
        #[serde(default)]
        lemma: String,
        postag: String,
    },
    Add {
        #[serde(default)]
        lemma: String,
        postag: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationRuleSpec {
    pub id: String,
    pub pattern: Vec<ElementSpec>,
    #[serde(default)]
    pub antipatterns: Vec<Vec<ElementSpec>>,
    #[serde(default)]
    pub case_sensitive: bool,
    pub action: DisambiguationActionSpec,
}

/// All rules of a rule file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSetSpec {
    pub rules: Vec<RuleSpec>,
    pub bitext_rules: Vec<BitextRuleSpec>,
    pub same_translation_rules: Vec<SameTranslationRule>,
    pub document_rules: Vec<DocumentRule>,
}
