//! Provides structures to identify rules and a [Selector] to match on them.
//!
//! Rules are identified as `CATEGORY/NAME`, for example `GRAMMAR/HAS_BEEN`.
//! All comparisons are case-insensitive.

use serde::{Deserialize, Serialize};
use std::{
    convert::TryFrom,
    fmt,
    hash::{Hash, Hasher},
};
use unicase::UniCase;

#[derive(Debug, Clone, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error("error parsing id from string: {0:?}")]
    ParseStringError(String),
}

/// Identifies a category.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialOrd, Ord)]
pub struct Category(String);

impl Eq for Category {}
impl PartialEq<Category> for Category {
    fn eq(&self, other: &Category) -> bool {
        UniCase::new(&self.0) == UniCase::new(&other.0)
    }
}

impl Hash for Category {
    fn hash<H: Hasher>(&self, state: &mut H) {
        UniCase::new(&self.0).hash(state)
    }
}

/// Identifies a rule inside a category.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct RuleId {
    parent: Category,
    name: String,
}

impl Eq for RuleId {}
impl PartialEq<RuleId> for RuleId {
    fn eq(&self, other: &RuleId) -> bool {
        self.parent.eq(&other.parent) && UniCase::new(&self.name) == UniCase::new(&other.name)
    }
}

impl Hash for RuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parent.hash(state);
        UniCase::new(&self.name).hash(state);
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent, self.name)
    }
}

impl Category {
    /// Creates a new category identifier.
    pub fn new<S: Into<String>>(category: S) -> Self {
        Category(category.into())
    }

    /// Creates a rule identifier by joining the category with a name.
    pub fn join<S: Into<String>>(&self, name: S) -> RuleId {
        RuleId {
            name: name.into(),
            parent: self.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RuleId {
    /// Gets the parent category of this rule.
    pub fn parent(&self) -> &Category {
        &self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn non_empty(part: &str, value: &str) -> Result<(), Error> {
    if part.is_empty() {
        Err(Error::ParseStringError(value.to_owned()))
    } else {
        Ok(())
    }
}

impl TryFrom<&str> for RuleId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.split('/').collect::<Vec<_>>().as_slice() {
            [category, name] => {
                non_empty(category, value)?;
                non_empty(name, value)?;
                Ok(Category::new(*category).join(*name))
            }
            _ => Err(Error::ParseStringError(value.to_owned())),
        }
    }
}

impl TryFrom<String> for RuleId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RuleId::try_from(value.as_str())
    }
}

impl From<RuleId> for String {
    fn from(id: RuleId) -> Self {
        id.to_string()
    }
}

/// A *selector* to filter rules by checking if a [RuleId] matches the selector.
/// Can be created from a [Category] or [RuleId] by casting with `.into()`.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub enum Selector {
    /// A category-level selector.
    Category(Category),
    /// A rule-level selector.
    Rule(RuleId),
}

impl From<Category> for Selector {
    fn from(category: Category) -> Self {
        Selector::Category(category)
    }
}

impl From<RuleId> for Selector {
    fn from(id: RuleId) -> Self {
        Selector::Rule(id)
    }
}

impl TryFrom<&str> for Selector {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.contains('/') {
            Ok(Selector::Rule(RuleId::try_from(value)?))
        } else {
            non_empty(value, value)?;
            Ok(Selector::Category(Category::new(value)))
        }
    }
}

impl TryFrom<String> for Selector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Selector::try_from(value.as_str())
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        match &selector {
            Selector::Category(x) => format!("{}", x),
            Selector::Rule(x) => format!("{}", x),
        }
    }
}

impl Selector {
    /// Determines whether a [RuleId] matches this selector. It maches iff:
    /// 1. the category is the same (if this selector is at category-level)
    /// 2. the whole id is the same (if this selector is at rule-level)
    pub fn is_match(&self, id: &RuleId) -> bool {
        match &self {
            Selector::Category(category) => id.parent() == category,
            Selector::Rule(rule) => id == rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_case_insensitively() {
        let id = RuleId::try_from("Grammar/HAS_BEEN").unwrap();

        assert!(Selector::try_from("grammar").unwrap().is_match(&id));
        assert!(Selector::try_from("GRAMMAR/has_been").unwrap().is_match(&id));
        assert!(!Selector::try_from("GRAMMAR/OTHER").unwrap().is_match(&id));
        assert!(!Selector::try_from("STYLE").unwrap().is_match(&id));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(RuleId::try_from("NO_CATEGORY").is_err());
        assert!(RuleId::try_from("A/B/C").is_err());
        assert!(RuleId::try_from("/B").is_err());
        assert!(Selector::try_from("").is_err());
    }

    #[test]
    fn selector_serializes_as_string() {
        let selector: Selector = Category::new("TYPOS").join("REPEAT").into();
        let json = serde_json::to_string(&selector).unwrap();

        assert_eq!(json, "\"TYPOS/REPEAT\"");
        assert_eq!(serde_json::from_str::<Selector>(&json).unwrap(), selector);
    }
}
