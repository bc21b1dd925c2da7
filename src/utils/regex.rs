use onig::{Regex, RegexOptions};
use serde::{Deserialize, Serialize, Serializer};
use std::ops::Deref;
use std::{
    convert::TryFrom,
    fmt,
    hash::{Hash, Hasher},
};

const CASE_INSENSITIVE_SUFFIX: &str = "(?i)";

impl TryFrom<String> for SerializeRegex {
    type Error = onig::Error;

    fn try_from(string: String) -> Result<Self, onig::Error> {
        Ok(SerializeRegex {
            regex: SerializeRegex::compile(&string)?,
            string,
        })
    }
}

/// A regex which serializes as the string it was compiled from.
/// Case-insensitivity is encoded as a trailing `(?i)`, which is stripped before compiling.
#[derive(Deserialize)]
#[serde(try_from = "String")]
pub struct SerializeRegex {
    pub(crate) string: String,
    pub(crate) regex: Regex,
}

impl Serialize for SerializeRegex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.string)
    }
}

impl Hash for SerializeRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.string.hash(state);
    }
}

impl PartialEq for SerializeRegex {
    fn eq(&self, other: &Self) -> bool {
        self.string == other.string
    }
}

impl fmt::Debug for SerializeRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.string)
    }
}

impl SerializeRegex {
    /// Compiles a regex. If `full_match` is set, the regex must match the entire input.
    pub fn new(pattern: &str, case_sensitive: bool, full_match: bool) -> Result<Self, onig::Error> {
        let mut string = if full_match {
            format!("^(?:{})$", pattern)
        } else {
            pattern.to_owned()
        };

        if !case_sensitive {
            string.push_str(CASE_INSENSITIVE_SUFFIX);
        }

        SerializeRegex::try_from(string)
    }

    fn compile(regex_str: &str) -> Result<Regex, onig::Error> {
        let mut case_sensitive = true;
        let regex_str = if let Some(stripped) = regex_str.strip_suffix(CASE_INSENSITIVE_SUFFIX) {
            case_sensitive = false;
            stripped
        } else {
            regex_str
        };

        Regex::with_options(
            regex_str,
            if case_sensitive {
                RegexOptions::REGEX_OPTION_NONE
            } else {
                RegexOptions::REGEX_OPTION_IGNORECASE
            },
            onig::Syntax::java(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }
}

impl Deref for SerializeRegex {
    type Target = Regex;

    fn deref(&self) -> &Self::Target {
        &self.regex
    }
}
