use lazy_static::lazy_static;
use onig::{Captures, Regex};

pub mod parallelism;
pub mod regex;

// see https://stackoverflow.com/questions/38406793/why-is-capitalizing-the-first-letter-of-a-string-so-convoluted-in-rust
pub fn apply_to_first<F>(string: &str, func: F) -> String
where
    F: Fn(char) -> String,
{
    let mut c = string.chars();
    match c.next() {
        None => String::new(),
        Some(first) => func(first) + c.as_str(),
    }
}

/// Whitespace as the tokenizer sees it: Unicode whitespace plus invisible formatting characters.
pub fn is_space(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '\u{115f}'
                | '\u{1160}'
                | '\u{200b}'..='\u{200f}'
                | '\u{202a}'..='\u{202e}'
                | '\u{2060}'..='\u{2063}'
                | '\u{206a}'..='\u{206f}'
                | '\u{3164}'
                | '\u{feff}'
                | '\u{ffa0}'
                | '\u{fff9}'..='\u{fffb}'
        )
}

pub fn starts_uppercase(string: &str) -> bool {
    string.chars().next().map_or(false, char::is_uppercase)
}

// see https://github.com/rust-onig/rust-onig/issues/59#issuecomment-340160520
pub fn dollar_replace(mut replacement: String, caps: &Captures) -> String {
    for i in 1..caps.len() {
        replacement = replacement.replace(&format!("${}", i), caps.at(i).unwrap_or(""));
    }
    replacement
}

// remove duplicate whitespaces
pub fn normalize_whitespace(string: &str) -> String {
    lazy_static! {
        static ref REGEX: Regex = Regex::new(r"(\s)\s+").expect("whitespace regex is valid");
    }

    REGEX.replace_all(string, |caps: &Captures| {
        caps.at(1).unwrap_or(" ").to_string()
    })
}

/// Lowercases and collapses whitespace so two texts can be compared loosely.
pub fn loose_key(string: &str) -> String {
    string
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(normalize_whitespace("a  b \t c"), "a b c");
    }

    #[test]
    fn first_char_conversion() {
        assert_eq!(apply_to_first("über", |c| c.to_uppercase().collect()), "Über");
        assert_eq!(apply_to_first("", |c| c.to_uppercase().collect()), "");
    }
}
