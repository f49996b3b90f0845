//! Element locators and the element data backends report for them

use std::fmt;

use serde::{Deserialize, Serialize};

/// How to find elements on the page.
///
/// The string form follows the usual automation convention: `text=Foo`
/// matches the innermost elements whose text contains `Foo` (case
/// insensitive, whitespace collapsed); anything else is a CSS selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Locator {
    Css(String),
    Text(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn text(needle: impl Into<String>) -> Self {
        Locator::Text(needle.into())
    }

    pub fn parse(s: &str) -> Self {
        match s.strip_prefix("text=") {
            Some(needle) => Locator::Text(needle.to_string()),
            None => Locator::Css(s.to_string()),
        }
    }

    /// Whether `text` would satisfy a text locator for `needle`.
    pub fn text_matches(needle: &str, text: &str) -> bool {
        normalize_text(text)
            .to_lowercase()
            .contains(&normalize_text(needle).to_lowercase())
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Locator::parse(&s)
    }
}

impl From<Locator> for String {
    fn from(l: Locator) -> Self {
        l.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(sel) => write!(f, "{}", sel),
            Locator::Text(needle) => write!(f, "text={}", needle),
        }
    }
}

/// What a backend knows about one matched element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Rendered text content, whitespace collapsed
    pub text: String,
    pub visible: bool,
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
