//! DOM expectations checked against a rendered page

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::locator::{ElementInfo, Locator};

/// A presence or text assertion about the rendered DOM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Expectation {
    /// The first matching element contains `text`
    ContainsText { locator: Locator, text: String },
    /// At least one matching element is visible
    Visible { locator: Locator },
    /// At least `min` elements match
    MinCount { locator: Locator, min: usize },
}

impl Expectation {
    pub fn contains_text(locator: &str, text: impl Into<String>) -> Self {
        Expectation::ContainsText { locator: Locator::parse(locator), text: text.into() }
    }

    pub fn visible(locator: &str) -> Self {
        Expectation::Visible { locator: Locator::parse(locator) }
    }

    pub fn min_count(locator: &str, min: usize) -> Self {
        Expectation::MinCount { locator: Locator::parse(locator), min }
    }

    pub fn locator(&self) -> &Locator {
        match self {
            Expectation::ContainsText { locator, .. }
            | Expectation::Visible { locator }
            | Expectation::MinCount { locator, .. } => locator,
        }
    }

    /// Check the expectation against the elements the locator matched.
    /// The error string describes what was observed instead.
    pub fn check(&self, found: &[ElementInfo]) -> Result<(), String> {
        match self {
            Expectation::ContainsText { locator, text } => match found.first() {
                None => Err(format!("no element matches '{}'", locator)),
                Some(el) if Locator::text_matches(text, &el.text) => Ok(()),
                Some(el) => Err(format!(
                    "'{}' has text '{}', expected it to contain '{}'",
                    locator, el.text, text
                )),
            },
            Expectation::Visible { locator } => {
                if found.iter().any(|el| el.visible) {
                    Ok(())
                } else if found.is_empty() {
                    Err(format!("no element matches '{}'", locator))
                } else {
                    Err(format!("{} element(s) match '{}' but none is visible", found.len(), locator))
                }
            }
            Expectation::MinCount { locator, min } => {
                if found.len() >= *min {
                    Ok(())
                } else {
                    Err(format!("expected at least {} element(s) matching '{}', found {}", min, locator, found.len()))
                }
            }
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::ContainsText { locator, text } => write!(f, "{} contains '{}'", locator, text),
            Expectation::Visible { locator } => write!(f, "{} visible", locator),
            Expectation::MinCount { locator, min } => write!(f, "{} count >= {}", locator, min),
        }
    }
}
