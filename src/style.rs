//! Design-token configuration for the external utility-CSS build.
//!
//! Nothing here generates CSS. [`StyleConfig`] is a typed, immutable
//! declaration of the tokens the dashboard relies on, rendered to the
//! `tailwind.config.js` module that the CSS toolchain loads at build time.
//!
//! The page under test assembles `span-N` class names at runtime, so the
//! purge step cannot discover them statically. They have to stay in the
//! safelist for every column count a grid template declares;
//! [`StyleConfig::missing_span_classes`] reports any that are absent.

use std::collections::HashSet;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::{Error, Result};

/// Spacing scale keyed by token name, in declaration order, values in pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpacingScale(Vec<(String, u32)>);

impl SpacingScale {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, px: u32) -> Self {
        self.0.push((key.into(), px));
        self
    }

    pub fn get(&self, key: &str) -> Option<u32> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, px)| *px)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, px)| (k.as_str(), *px))
    }
}

impl Serialize for SpacingScale {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, px) in &self.0 {
            map.serialize_entry(key, &format!("{}px", px))?;
        }
        map.end()
    }
}

/// A named `grid-template-columns` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridTemplate {
    /// `n` equal-width columns that may shrink to zero
    EqualColumns(u32),
    /// Any other template, passed through verbatim
    Raw(String),
}

impl GridTemplate {
    pub fn css(&self) -> String {
        match self {
            GridTemplate::EqualColumns(n) => format!("repeat({}, minmax(0, 1fr))", n),
            GridTemplate::Raw(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridTemplates(Vec<(String, GridTemplate)>);

impl GridTemplates {
    pub fn with(mut self, key: impl Into<String>, template: GridTemplate) -> Self {
        self.0.push((key.into(), template));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GridTemplate)> {
        self.0.iter().map(|(k, t)| (k.as_str(), t))
    }
}

impl Serialize for GridTemplates {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, template) in &self.0 {
            map.serialize_entry(key, &template.css())?;
        }
        map.end()
    }
}

/// Values under `theme.extend`; they extend the base scale rather than replace it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThemeExtension {
    pub spacing: SpacingScale,
    #[serde(rename = "gridTemplateColumns")]
    pub grid_template_columns: GridTemplates,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub extend: ThemeExtension,
}

/// The full style configuration handed to the CSS build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyleConfig {
    /// Globs of source files scanned for class-name usage
    pub content: Vec<String>,
    /// Class names that must survive purging
    pub safelist: Vec<String>,
    pub theme: Theme,
    /// Plugin module names, loaded with `require`
    pub plugins: Vec<String>,
}

#[derive(Serialize)]
struct DeclaredData<'a> {
    content: &'a [String],
    safelist: &'a [String],
    theme: &'a Theme,
}

impl StyleConfig {
    /// Tokens used by the tester demo dashboard.
    pub fn tester_demo() -> Self {
        let spacing = [
            ("1", 4),
            ("2", 8),
            ("3", 12),
            ("4", 16),
            ("5", 20),
            ("6", 24),
            ("8", 32),
            ("10", 40),
            ("12", 48),
            ("16", 64),
            ("20", 80),
            ("24", 96),
        ]
        .into_iter()
        .fold(SpacingScale::new(), |scale, (k, px)| scale.with(k, px));

        Self {
            content: vec![
                "./js/**/*.js".to_string(),
                "../lib/foundation_web/**/*.*ex".to_string(),
            ],
            safelist: span_classes(12),
            theme: Theme {
                extend: ThemeExtension {
                    spacing,
                    grid_template_columns: GridTemplates::default()
                        .with("12", GridTemplate::EqualColumns(12)),
                },
            },
            plugins: vec!["@tailwindcss/container-queries".to_string()],
        }
    }

    /// Span classes implied by the equal-column grid templates but absent
    /// from the safelist.
    pub fn missing_span_classes(&self) -> Vec<String> {
        let listed: HashSet<&str> = self.safelist.iter().map(String::as_str).collect();
        let widest = self
            .theme
            .extend
            .grid_template_columns
            .iter()
            .filter_map(|(_, t)| match t {
                GridTemplate::EqualColumns(n) => Some(*n),
                GridTemplate::Raw(_) => None,
            })
            .max()
            .unwrap_or(0);

        span_classes(widest)
            .into_iter()
            .filter(|c| !listed.contains(c.as_str()))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (key, px) in self.theme.extend.spacing.iter() {
            if !seen.insert(key) {
                return Err(Error::ConfigError(format!("duplicate spacing key '{}'", key)));
            }
            if px == 0 {
                return Err(Error::ConfigError(format!("spacing key '{}' has zero length", key)));
            }
        }

        let missing = self.missing_span_classes();
        if !missing.is_empty() {
            return Err(Error::ConfigError(format!(
                "safelist is missing dynamically assembled classes: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Data-only JSON form, plugins listed by module name.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize style config: {}", e)))
    }

    /// Render the CommonJS module consumed by the CSS toolchain.
    pub fn to_js_module(&self) -> Result<String> {
        let data = DeclaredData {
            content: &self.content,
            safelist: &self.safelist,
            theme: &self.theme,
        };
        let pretty = serde_json::to_string_pretty(&data)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize style config: {}", e)))?;
        let body = pretty
            .strip_suffix("\n}")
            .ok_or_else(|| Error::ConfigError("unexpected serializer output".into()))?;

        let plugins = if self.plugins.is_empty() {
            "[]".to_string()
        } else {
            let requires = self
                .plugins
                .iter()
                .map(|p| serde_json::to_string(p).map(|quoted| format!("    require({})", quoted)))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::ConfigError(format!("Failed to quote plugin name: {}", e)))?;
            format!("[\n{}\n  ]", requires.join(",\n"))
        };

        Ok(format!("module.exports = {},\n  \"plugins\": {}\n}}\n", body, plugins))
    }
}

/// `span-1` through `span-n`.
pub fn span_classes(n: u32) -> Vec<String> {
    (1..=n).map(|i| format!("span-{}", i)).collect()
}
