//! A lightweight, browser-less backend that fetches HTML and answers DOM
//! queries statically.
//!
//! No JavaScript runs and nothing is laid out, so visibility is judged from
//! markup alone (`hidden` attributes, inline `display:none` and
//! `visibility:hidden`, non-rendered elements). Screenshots are not
//! provided; use it with capture disabled for fast DOM checks.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};

use crate::browser::{Browser, CaptureMode, Page, PageActivity};
use crate::locator::{normalize_text, ElementInfo, Locator};
use crate::profile::ViewportProfile;
use crate::{Error, Result, RunnerConfig};

const DEFAULT_USER_AGENT: &str = concat!("visreg/", env!("CARGO_PKG_VERSION"));
const NOT_RENDERED: [&str; 7] = ["head", "script", "style", "template", "title", "noscript", "meta"];

#[derive(Debug, Clone)]
pub struct SimpleBrowser {
    timeout: Duration,
}

impl SimpleBrowser {
    pub fn new(config: &RunnerConfig) -> Self {
        Self { timeout: config.navigation_timeout() }
    }
}

impl Browser for SimpleBrowser {
    type Page = SimplePage;

    fn open(&self, profile: &ViewportProfile) -> Result<SimplePage> {
        // Built per page: a blocking client must not be created or dropped
        // on an async runtime thread.
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(profile.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(SimplePage {
            client,
            timeout_ms: self.timeout.as_millis() as u64,
            html: None,
        })
    }
}

pub struct SimplePage {
    client: Client,
    timeout_ms: u64,
    html: Option<String>,
}

impl SimplePage {
    fn document(&self) -> Result<Html> {
        let html = self
            .html
            .as_ref()
            .ok_or_else(|| Error::RenderError("No document loaded".into()))?;
        Ok(Html::parse_document(html))
    }
}

impl Page for SimplePage {
    fn goto(&mut self, url: &str) -> Result<()> {
        let nav_err = |reason: String| Error::NavigationError { url: url.to_string(), reason };

        let res = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                Error::Timeout { what: format!("navigation to {}", url), ms: self.timeout_ms }
            } else {
                nav_err(format!("HTTP GET failed: {}", e))
            }
        })?;

        let status = res.status();
        if !status.is_success() {
            return Err(nav_err(format!("HTTP status {}", status.as_u16())));
        }

        let body = res
            .text()
            .map_err(|e| nav_err(format!("Failed to read response body: {}", e)))?;
        debug!("fetched {} ({} bytes)", url, body.len());
        self.html = Some(body);
        Ok(())
    }

    fn activity(&mut self) -> Result<PageActivity> {
        let len = self.html.as_ref().map(|h| h.len() as u64).unwrap_or(0);
        Ok(PageActivity {
            ready: self.html.is_some(),
            inflight: 0,
            resources: 0,
            layout: len,
        })
    }

    fn query(&mut self, locator: &Locator) -> Result<Vec<ElementInfo>> {
        let document = self.document()?;
        let elements: Vec<ElementRef> = match locator {
            Locator::Css(sel) => {
                let selector = Selector::parse(sel)
                    .map_err(|e| Error::ConfigError(format!("invalid selector '{}': {:?}", sel, e)))?;
                document.select(&selector).collect()
            }
            Locator::Text(needle) => {
                let hit = |el: &ElementRef| rendered(el) && Locator::text_matches(needle, &element_text(el));
                document
                    .root_element()
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| hit(el) && !el.children().filter_map(ElementRef::wrap).any(|c| hit(&c)))
                    .collect()
            }
        };

        Ok(elements
            .iter()
            .map(|el| ElementInfo { text: element_text(el), visible: visible(el) })
            .collect())
    }

    fn screenshot(&mut self, _mode: CaptureMode) -> Result<Vec<u8>> {
        Err(Error::Unsupported("screenshots require the cdp backend".into()))
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

fn element_text(el: &ElementRef) -> String {
    normalize_text(&el.text().collect::<String>())
}

fn rendered(el: &ElementRef) -> bool {
    !NOT_RENDERED.contains(&el.value().name())
}

fn hidden_by_markup(el: &ElementRef) -> bool {
    let v = el.value();
    if v.attr("hidden").is_some() {
        return true;
    }
    let style: String = v
        .attr("style")
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    style.contains("display:none") || style.contains("visibility:hidden")
}

fn visible(el: &ElementRef) -> bool {
    if !rendered(el) || hidden_by_markup(el) {
        return false;
    }
    !el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| !rendered(&a) || hidden_by_markup(&a))
}
