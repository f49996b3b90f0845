//! In-process fake browser used by the scenario and suite tests.
//!
//! The fake "renders" a list of elements: CSS locators understand tag names,
//! `#id` and `[class*="..."]`; text locators match element text. Screenshots
//! are blank PNGs of the viewport size, or of the document height for full
//! page captures.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use visreg::{
    Browser, CaptureMode, ElementInfo, Error, Locator, Page, PageActivity, Result, RunnerConfig, SettleStrategy,
    Stability, ViewportProfile,
};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub tag: String,
    pub id: Option<String>,
    pub class: String,
    pub text: String,
    pub visible: bool,
    /// Queries answered before the element turns visible
    pub reveal_after: usize,
}

impl FakeElement {
    pub fn new(tag: &str, text: &str) -> Self {
        Self { tag: tag.into(), id: None, class: String::new(), text: text.into(), visible: true, reveal_after: 0 }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = class.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Stay hidden for the first `queries` lookups that match this element.
    pub fn reveal_after(mut self, queries: usize) -> Self {
        self.reveal_after = queries;
        self
    }

    fn matches(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Text(needle) => Locator::text_matches(needle, &self.text),
            Locator::Css(sel) => {
                if let Some(id) = sel.strip_prefix('#') {
                    self.id.as_deref() == Some(id)
                } else if let Some(rest) = sel.strip_prefix("[class*=\"") {
                    let needle = rest.trim_end_matches("\"]");
                    self.class.contains(needle)
                } else {
                    self.tag == *sel
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeSite {
    pub reachable: bool,
    pub elements: Vec<FakeElement>,
    pub document_height: u32,
    /// Activity polls before the page reports load complete
    pub load_polls: usize,
    /// Keep one request in flight forever
    pub stuck_request: bool,
}

impl FakeSite {
    /// The tester demo dashboard with eight cards.
    pub fn dashboard() -> Self {
        let mut elements = vec![
            FakeElement::new("span", "SaaSy Dashboard"),
            FakeElement::new("h1", "Dashboard Overview"),
        ];
        for (i, label) in ["Total Revenue", "Active Users", "New Signups", "Churn Rate"].iter().enumerate() {
            elements.push(FakeElement::new("div", label).class(&format!("card span-{}", 3 + i % 2)));
        }
        for i in 0..4 {
            elements.push(FakeElement::new("div", "chart").class(&format!("span-{}", 6 + i)));
        }
        elements.push(FakeElement::new("table", "Recent activity").id("activity-table"));
        Self { reachable: true, elements, document_height: 2400, load_polls: 2, stuck_request: false }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

pub struct FakeBrowser {
    pub site: FakeSite,
    pub counters: Arc<Counters>,
}

impl FakeBrowser {
    pub fn new(site: FakeSite) -> Self {
        Self { site, counters: Arc::new(Counters::default()) }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

pub struct FakePage {
    site: FakeSite,
    profile: ViewportProfile,
    counters: Arc<Counters>,
    loaded: bool,
    polls: usize,
    /// Lookups per element, indexed like `site.elements`
    lookups: Vec<usize>,
}

impl Browser for FakeBrowser {
    type Page = FakePage;

    fn open(&self, profile: &ViewportProfile) -> Result<FakePage> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakePage {
            site: self.site.clone(),
            profile: profile.clone(),
            counters: self.counters.clone(),
            lookups: vec![0; self.site.elements.len()],
            loaded: false,
            polls: 0,
        })
    }
}

impl Page for FakePage {
    fn goto(&mut self, url: &str) -> Result<()> {
        if !self.site.reachable {
            return Err(Error::NavigationError { url: url.to_string(), reason: "connection refused".into() });
        }
        self.loaded = true;
        Ok(())
    }

    fn activity(&mut self) -> Result<PageActivity> {
        self.polls += 1;
        Ok(PageActivity {
            ready: self.loaded && self.polls > self.site.load_polls,
            inflight: u32::from(self.site.stuck_request),
            resources: self.polls.min(self.site.load_polls + 1) as u64,
            layout: 7,
        })
    }

    fn query(&mut self, locator: &Locator) -> Result<Vec<ElementInfo>> {
        let mut found = Vec::new();
        for (e, seen) in self.site.elements.iter().zip(self.lookups.iter_mut()) {
            if e.matches(locator) {
                *seen += 1;
                found.push(ElementInfo { text: e.text.clone(), visible: e.visible && *seen > e.reveal_after });
            }
        }
        Ok(found)
    }

    fn screenshot(&mut self, mode: CaptureMode) -> Result<Vec<u8>> {
        let vp = self.profile.viewport;
        let height = match mode {
            CaptureMode::Viewport => vp.height,
            CaptureMode::FullPage => self.site.document_height.max(vp.height),
        };
        Ok(blank_png(vp.width, height))
    }

    fn close(self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).expect("encode png");
    buf.into_inner()
}

/// Runner config with short waits writing into `out`.
pub fn fast_config(out: &std::path::Path) -> RunnerConfig {
    let mut config = RunnerConfig {
        output_dir: out.to_path_buf(),
        settle: SettleStrategy::Fixed { ms: 5 },
        assert_timeout_ms: 50,
        assert_poll_ms: 5,
        jobs: 3,
        ..Default::default()
    };
    config.network_idle.stability = Stability { window_ms: 20, poll_ms: 2, timeout_ms: 1000 };
    config
}
