//! A scenario is one linear pass over a page for one viewport profile:
//! open, navigate, wait for network idleness, settle, then run its capture
//! and expectation actions in order. Any failure aborts the scenario; the
//! browser context is released on every path.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::artifact::{self, Artifact};
use crate::browser::{Browser, CaptureMode, Page};
use crate::expect::Expectation;
use crate::profile::ViewportProfile;
use crate::wait::{self, SettleStrategy};
use crate::{Error, Result, RunnerConfig};

/// Write a screenshot of the page to `file` in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub file: String,
    pub mode: CaptureMode,
}

impl Capture {
    pub fn full_page(file: impl Into<String>) -> Self {
        Self { file: file.into(), mode: CaptureMode::FullPage }
    }

    pub fn viewport(file: impl Into<String>) -> Self {
        Self { file: file.into(), mode: CaptureMode::Viewport }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Capture(Capture),
    Expect(Expectation),
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Path joined onto the runner's base URL
    pub route: String,
    #[serde(default)]
    pub profile: ViewportProfile,
    #[serde(default = "default_true")]
    pub wait_for_network_idle: bool,
    pub actions: Vec<Action>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, route: impl Into<String>, profile: ViewportProfile) -> Self {
        Self {
            name: name.into(),
            route: route.into(),
            profile,
            wait_for_network_idle: true,
            actions: Vec::new(),
        }
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.actions.push(Action::Capture(capture));
        self
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.actions.push(Action::Expect(expectation));
        self
    }

    pub fn without_network_idle(mut self) -> Self {
        self.wait_for_network_idle = false;
        self
    }

    pub fn captures(&self) -> impl Iterator<Item = &Capture> {
        self.actions.iter().filter_map(|a| match a {
            Action::Capture(c) => Some(c),
            Action::Expect(_) => None,
        })
    }

    pub fn expectations(&self) -> impl Iterator<Item = &Expectation> {
        self.actions.iter().filter_map(|a| match a {
            Action::Expect(e) => Some(e),
            Action::Capture(_) => None,
        })
    }
}

/// Where in its sequence a scenario was when it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Open,
    Navigate,
    NetworkIdle,
    Settle,
    PrepareOutput,
    Capture(String),
    Expect(String),
    Close,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Open => write!(f, "open"),
            Step::Navigate => write!(f, "navigate"),
            Step::NetworkIdle => write!(f, "network idle"),
            Step::Settle => write!(f, "settle"),
            Step::PrepareOutput => write!(f, "prepare output"),
            Step::Capture(file) => write!(f, "capture {}", file),
            Step::Expect(what) => write!(f, "expect {}", what),
            Step::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub profile: String,
    pub artifacts: Vec<Artifact>,
    pub expectations_checked: usize,
    pub duration_ms: u64,
}

fn at<'a>(scenario: &'a Scenario, step: Step) -> impl FnOnce(Error) -> Error + 'a {
    move |source| Error::Scenario {
        scenario: scenario.name.clone(),
        step,
        source: Box::new(source),
    }
}

/// Run one scenario end to end.
pub fn run_scenario<B: Browser>(browser: &B, config: &RunnerConfig, scenario: &Scenario) -> Result<ScenarioReport> {
    let start = Instant::now();
    let vp = scenario.profile.viewport;
    info!(
        "[{}] opening {} context ({}x{})",
        scenario.name, scenario.profile.name, vp.width, vp.height
    );

    let mut page = browser.open(&scenario.profile).map_err(at(scenario, Step::Open))?;
    let outcome = drive(&mut page, config, scenario);
    let closed = page.close();

    let (artifacts, expectations_checked) = match (outcome, closed) {
        (Ok(done), Ok(())) => done,
        (Ok(_), Err(e)) => return Err(at(scenario, Step::Close)(e)),
        (Err(e), Ok(())) => return Err(e),
        (Err(e), Err(close_err)) => {
            warn!("[{}] context did not close cleanly: {}", scenario.name, close_err);
            return Err(e);
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "[{}] done: {} artifact(s), {} expectation(s) in {} ms",
        scenario.name,
        artifacts.len(),
        expectations_checked,
        duration_ms
    );

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        profile: scenario.profile.name.clone(),
        artifacts,
        expectations_checked,
        duration_ms,
    })
}

fn drive<P: Page>(page: &mut P, config: &RunnerConfig, scenario: &Scenario) -> Result<(Vec<Artifact>, usize)> {
    let url = config.target_url(&scenario.route).map_err(at(scenario, Step::Navigate))?;
    debug!("[{}] navigating to {}", scenario.name, url);
    page.goto(url.as_str()).map_err(at(scenario, Step::Navigate))?;

    if scenario.wait_for_network_idle {
        let idle = config.network_idle;
        let waited = wait::wait_until_stable("network idle", &idle.stability, || {
            let activity = page.activity()?;
            Ok(idle.sample(&activity))
        })
        .map_err(at(scenario, Step::NetworkIdle))?;
        debug!("[{}] network idle after {} ms", scenario.name, waited.as_millis());
    }

    settle(page, config.settle).map_err(at(scenario, Step::Settle))?;

    if config.capture {
        artifact::ensure_dir(&config.output_dir).map_err(at(scenario, Step::PrepareOutput))?;
    }

    let mut artifacts = Vec::new();
    let mut checked = 0;
    for action in &scenario.actions {
        match action {
            Action::Capture(capture) => {
                if !config.capture {
                    debug!("[{}] capture disabled, skipping {}", scenario.name, capture.file);
                    continue;
                }
                let step = Step::Capture(capture.file.clone());
                let data = page.screenshot(capture.mode).map_err(at(scenario, step.clone()))?;
                let a = artifact::write_png(&config.output_dir, &scenario.name, &capture.file, &data)
                    .map_err(at(scenario, step))?;
                info!("[{}] screenshot saved to {}", scenario.name, a.path.display());
                artifacts.push(a);
            }
            Action::Expect(expectation) => {
                expect_within(page, expectation, config.assert_timeout(), config.assert_poll())
                    .map_err(at(scenario, Step::Expect(expectation.to_string())))?;
                checked += 1;
            }
        }
    }

    Ok((artifacts, checked))
}

fn settle<P: Page>(page: &mut P, strategy: SettleStrategy) -> Result<()> {
    match strategy {
        SettleStrategy::Fixed { ms } => {
            thread::sleep(Duration::from_millis(ms));
            Ok(())
        }
        SettleStrategy::StableLayout(stability) => {
            wait::wait_until_stable("stable layout", &stability, || Ok(Some(page.activity()?.layout)))
                .map(|_| ())
        }
    }
}

/// Poll the page until `expectation` holds. Backend errors abort at once;
/// only a failing check is retried.
fn expect_within<P: Page>(page: &mut P, expectation: &Expectation, timeout: Duration, poll: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        let found = page.query(expectation.locator())?;
        match expectation.check(&found) {
            Ok(()) => return Ok(()),
            Err(observed) if start.elapsed() >= timeout => {
                return Err(Error::AssertionFailed(format!("{}: {}", expectation, observed)));
            }
            Err(_) => thread::sleep(poll),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_orders_actions() {
        let s = Scenario::new("demo", "/tester-demo", ViewportProfile::desktop())
            .capture(Capture::full_page("a.png"))
            .expect(Expectation::visible("#x"))
            .capture(Capture::viewport("b.png"));
        let files: Vec<_> = s.captures().map(|c| c.file.as_str()).collect();
        assert_eq!(files, vec!["a.png", "b.png"]);
        assert_eq!(s.expectations().count(), 1);
        assert!(matches!(s.actions[1], Action::Expect(_)));
    }

    #[test]
    fn scenario_from_json_defaults() {
        let s: Scenario = serde_json::from_str(
            r#"{
                "name": "demo",
                "route": "/tester-demo",
                "actions": [
                    {"action": "capture", "file": "demo.png", "mode": "full_page"},
                    {"action": "expect", "expect": "min_count", "locator": "[class*=\"span-\"]", "min": 6}
                ]
            }"#,
        )
        .unwrap();
        assert!(s.wait_for_network_idle);
        assert_eq!(s.profile, ViewportProfile::desktop());
        assert_eq!(s.actions[0], Action::Capture(Capture::full_page("demo.png")));
        assert_eq!(s.actions[1], Action::Expect(Expectation::min_count("[class*=\"span-\"]", 6)));
    }

    #[test]
    fn step_display() {
        assert_eq!(Step::Capture("x.png".into()).to_string(), "capture x.png");
        assert_eq!(Step::NetworkIdle.to_string(), "network idle");
    }
}
