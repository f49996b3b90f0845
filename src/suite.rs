//! Suites group scenarios and run them concurrently

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::artifact::Manifest;
use crate::browser::Browser;
use crate::expect::Expectation;
use crate::profile::ViewportProfile;
use crate::scenario::{run_scenario, Capture, Scenario, ScenarioReport, Step};
use crate::{Error, Result, RunnerConfig};

pub const TESTER_DEMO_ROUTE: &str = "/tester-demo";

/// Metric labels the dashboard must show.
pub const DASHBOARD_METRICS: [&str; 4] = ["Total Revenue", "Active Users", "New Signups", "Churn Rate"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    /// Desktop dashboard with DOM checks, plus mobile and tablet captures.
    pub fn tester_demo() -> Self {
        let mut dashboard = Scenario::new("dashboard", TESTER_DEMO_ROUTE, ViewportProfile::desktop())
            .capture(Capture::full_page("tester-demo-dashboard.png"))
            .expect(Expectation::contains_text("h1", "Dashboard Overview"))
            .expect(Expectation::visible("text=SaaSy Dashboard"))
            .expect(Expectation::min_count("[class*=\"span-\"]", 6));
        for metric in DASHBOARD_METRICS {
            dashboard = dashboard.expect(Expectation::visible(&format!("text={}", metric)));
        }
        let dashboard = dashboard
            .expect(Expectation::visible("#activity-table"))
            .capture(Capture::viewport("tester-demo-viewport.png"));

        let mobile = Scenario::new("mobile", TESTER_DEMO_ROUTE, ViewportProfile::mobile())
            .capture(Capture::full_page("tester-demo-mobile.png"));
        let tablet = Scenario::new("tablet", TESTER_DEMO_ROUTE, ViewportProfile::tablet())
            .capture(Capture::full_page("tester-demo-tablet.png"));

        Self {
            name: "tester-demo".to_string(),
            scenarios: vec![dashboard, mobile, tablet],
        }
    }

    /// Single viewport capture after page load and the settle delay.
    pub fn smoke() -> Self {
        let fixed = Scenario::new("fixed", TESTER_DEMO_ROUTE, ViewportProfile::desktop())
            .without_network_idle()
            .capture(Capture::viewport("tester-demo-fixed.png"));
        Self {
            name: "smoke".to_string(),
            scenarios: vec![fixed],
        }
    }

    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "tester-demo" => Some(Self::tester_demo()),
            "smoke" => Some(Self::smoke()),
            _ => None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
        let suite: Suite = serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigError(format!("{}: invalid suite: {}", path.display(), e)))?;
        suite.validate()?;
        Ok(suite)
    }

    /// A built-in suite name, or a path to a JSON suite file.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        match Self::builtin(name_or_path) {
            Some(s) => Ok(s),
            None if Path::new(name_or_path).is_file() => Self::load(Path::new(name_or_path)),
            None => Err(Error::ConfigError(format!(
                "unknown suite '{}' (built-in: tester-demo, smoke)",
                name_or_path
            ))),
        }
    }

    /// Scenario names and screenshot files must be unique within a suite.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut files = HashSet::new();
        for s in &self.scenarios {
            if !names.insert(s.name.as_str()) {
                return Err(Error::ConfigError(format!("duplicate scenario name '{}'", s.name)));
            }
            for c in s.captures() {
                if !c.file.ends_with(".png") || c.file.contains(['/', '\\']) {
                    return Err(Error::ConfigError(format!(
                        "capture file '{}' must be a bare .png file name",
                        c.file
                    )));
                }
                if !files.insert(c.file.as_str()) {
                    return Err(Error::ConfigError(format!("screenshot '{}' is written twice", c.file)));
                }
            }
        }
        Ok(())
    }

    /// Keep only the named scenarios; an empty filter keeps everything.
    pub fn filter(mut self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = names.iter().find(|n| !self.scenarios.iter().any(|s| &s.name == *n)) {
            return Err(Error::ConfigError(format!("suite '{}' has no scenario '{}'", self.name, unknown)));
        }
        self.scenarios.retain(|s| names.contains(&s.name));
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub report: Option<ScenarioReport>,
    pub failed_step: Option<Step>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            suite: self.suite.clone(),
            artifacts: self
                .results
                .iter()
                .filter_map(|r| r.report.as_ref())
                .flat_map(|r| r.artifacts.iter().cloned())
                .collect(),
        }
    }
}

/// Run every scenario of `suite`, at most `config.jobs` at a time.
///
/// Scenarios are independent: a failure is recorded in the report and does
/// not stop the others. Results keep the suite's scenario order.
pub async fn run_suite<B>(browser: Arc<B>, config: Arc<RunnerConfig>, suite: &Suite) -> Result<SuiteReport>
where
    B: Browser + 'static,
{
    suite.validate()?;
    let start = Instant::now();
    let jobs = config.jobs.max(1);
    info!("Running {} scenario(s) of '{}' with {} job(s)", suite.scenarios.len(), suite.name, jobs);

    let mut results: Vec<(usize, ScenarioResult)> = stream::iter(suite.scenarios.iter().cloned().enumerate())
        .map(|(idx, scenario)| {
            let browser = browser.clone();
            let config = config.clone();
            async move {
                let name = scenario.name.clone();
                let joined = tokio::task::spawn_blocking(move || run_scenario(&*browser, &config, &scenario)).await;
                let result = match joined {
                    Ok(Ok(report)) => ScenarioResult {
                        name,
                        success: true,
                        report: Some(report),
                        failed_step: None,
                        error: None,
                    },
                    Ok(Err(e)) => {
                        error!("✗ {} - {}", name, e);
                        ScenarioResult {
                            name,
                            success: false,
                            report: None,
                            failed_step: e.step().cloned(),
                            error: Some(e.to_string()),
                        }
                    }
                    Err(join_err) => {
                        error!("✗ {} - worker aborted: {}", name, join_err);
                        ScenarioResult {
                            name,
                            success: false,
                            report: None,
                            failed_step: None,
                            error: Some(format!("worker aborted: {}", join_err)),
                        }
                    }
                };
                (idx, result)
            }
        })
        .buffer_unordered(jobs)
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);
    let results: Vec<ScenarioResult> = results.into_iter().map(|(_, r)| r).collect();
    let passed = results.iter().filter(|r| r.success).count();
    let failed = results.len() - passed;
    let duration_ms = start.elapsed().as_millis() as u64;

    info!("Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

    Ok(SuiteReport {
        suite: suite.name.clone(),
        total: results.len(),
        passed,
        failed,
        duration_ms,
        results,
    })
}
