//! Visreg
//!
//! Visual regression checks for the tester demo dashboard, plus the design
//! token configuration its stylesheet is built from.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives headless Chrome through the DevTools protocol
//! - **Simple Backend** (default): HTML-only DOM checks over plain HTTP, no screenshots
//! - **Deterministic waits**: network idleness and settling are polled, bounded waits
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use visreg::{RunnerConfig, Suite};
//!
//! # #[cfg(feature = "cdp")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunnerConfig {
//!     base_url: "http://localhost:4000".to_string(),
//!     ..Default::default()
//! };
//! let browser = Arc::new(visreg::cdp::CdpBrowser::new(&config));
//! let report = visreg::run_suite(browser, Arc::new(config), &Suite::tester_demo()).await?;
//! assert!(report.success());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod artifact;
pub mod browser;
pub mod expect;
pub mod locator;
pub mod profile;
pub mod scenario;
pub mod style;
pub mod suite;
pub mod wait;

#[cfg(feature = "cdp")]
pub mod cdp;

// HTML-only backend (no JS, no screenshots)
#[cfg(feature = "simple")]
pub mod simple;

pub use browser::{Browser, CaptureMode, Page, PageActivity};
pub use expect::Expectation;
pub use locator::{ElementInfo, Locator};
pub use profile::ViewportProfile;
pub use scenario::{run_scenario, Capture, Scenario, ScenarioReport, Step};
pub use style::StyleConfig;
pub use suite::{run_suite, Suite, SuiteReport};
pub use wait::{NetworkIdle, SettleStrategy, Stability};

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Configuration shared by every scenario of a run
///
/// The defaults target a dashboard server already listening on
/// `localhost:4000` and write screenshots to `screenshots/`.
///
/// # Examples
///
/// ```
/// let cfg = visreg::RunnerConfig::default();
/// assert_eq!(cfg.target_url("/tester-demo").unwrap().as_str(), "http://localhost:4000/tester-demo");
/// ```
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Server the scenarios navigate to; the runner never starts it
    pub base_url: String,
    /// Directory screenshots and the manifest are written to
    pub output_dir: PathBuf,
    /// Per-step timeout handed to the browser backend, in milliseconds
    pub navigation_timeout_ms: u64,
    pub network_idle: NetworkIdle,
    pub settle: SettleStrategy,
    /// How long an expectation is retried before it fails
    pub assert_timeout_ms: u64,
    pub assert_poll_ms: u64,
    /// Whether capture actions write screenshots
    pub capture: bool,
    /// Scenarios run concurrently
    pub jobs: usize,
    /// Chrome binary to launch instead of the auto-detected one
    pub chrome_path: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            output_dir: PathBuf::from("screenshots"),
            navigation_timeout_ms: 30000,
            network_idle: NetworkIdle::default(),
            settle: SettleStrategy::default(),
            assert_timeout_ms: 5000,
            assert_poll_ms: 100,
            capture: true,
            jobs: num_cpus::get(),
            chrome_path: None,
        }
    }
}

impl RunnerConfig {
    /// Resolve a route against the base URL.
    pub fn target_url(&self, route: &str) -> Result<url::Url> {
        let base = url::Url::parse(&self.base_url)
            .map_err(|e| Error::ConfigError(format!("invalid base URL '{}': {}", self.base_url, e)))?;
        base.join(route)
            .map_err(|e| Error::ConfigError(format!("invalid route '{}': {}", route, e)))
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn assert_timeout(&self) -> Duration {
        Duration::from_millis(self.assert_timeout_ms)
    }

    pub fn assert_poll(&self) -> Duration {
        Duration::from_millis(self.assert_poll_ms.max(1))
    }
}
