//! Readiness waits: network idleness and post-load settling.
//!
//! Both are built on [`wait_until_stable`], which samples a value and returns
//! once it has stayed unchanged for a stability window. A sample of `None`
//! means "not ready yet" and restarts the window.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::browser::PageActivity;
use crate::{Error, Result};

/// Window, polling interval and upper bound for a stability wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stability {
    pub window_ms: u64,
    pub poll_ms: u64,
    pub timeout_ms: u64,
}

impl Stability {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for Stability {
    fn default() -> Self {
        Self {
            window_ms: 500,
            poll_ms: 100,
            timeout_ms: 30000,
        }
    }
}

/// Network idleness: load complete, in-flight requests at or below
/// `max_inflight`, and no new resources finishing for the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdle {
    #[serde(flatten)]
    pub stability: Stability,
    #[serde(default)]
    pub max_inflight: u32,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        Self {
            stability: Stability::default(),
            max_inflight: 0,
        }
    }
}

impl NetworkIdle {
    /// Reduce an activity sample to the value that must stay stable.
    pub fn sample(&self, activity: &PageActivity) -> Option<u64> {
        if activity.ready && activity.inflight <= self.max_inflight {
            Some(activity.resources)
        } else {
            None
        }
    }
}

/// What to do after network idleness before capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SettleStrategy {
    /// Sleep a constant delay
    Fixed { ms: u64 },
    /// Wait until the layout signature stops changing, bounded by a timeout
    StableLayout(Stability),
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Fixed { ms: 2000 }
    }
}

impl SettleStrategy {
    pub fn stable_layout() -> Self {
        SettleStrategy::StableLayout(Stability {
            window_ms: 500,
            poll_ms: 100,
            timeout_ms: 10000,
        })
    }
}

/// Sample until the value has held steady for `s.window()`.
///
/// Returns the time spent waiting. Fails with [`Error::Timeout`] once
/// `s.timeout()` elapses without a stable window.
pub fn wait_until_stable<T, F>(what: &str, s: &Stability, mut sample: F) -> Result<Duration>
where
    T: PartialEq,
    F: FnMut() -> Result<Option<T>>,
{
    let start = Instant::now();
    let mut last: Option<T> = None;
    let mut since = start;

    loop {
        let now = Instant::now();
        match sample()? {
            Some(v) => {
                if last.as_ref() == Some(&v) {
                    if now.duration_since(since) >= s.window() {
                        return Ok(start.elapsed());
                    }
                } else {
                    last = Some(v);
                    since = now;
                }
            }
            None => last = None,
        }

        if start.elapsed() >= s.timeout() {
            return Err(Error::Timeout { what: what.to_string(), ms: s.timeout_ms });
        }
        thread::sleep(s.poll());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(window_ms: u64, timeout_ms: u64) -> Stability {
        Stability { window_ms, poll_ms: 5, timeout_ms }
    }

    #[test]
    fn returns_after_value_holds_for_window() {
        let mut n = 0;
        let waited = wait_until_stable("counter", &fast(30, 2000), || {
            n += 1;
            Ok(Some(n.min(4)))
        })
        .unwrap();
        assert!(waited >= Duration::from_millis(30));
        assert!(n > 4);
    }

    #[test]
    fn none_restarts_the_window() {
        let mut calls = 0;
        wait_until_stable("ready", &fast(20, 2000), || {
            calls += 1;
            Ok(if calls % 3 == 0 && calls < 12 { None } else { Some(1) })
        })
        .unwrap();
        assert!(calls >= 12);
    }

    #[test]
    fn never_stable_times_out() {
        let mut n = 0u32;
        let err = wait_until_stable("layout", &fast(50, 60), || {
            n += 1;
            Ok(Some(n))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Timeout { ms: 60, .. }));
    }

    #[test]
    fn sample_errors_propagate() {
        let err = wait_until_stable::<u32, _>("probe", &fast(10, 1000), || {
            Err(Error::RenderError("detached".into()))
        })
        .unwrap_err();
        assert!(matches!(err, Error::RenderError(_)));
    }

    #[test]
    fn network_idle_sample_requires_ready_and_quiet() {
        let idle = NetworkIdle::default();
        let mut a = PageActivity { ready: false, inflight: 0, resources: 3, layout: 0 };
        assert_eq!(idle.sample(&a), None);
        a.ready = true;
        a.inflight = 1;
        assert_eq!(idle.sample(&a), None);
        a.inflight = 0;
        assert_eq!(idle.sample(&a), Some(3));
    }

    #[test]
    fn settle_defaults_to_fixed_two_seconds() {
        assert_eq!(SettleStrategy::default(), SettleStrategy::Fixed { ms: 2000 });
        let s: SettleStrategy = serde_json::from_str(r#"{"mode":"stable_layout","window_ms":200,"poll_ms":50,"timeout_ms":4000}"#).unwrap();
        assert!(matches!(s, SettleStrategy::StableLayout(Stability { window_ms: 200, .. })));
    }
}
