//! Backend seam: a browser hands out isolated pages configured for a profile

use serde::{Deserialize, Serialize};

use crate::locator::{ElementInfo, Locator};
use crate::profile::ViewportProfile;
use crate::Result;

/// Full scrollable document or only the visible window area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    FullPage,
    Viewport,
}

/// A point-in-time sample of page activity used by the readiness waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageActivity {
    /// Document finished loading
    pub ready: bool,
    /// Requests started by the page and not yet finished
    pub inflight: u32,
    /// Resources that have finished loading so far
    pub resources: u64,
    /// Opaque signature of document size and DOM mutations
    pub layout: u64,
}

/// Launches isolated browsing contexts.
///
/// Implementations must be shareable across threads; pages themselves are
/// used from a single thread and need not be `Send`.
pub trait Browser: Send + Sync {
    type Page: Page;

    /// Acquire a fresh context with the profile's viewport and user agent.
    fn open(&self, profile: &ViewportProfile) -> Result<Self::Page>;
}

/// A single page inside an isolated context.
pub trait Page {
    /// Navigate and wait for the document load event.
    fn goto(&mut self, url: &str) -> Result<()>;

    fn activity(&mut self) -> Result<PageActivity>;

    /// All elements matching `locator`, in document order.
    fn query(&mut self, locator: &Locator) -> Result<Vec<ElementInfo>>;

    /// PNG bytes of the current page.
    fn screenshot(&mut self, mode: CaptureMode) -> Result<Vec<u8>>;

    /// Release the context. Called on success and failure paths alike.
    fn close(self) -> Result<()>;
}
