//! Viewport profiles describing the device classes a scenario renders for

use serde::{Deserialize, Serialize};

use crate::Viewport;

pub const IPHONE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
pub const IPAD_USER_AGENT: &str = "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";

/// A (width, height, user agent) tuple simulating a device class.
///
/// `user_agent` is `None` for the default desktop profile, in which case the
/// backend keeps whatever agent the browser reports on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportProfile {
    pub name: String,
    pub viewport: Viewport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ViewportProfile {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            viewport: Viewport { width, height },
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn desktop() -> Self {
        Self::new("desktop", 1280, 720)
    }

    pub fn mobile() -> Self {
        Self::new("mobile", 375, 812).with_user_agent(IPHONE_USER_AGENT)
    }

    pub fn tablet() -> Self {
        Self::new("tablet", 768, 1024).with_user_agent(IPAD_USER_AGENT)
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "desktop" => Some(Self::desktop()),
            "mobile" => Some(Self::mobile()),
            "tablet" => Some(Self::tablet()),
            _ => None,
        }
    }
}

impl Default for ViewportProfile {
    fn default() -> Self {
        Self::desktop()
    }
}
