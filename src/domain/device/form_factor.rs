//! Form factor classification
//!
//! Heuristic split between mobile and desktop clients. Mobile clients skip
//! device enumeration and get platform voice processing; desktop clients get a
//! device choice and an unprocessed signal.

use std::fmt;

/// Viewports narrower than this are treated as mobile on touch clients
pub const MOBILE_MAX_VIEWPORT_WIDTH: u32 = 768;

/// User-agent fragments that identify mobile clients
const MOBILE_UA_TOKENS: &[&str] = &[
    "android",
    "iphone",
    "ipad",
    "ipod",
    "mobile",
    "blackberry",
    "iemobile",
    "opera mini",
    "webos",
];

/// Client form factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormFactor {
    #[default]
    Desktop,
    Mobile,
}

impl FormFactor {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }

    pub fn is_mobile(&self) -> bool {
        *self == Self::Mobile
    }

    /// Classify a client from its hints.
    ///
    /// A mobile user agent always wins. Otherwise a narrow viewport only counts
    /// when the client reports touch support, so a shrunken desktop window
    /// stays desktop.
    pub fn classify(hints: &ClientHints) -> Self {
        if hints.user_agent_is_mobile() {
            return Self::Mobile;
        }

        let narrow = hints
            .viewport_width
            .map(|w| w < MOBILE_MAX_VIEWPORT_WIDTH)
            .unwrap_or(false);
        let touch = hints.max_touch_points.map(|t| t > 0).unwrap_or(false);

        if narrow && touch {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }
}

impl fmt::Display for FormFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the host knows about the client display and input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHints {
    pub viewport_width: Option<u32>,
    pub user_agent: Option<String>,
    pub max_touch_points: Option<u32>,
}

impl ClientHints {
    /// Check the user agent against the mobile token list
    pub fn user_agent_is_mobile(&self) -> bool {
        self.user_agent
            .as_deref()
            .map(|ua| {
                let ua = ua.to_ascii_lowercase();
                MOBILE_UA_TOKENS.iter().any(|token| ua.contains(token))
            })
            .unwrap_or(false)
    }

    /// Hints with a new viewport width
    pub fn with_viewport_width(mut self, width: u32) -> Self {
        self.viewport_width = Some(width);
        self
    }
}
