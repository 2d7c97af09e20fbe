use core::fmt;
use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Where a partner's targeting is applied by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetingType {
    /// Targeting is set on the page as a whole.
    Page,
    /// Targeting is set on each slot individually.
    Slot,
}

impl TargetingType {
    /// Stable lowercase identifier for logs/errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Slot => "slot",
        }
    }

    /// Whether this module can serve the targeting type.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Slot)
    }
}

impl fmt::Display for TargetingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Analytics the orchestrator may collect for this module.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Analytics: u8 {
        /// Time between a demand request and its answer.
        const TIME = 1 << 0;
        /// The targeting returned by the module.
        const DEMAND = 1 << 1;
    }
}

/// Optional orchestrator features this module supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedOptions {
    /// Demand can be retrieved on page load through `prefetch`.
    pub prefetch: bool,
    /// Maximum age of stored demand; `None` means stored demand never expires.
    pub demand_expiry: Option<Duration>,
}
