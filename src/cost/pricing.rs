use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating system class a runner bills under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsClass {
    Linux,
    Windows,
    #[serde(rename = "macos")]
    MacOs,
}

impl OsClass {
    pub const ALL: [OsClass; 3] = [OsClass::Linux, OsClass::Windows, OsClass::MacOs];

    /// Per-minute rate in USD for this class.
    pub fn rate_per_minute(self) -> f64 {
        PRICING.rate(self)
    }
}

impl fmt::Display for OsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OsClass::Linux => "Linux",
            OsClass::Windows => "Windows",
            OsClass::MacOs => "macOS",
        };
        f.write_str(name)
    }
}

/// GitHub Actions per-minute pricing for standard hosted runners.
///
/// Taken from:
/// https://docs.github.com/en/billing/managing-billing-for-github-actions/about-billing-for-github-actions
#[derive(Debug, Clone, Copy)]
pub struct PricingTable {
    pub linux_per_min: f64,
    pub windows_per_min: f64,
    pub macos_per_min: f64,
}

pub const PRICING: PricingTable = PricingTable {
    linux_per_min: 0.008,
    windows_per_min: 0.016,
    macos_per_min: 0.08,
};

impl PricingTable {
    pub fn rate(&self, class: OsClass) -> f64 {
        match class {
            OsClass::Linux => self.linux_per_min,
            OsClass::Windows => self.windows_per_min,
            OsClass::MacOs => self.macos_per_min,
        }
    }
}
