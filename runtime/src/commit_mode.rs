//! Selection between the direct and the queued commit path.

use std::fmt;
use std::str::FromStr;

/// Where a claimed unit is committed.
///
/// The two paths are mutually exclusive: exactly one [`SaleCommitter`]
/// implementation is handed to the orchestrator.
///
/// [`SaleCommitter`]: flash_sale_core::SaleCommitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Commit synchronously to the persistent store.
    #[default]
    Direct,
    /// Publish to the spike topic; the broker acknowledgement admits the sale
    /// and a consumer writes it to the persistent store later.
    Queued,
}

impl CommitMode {
    /// Configuration spelling of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Queued => "queued",
        }
    }
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "queued" => Ok(Self::Queued),
            other => Err(format!(
                "unknown commit mode '{other}' (expected 'direct' or 'queued')"
            )),
        }
    }
}
