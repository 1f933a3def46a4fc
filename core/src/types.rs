//! Domain types shared by every flash-sale crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a product on sale.
///
/// Rendered as the bare integer, which is also how it appears in counter keys,
/// flag paths and the `/spike/{product_id}` route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    /// Create a product id from its raw value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw integer value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A product as stored in the persistent catalog.
///
/// Read once at startup to seed the stock counter; the admission path never
/// touches it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Units currently in stock (never negative in the catalog)
    pub stock: i64,
}

impl Product {
    /// Create a product.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, stock: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stock,
        }
    }
}

/// Caller-visible result of one purchase attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpikeOutcome {
    /// One unit was claimed and the sale committed.
    Success,
    /// The attempt did not buy anything, for whatever reason.
    Fail,
}

impl SpikeOutcome {
    /// Wire representation (`"success"` / `"fail"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
        }
    }

    /// Returns `true` for [`SpikeOutcome::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for SpikeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States a single purchase attempt moves through.
///
/// ```text
/// Start ──► FastRejected
///   │
///   ▼
/// Counting ──► Exhausted
///   │
///   ▼
/// Committing ──► Committed
///        └─────► RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpikeState {
    /// Request received, nothing consulted yet.
    Start,
    /// Local cache already knew the product was sold out.
    FastRejected,
    /// Decrementing the shared counter.
    Counting,
    /// The decrement went below zero; counter corrected and flag propagated.
    Exhausted,
    /// A unit was claimed; persisting the sale.
    Committing,
    /// The sale was persisted.
    Committed,
    /// The commit failed and the claim was undone.
    RolledBack,
}

impl SpikeState {
    /// Whether the attempt has finished in this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::FastRejected | Self::Exhausted | Self::Committed | Self::RolledBack
        )
    }

    /// Binary outcome of a terminal state.
    ///
    /// Non-terminal states report [`SpikeOutcome::Fail`]: an attempt that
    /// stopped there did not buy anything.
    #[must_use]
    pub const fn outcome(self) -> SpikeOutcome {
        match self {
            Self::Committed => SpikeOutcome::Success,
            _ => SpikeOutcome::Fail,
        }
    }

    /// Short label used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FastRejected => "fast_rejected",
            Self::Counting => "counting",
            Self::Exhausted => "exhausted",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for SpikeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
