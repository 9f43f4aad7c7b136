use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps of a probe session, in protocol order.
///
/// Ordering follows declaration order; a session only ever moves to a later
/// state. `Active` and `Inactive` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeState {
    Connecting,
    AwaitingParams,
    Validating,
    GeneratingSecret,
    SubmittingTip,
    RawProbing,
    Active,
    Inactive,
}

impl ProbeState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Active | Self::Inactive)
    }

    /// Whether a session sitting in `self` may move to `next`.
    ///
    /// Any non-terminal state may fail into `Inactive`; otherwise only the
    /// immediate successor is allowed.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Inactive {
            return true;
        }
        self.successor() == Some(next)
    }

    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::AwaitingParams),
            Self::AwaitingParams => Some(Self::Validating),
            Self::Validating => Some(Self::GeneratingSecret),
            Self::GeneratingSecret => Some(Self::SubmittingTip),
            Self::SubmittingTip => Some(Self::RawProbing),
            Self::RawProbing => Some(Self::Active),
            Self::Active | Self::Inactive => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::AwaitingParams => "awaiting_params",
            Self::Validating => "validating",
            Self::GeneratingSecret => "generating_secret",
            Self::SubmittingTip => "submitting_tip",
            Self::RawProbing => "raw_probing",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Externally observable outcome of a probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Pending,
    Active,
    Inactive,
}

impl Verdict {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl From<ProbeState> for Verdict {
    fn from(state: ProbeState) -> Self {
        match state {
            ProbeState::Active => Self::Active,
            ProbeState::Inactive => Self::Inactive,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
