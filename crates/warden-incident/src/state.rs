//! Canonical states for each resource kind.
//!
//! Every kind has a small closed vocabulary with exactly one nominal member.
//! The string symbol of a state is what the event log persists.

use std::fmt;
use std::hash::Hash;

use warden_proto::ResourceKind;

/// A canonical health state.
pub trait ResourceState:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Resource kind this vocabulary belongs to.
    const KIND: ResourceKind;

    /// The healthy state.
    const NOMINAL: Self;

    /// Every state, nominal first.
    const ALL: &'static [Self];

    /// Persisted symbol.
    fn as_str(&self) -> &'static str;

    /// Icon shown in messages.
    fn icon(&self) -> &'static str;

    /// Human-readable description shown in messages.
    fn describe(&self) -> &'static str;

    /// Returns true for the nominal state.
    fn is_nominal(&self) -> bool {
        *self == Self::NOMINAL
    }

    /// Parses a persisted symbol.
    fn parse(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == symbol)
    }
}

/// State of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    /// Running.
    Running,
    /// Restarting after a crash or by policy.
    Restarting,
    /// Paused.
    Paused,
    /// Created or exited, not running.
    Stopped,
    /// Gone from the runtime, or dead.
    Removed,
    /// The runtime reported a state we do not know.
    Unknown,
}

impl ResourceState for ContainerState {
    const KIND: ResourceKind = ResourceKind::Container;
    const NOMINAL: Self = Self::Running;
    const ALL: &'static [Self] = &[
        Self::Running,
        Self::Restarting,
        Self::Paused,
        Self::Stopped,
        Self::Removed,
        Self::Unknown,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
            Self::Unknown => "unknown",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::Running => "🟢",
            Self::Restarting | Self::Paused => "🟡",
            Self::Stopped => "🔴",
            Self::Removed => "⚫",
            Self::Unknown => "⚪",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
            Self::Unknown => "state unknown",
        }
    }
}

/// Internet reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkState {
    /// Reachable.
    Up,
    /// Unreachable.
    Down,
}

impl ResourceState for NetworkState {
    const KIND: ResourceKind = ResourceKind::Network;
    const NOMINAL: Self = Self::Up;
    const ALL: &'static [Self] = &[Self::Up, Self::Down];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::Up => "🟢",
            Self::Down => "🔴",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Up => "connection restored",
            Self::Down => "connection lost",
        }
    }
}

/// Power state reported by a UPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsState {
    /// On mains power.
    Online,
    /// Mains lost, running from the battery.
    OnBattery,
    /// Battery is low.
    Low,
    /// The UPS reported nothing we understand.
    Unknown,
}

impl ResourceState for UpsState {
    const KIND: ResourceKind = ResourceKind::Ups;
    const NOMINAL: Self = Self::Online;
    const ALL: &'static [Self] = &[Self::Online, Self::OnBattery, Self::Low, Self::Unknown];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::OnBattery => "onbattery",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::Online => "🟢",
            Self::OnBattery => "🔴",
            Self::Low => "🪫",
            Self::Unknown => "⚪",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Online => "power restored",
            Self::OnBattery => "power lost",
            Self::Low => "battery low",
            Self::Unknown => "status unknown",
        }
    }
}

/// Lifecycle of the host running the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    /// Running.
    Up,
    /// Shut down.
    Down,
}

impl ResourceState for SystemState {
    const KIND: ResourceKind = ResourceKind::System;
    const NOMINAL: Self = Self::Up;
    const ALL: &'static [Self] = &[Self::Up, Self::Down];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::Up => "🟢",
            Self::Down => "🔴",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Up => "up and running",
            Self::Down => "shutting down",
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UpsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
