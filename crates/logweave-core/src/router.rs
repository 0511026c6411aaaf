//! Severity → channel fan-out.
//!
//! The routing table is computed once from the configured channel map and is
//! immutable afterwards. Each channel gets a [`SeverityMask`] so the per-call
//! check is a single bit test.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::severity::Severity;

/// Set of severities, one bit per rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SeverityMask(u8);

impl SeverityMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(0b0111_1111)
    }

    pub fn insert(&mut self, severity: Severity) {
        self.0 |= 1 << severity.rank();
    }

    #[inline]
    pub fn contains(self, severity: Severity) -> bool {
        self.0 & (1 << severity.rank()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Severity> {
        Severity::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl FromIterator<Severity> for SeverityMask {
    fn from_iter<I: IntoIterator<Item = Severity>>(iter: I) -> Self {
        let mut mask = SeverityMask::empty();
        for severity in iter {
            mask.insert(severity);
        }
        mask
    }
}

/// Target(s) of one severity in the channel map: a single channel name or a
/// list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelTargets {
    One(String),
    Many(Vec<String>),
}

impl ChannelTargets {
    pub fn names(&self) -> Vec<&str> {
        match self {
            ChannelTargets::One(name) => vec![name.as_str()],
            ChannelTargets::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for ChannelTargets {
    fn from(name: &str) -> Self {
        ChannelTargets::One(name.to_string())
    }
}

/// A channel name doubles as a folder and file prefix, so it must stay a
/// single path component below the log directory.
pub fn is_valid_channel_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\'])
}

/// Precomputed severity sets per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    channels: BTreeMap<String, SeverityMask>,
}

impl RoutingTable {
    /// Build from a severity-name → channel(s) map. Unknown severity names,
    /// blank channel names and names that would leave the log directory are
    /// dropped.
    pub fn from_map<'a, I>(map: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a ChannelTargets)>,
    {
        let mut channels: BTreeMap<String, SeverityMask> = BTreeMap::new();
        for (severity_name, targets) in map {
            let severity = match severity_name.parse::<Severity>() {
                Ok(severity) => severity,
                Err(_) => {
                    tracing::debug!(severity = %severity_name, "Ignoring unknown severity in channel map");
                    continue;
                }
            };
            for channel in targets.names() {
                let channel = channel.trim();
                if channel.is_empty() {
                    continue;
                }
                if !is_valid_channel_name(channel) {
                    tracing::warn!(channel, "Ignoring channel name that is not a plain folder name");
                    continue;
                }
                channels.entry(channel.to_string()).or_default().insert(severity);
            }
        }
        Self { channels }
    }

    /// Severities accepted by a channel; empty for unknown channels.
    pub fn mask_for(&self, channel: &str) -> SeverityMask {
        self.channels.get(channel).copied().unwrap_or_default()
    }

    /// Channels that accept a severity.
    pub fn channels_for(&self, severity: Severity) -> impl Iterator<Item = &str> {
        self.channels
            .iter()
            .filter(move |(_, mask)| mask.contains(severity))
            .map(|(name, _)| name.as_str())
    }

    /// Every channel that receives at least one severity.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// No severity is routed to any file channel.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
