//! Decoded channels as handed to the caller.

use crate::{info::ConversionInfo, types::ChannelData};
use log::warn;
use std::collections::BTreeMap;

/// One decoded channel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    /// Samples, physical values when `converted` is set.
    pub data: ChannelData,
    /// Master channel of the group, `None` for the master itself.
    pub master: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
    /// Conversion described for the channel, applied or not.
    pub conversion: Option<ConversionInfo>,
    pub converted: bool,
    pub data_group: u32,
}

impl Channel {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Why a channel described by the metadata has no samples.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnavailableReason {
    /// The data group, or the channel's VLSD data, resolved to nothing.
    NoData,
    /// The channel's encoding has no storage representation.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unavailable {
    pub data_group: u32,
    pub reason: UnavailableReason,
}

/// Result of a read.
///
/// A channel described by the metadata is either in `channels` or in
/// `unavailable`; a name found in neither is not part of the file (or was
/// filtered out).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadOutcome {
    pub channels: BTreeMap<String, Channel>,
    pub unavailable: BTreeMap<String, Unavailable>,
}

impl ReadOutcome {
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Add a channel. The first channel read under a name wins.
    pub fn insert(&mut self, name: String, channel: Channel) {
        if let Some(existing) = self.channels.get(&name) {
            warn!(
                "Channel {:?} of data group {} shadowed by data group {}",
                name, channel.data_group, existing.data_group
            );
            return;
        }
        self.unavailable.remove(&name);
        self.channels.insert(name, channel);
    }

    pub fn mark_unavailable(&mut self, name: String, data_group: u32, reason: UnavailableReason) {
        if self.channels.contains_key(&name) {
            return;
        }
        self.unavailable
            .entry(name)
            .or_insert(Unavailable { data_group, reason });
    }

    /// Fold the outcome of another data group into this one.
    pub fn merge(&mut self, other: ReadOutcome) {
        for (name, channel) in other.channels {
            self.insert(name, channel);
        }
        for (name, missing) in other.unavailable {
            self.mark_unavailable(name, missing.data_group, missing.reason);
        }
    }
}
