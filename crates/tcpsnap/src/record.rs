//! Intermediate records: one per accepted dump message.
//!
//! A record keeps the raw 72-byte diagnostic header and a table of raw
//! attribute values, both borrowed from the receive buffer; nothing is
//! decoded yet. Records are consumed immediately by
//! [`decode`](crate::snapshot::decode) and never outlive the buffer they
//! alias.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::attr;
use super::error::{Error, Result};
use super::inetdiag::{INET_DIAG_MAX, InetDiagMsg, SOCK_DIAG_BY_FAMILY};
use super::message::RawMessage;

/// Per-connection stream metadata, attached to at most one record per
/// stream (typically the first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Connection UUID.
    pub uuid: String,
    /// Monotonic sequence number within the stream.
    pub sequence: u64,
    /// Stream start time.
    pub start_time: SystemTime,
}

/// Raw attribute values indexed by attribute type.
///
/// At most one entry per type. The table is bounded: it never grows past
/// `2 * INET_DIAG_MAX + 1` slots no matter what type codes the kernel
/// sends, so a wild type code cannot inflate the allocation.
#[derive(Debug, Clone, Default)]
pub struct AttrTable<'a> {
    slots: Vec<Option<&'a [u8]>>,
}

impl<'a> AttrTable<'a> {
    /// Create a table covering types `0..=max_type`.
    pub fn with_max_type(max_type: u16) -> Self {
        Self {
            slots: vec![None; max_type as usize + 1],
        }
    }

    /// Store a value, returning the previous one if the slot was taken.
    /// Types beyond the table bound are dropped and reported as `None`.
    pub fn insert(&mut self, attr_type: u16, value: &'a [u8]) -> Option<&'a [u8]> {
        let slot = self.slots.get_mut(attr_type as usize)?;
        slot.replace(value)
    }

    /// Get the value for a type, if present.
    pub fn get(&self, attr_type: u16) -> Option<&'a [u8]> {
        self.slots.get(attr_type as usize).copied().flatten()
    }

    /// Iterate over present entries as `(type, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &'a [u8])> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(t, v)| v.map(|v| (t as u16, v)))
    }

    /// Check whether the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// One accepted dump message, split but not yet decoded.
///
/// A record may carry only metadata (the first record of a connection
/// stream) or only diagnostic data; it is invalid only when it has neither.
#[derive(Debug, Clone)]
pub struct RawRecord<'a> {
    /// Capture time of the message batch.
    pub timestamp: SystemTime,
    /// The raw inet_diag_msg bytes, exactly [`InetDiagMsg::SIZE`] long.
    pub raw_header: Option<&'a [u8]>,
    /// Raw attribute values by type.
    pub attrs: AttrTable<'a>,
    /// Connection stream metadata, if any.
    pub metadata: Option<Metadata>,
}

impl<'a> RawRecord<'a> {
    /// Build a record from a classified message.
    ///
    /// Returns `Ok(None)` when `skip_local` is set and both endpoints are
    /// local (loopback, link-local, multicast, unspecified). Fails when
    /// the message is not a SOCK_DIAG_BY_FAMILY message, the payload is
    /// shorter than the diagnostic header, or the attribute list is
    /// truncated.
    pub fn from_message(msg: &RawMessage<'a>, skip_local: bool) -> Result<Option<Self>> {
        if msg.header.nlmsg_type != SOCK_DIAG_BY_FAMILY {
            return Err(Error::WrongMessageType(msg.header.nlmsg_type));
        }
        if msg.payload.len() < InetDiagMsg::SIZE {
            return Err(Error::HeaderTooShort {
                expected: InetDiagMsg::SIZE,
                actual: msg.payload.len(),
            });
        }
        let (raw_header, attr_bytes) = msg.payload.split_at(InetDiagMsg::SIZE);

        if skip_local {
            // Header parse failures are hard errors; the filter itself
            // only ever drops records.
            let parsed = InetDiagMsg::parse(raw_header)?;
            if parsed.is_local() {
                return Ok(None);
            }
        }

        let attrs = attr::split(attr_bytes)?;
        let observed_max = attrs.iter().map(|&(t, _)| t).max().unwrap_or(0);
        let max_type = observed_max.min(2 * INET_DIAG_MAX);

        let mut table = AttrTable::with_max_type(max_type);
        for (attr_type, value) in attrs {
            if attr_type > max_type {
                warn!(attr_type, "attribute type beyond table bound, dropping");
                continue;
            }
            if table.insert(attr_type, value).is_some() {
                // Duplicate attribute: keep the later occurrence.
                warn!(attr_type, "duplicate attribute, keeping last");
            }
        }

        Ok(Some(Self {
            timestamp: SystemTime::now(),
            raw_header: Some(raw_header),
            attrs: table,
            metadata: None,
        }))
    }

    /// Build a record carrying only stream metadata.
    pub fn metadata_only(metadata: Metadata) -> Self {
        Self {
            timestamp: SystemTime::now(),
            raw_header: None,
            attrs: AttrTable::default(),
            metadata: Some(metadata),
        }
    }

    /// Attach stream metadata to this record.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
