//! Decoding records into point-in-time connection snapshots.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::codec::AttrValue;
use super::error::{Error, Result};
use super::inetdiag::{
    BbrInfo, DctcpInfo, INET_DIAG_BBRINFO, INET_DIAG_CLASS_ID, INET_DIAG_CONG,
    INET_DIAG_DCTCPINFO, INET_DIAG_INFO, INET_DIAG_LOCALS, INET_DIAG_MARK, INET_DIAG_MD5SIG,
    INET_DIAG_MEMINFO, INET_DIAG_PAD, INET_DIAG_PEERS, INET_DIAG_PROTOCOL, INET_DIAG_SHUTDOWN,
    INET_DIAG_SKMEMINFO, INET_DIAG_SKV6ONLY, INET_DIAG_TCLASS, INET_DIAG_TOS, InetDiagMsg,
    MemInfo, Protocol, SockMemInfo, VegasInfo, INET_DIAG_VEGASINFO,
};
use super::record::{Metadata, RawRecord};
use super::tcp::TcpInfo;

/// A set of attribute types, stored as the wire-compatible bitmask
/// (bit `1 << (type - 1)`; type 0 is never a real attribute).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AttrSet(u32);

impl AttrSet {
    /// The empty set.
    pub const fn new() -> Self {
        Self(0)
    }

    fn bit(attr_type: u16) -> u32 {
        // Type 0 (INET_DIAG_NONE) has no bit; wide types fall off the mask.
        match attr_type {
            1..=32 => 1u32 << (attr_type - 1),
            _ => 0,
        }
    }

    /// Add an attribute type to the set.
    pub fn insert(&mut self, attr_type: u16) {
        self.0 |= Self::bit(attr_type);
    }

    /// Check whether an attribute type is in the set.
    pub fn contains(&self, attr_type: u16) -> bool {
        self.0 & Self::bit(attr_type) != 0
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The raw bitmask.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// One fully decoded, immutable connection snapshot.
///
/// Every attribute-derived field is optional; `observed` says which
/// attribute types were present on the wire, and `not_fully_parsed` which
/// of those had a payload that did not decode cleanly (wrong size for the
/// kernel generation this crate targets). `not_fully_parsed` is always a
/// subset of `observed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Capture time of the message batch containing this record.
    pub timestamp: SystemTime,

    /// Attribute types present on the wire.
    pub observed: AttrSet,
    /// Attribute types whose decode was size-mismatched or failed.
    #[serde(default, skip_serializing_if = "AttrSet::is_empty")]
    pub not_fully_parsed: AttrSet,

    /// Parsed diagnostic header (socket identity, state, queues).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inet_diag: Option<InetDiagMsg>,

    /// Congestion-control algorithm name (INET_DIAG_CONG).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congestion_algorithm: Option<String>,

    /// Type of service (INET_DIAG_TOS).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos: Option<u8>,
    /// IPv6 traffic class (INET_DIAG_TCLASS).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tclass: Option<u8>,
    /// Cgroup class id (INET_DIAG_CLASS_ID).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u8>,
    /// Shutdown state (INET_DIAG_SHUTDOWN).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<u8>,
    /// Transport protocol (INET_DIAG_PROTOCOL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    /// Socket mark (INET_DIAG_MARK).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark: Option<u32>,

    /// TCP state and counters (INET_DIAG_INFO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_info: Option<TcpInfo>,
    /// Socket memory usage (INET_DIAG_MEMINFO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_info: Option<MemInfo>,
    /// Socket memory counters (INET_DIAG_SKMEMINFO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_mem: Option<SockMemInfo>,
    /// Vegas congestion info (INET_DIAG_VEGASINFO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegas_info: Option<VegasInfo>,
    /// DCTCP congestion info (INET_DIAG_DCTCPINFO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dctcp_info: Option<DctcpInfo>,
    /// BBR congestion info (INET_DIAG_BBRINFO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbr_info: Option<BbrInfo>,
}

impl Snapshot {
    /// An empty snapshot captured at `timestamp`.
    pub fn new(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            observed: AttrSet::new(),
            not_fully_parsed: AttrSet::new(),
            inet_diag: None,
            congestion_algorithm: None,
            tos: None,
            tclass: None,
            class_id: None,
            shutdown: None,
            protocol: None,
            mark: None,
            tcp_info: None,
            mem_info: None,
            socket_mem: None,
            vegas_info: None,
            dctcp_info: None,
            bbr_info: None,
        }
    }
}

/// Decode a record into stream metadata and a snapshot.
///
/// Fails with [`Error::EmptyRecord`] only when the record carries neither
/// a diagnostic header nor metadata. A header that fails to parse is fatal
/// to this record; individual attribute problems only degrade the
/// corresponding field and set its `not_fully_parsed` bit.
pub fn decode(record: &RawRecord<'_>) -> Result<(Option<Metadata>, Snapshot)> {
    if record.raw_header.is_none() && record.metadata.is_none() {
        return Err(Error::EmptyRecord);
    }

    let mut snapshot = Snapshot::new(record.timestamp);

    if let Some(raw) = record.raw_header {
        snapshot.inet_diag = Some(InetDiagMsg::parse(raw)?);
    }

    for (attr_type, raw) in record.attrs.iter() {
        let value = AttrValue(raw);
        let mut fully_parsed = true;
        match attr_type {
            INET_DIAG_MEMINFO => {
                let (v, ok) = value.to_mem_info();
                snapshot.mem_info = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_INFO => {
                let (v, ok) = value.to_tcp_info();
                snapshot.tcp_info = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_VEGASINFO => {
                let (v, ok) = value.to_vegas_info();
                snapshot.vegas_info = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_CONG => {
                let (v, ok) = value.congestion_algorithm();
                snapshot.congestion_algorithm = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_TOS => {
                let (v, ok) = value.to_u8();
                snapshot.tos = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_TCLASS => {
                let (v, ok) = value.to_u8();
                snapshot.tclass = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_SKMEMINFO => {
                let (v, ok) = value.to_sock_mem_info();
                snapshot.socket_mem = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_SHUTDOWN => {
                let (v, ok) = value.to_u8();
                snapshot.shutdown = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_DCTCPINFO => {
                let (v, ok) = value.to_dctcp_info();
                snapshot.dctcp_info = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_PROTOCOL => {
                let (v, ok) = value.to_protocol();
                snapshot.protocol = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_MARK => {
                let (v, ok) = value.to_mark();
                snapshot.mark = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_BBRINFO => {
                let (v, ok) = value.to_bbr_info();
                snapshot.bbr_info = Some(v);
                fully_parsed = ok;
            }
            INET_DIAG_CLASS_ID => {
                let (v, ok) = value.to_u8();
                snapshot.class_id = Some(v);
                fully_parsed = ok;
            }
            // Recognized but not decoded. Observed, never degraded:
            // "not implemented" is distinct from "malformed".
            INET_DIAG_SKV6ONLY | INET_DIAG_LOCALS | INET_DIAG_PEERS | INET_DIAG_PAD
            | INET_DIAG_MD5SIG => {
                debug!(attr_type, len = raw.len(), "attribute recognized but not decoded");
            }
            _ => {
                debug!(attr_type, "unhandled attribute type");
            }
        }
        snapshot.observed.insert(attr_type);
        if !fully_parsed {
            snapshot.not_fully_parsed.insert(attr_type);
        }
    }

    Ok((record.metadata.clone(), snapshot))
}
