//! Synthetic wire buffers for tests.

use crate::attr::{NLA_HDRLEN, NlAttr, nla_align};
use crate::inetdiag::{InetDiagMsg, SOCK_DIAG_BY_FAMILY};
use crate::message::{NLM_F_MULTI, NLMSG_HDRLEN, NlMsgHdr, RawMessage};

/// Append one attribute (header, value, alignment padding) to `buf`.
pub(crate) fn push_attr(buf: &mut Vec<u8>, attr_type: u16, value: &[u8]) {
    let header = NlAttr::new(attr_type, value.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(value);
    let padded = nla_align(NLA_HDRLEN + value.len());
    buf.resize(buf.len() + padded - (NLA_HDRLEN + value.len()), 0);
}

/// Encode a 72-byte inet_diag_msg with the given family and IPv4
/// endpoints (ports 443 -> 52000, state ESTABLISHED).
pub(crate) fn diag_header_bytes(family: u8, src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
    let mut raw = vec![family, 1, 0, 0];
    raw.extend_from_slice(&443u16.to_be_bytes());
    raw.extend_from_slice(&52000u16.to_be_bytes());
    let mut addr = [0u8; 16];
    addr[..4].copy_from_slice(&src);
    raw.extend_from_slice(&addr);
    let mut addr = [0u8; 16];
    addr[..4].copy_from_slice(&dst);
    raw.extend_from_slice(&addr);
    raw.extend_from_slice(&[0u8; 12]); // interface + cookie
    raw.extend_from_slice(&[0u8; 20]); // expires..inode
    assert_eq!(raw.len(), InetDiagMsg::SIZE);
    raw
}

/// Wrap a payload in a SOCK_DIAG_BY_FAMILY netlink message
/// (seq 1, pid 100, multi-part).
pub(crate) fn diag_message(payload: &[u8]) -> RawMessage<'_> {
    RawMessage {
        header: NlMsgHdr {
            nlmsg_len: (NLMSG_HDRLEN + payload.len()) as u32,
            nlmsg_type: SOCK_DIAG_BY_FAMILY,
            nlmsg_flags: NLM_F_MULTI,
            nlmsg_seq: 1,
            nlmsg_pid: 100,
        },
        payload,
    }
}
