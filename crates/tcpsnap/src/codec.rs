//! Size-tolerant attribute value decoding.
//!
//! Kernels of different vintages emit different sizes for the same
//! attribute: older kernels send a shorter tcp_info, newer kernels may
//! append fields this crate does not know yet. Every struct conversion
//! therefore succeeds regardless of length and reports whether the payload
//! matched the expected size exactly:
//!
//! - shorter payload: zero-extended, `fully_parsed = false`
//! - exact payload: `fully_parsed = true`
//! - longer payload: leading bytes decoded, `fully_parsed = false`
//!
//! Scalar conversions are stricter about their one or four bytes, but a
//! failure still only degrades that single field, never the record.

use zerocopy::FromBytes;

use super::inetdiag::{BbrInfo, DctcpInfo, MemInfo, Protocol, SockMemInfo, VegasInfo};
use super::tcp::TcpInfo;

/// Decode a wire struct from a payload of any length.
///
/// Returns the value and whether the payload length matched the struct
/// size exactly. This never fails: undersized payloads are zero-extended,
/// oversized payloads are truncated to the struct prefix.
fn decode_struct<T: FromBytes>(raw: &[u8]) -> (T, bool) {
    let size = std::mem::size_of::<T>();
    if raw.len() < size {
        let mut padded = vec![0u8; size];
        padded[..raw.len()].copy_from_slice(raw);
        match T::read_from_bytes(&padded) {
            Ok(value) => (value, false),
            Err(_) => (T::new_zeroed(), false),
        }
    } else {
        match T::read_from_prefix(raw) {
            Ok((value, rest)) => (value, rest.is_empty()),
            Err(_) => (T::new_zeroed(), false),
        }
    }
}

/// Raw value bytes of one attribute, with typed conversions.
///
/// Each conversion returns `(value, fully_parsed)`; the assembler records
/// `fully_parsed = false` in the snapshot's not-fully-parsed set.
#[derive(Debug, Clone, Copy)]
pub struct AttrValue<'a>(pub &'a [u8]);

impl AttrValue<'_> {
    /// Decode an inet_diag_meminfo payload.
    pub fn to_mem_info(&self) -> (MemInfo, bool) {
        decode_struct(self.0)
    }

    /// Decode a tcp_info payload.
    pub fn to_tcp_info(&self) -> (TcpInfo, bool) {
        decode_struct(self.0)
    }

    /// Decode a tcpvegas_info payload.
    pub fn to_vegas_info(&self) -> (VegasInfo, bool) {
        decode_struct(self.0)
    }

    /// Decode an SK_MEMINFO array payload.
    pub fn to_sock_mem_info(&self) -> (SockMemInfo, bool) {
        decode_struct(self.0)
    }

    /// Decode a tcp_dctcp_info payload.
    pub fn to_dctcp_info(&self) -> (DctcpInfo, bool) {
        decode_struct(self.0)
    }

    /// Decode a tcp_bbr_info payload.
    pub fn to_bbr_info(&self) -> (BbrInfo, bool) {
        decode_struct(self.0)
    }

    /// Decode the congestion algorithm name: the bytes up to the first
    /// NUL, as UTF-8. An empty payload is a valid empty name.
    pub fn congestion_algorithm(&self) -> (String, bool) {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        (String::from_utf8_lossy(&self.0[..end]).into_owned(), true)
    }

    /// Decode a one-byte scalar (TOS, TCLASS, class id, shutdown).
    pub fn to_u8(&self) -> (u8, bool) {
        match self.0.first() {
            Some(&b) => (b, true),
            None => (0, false),
        }
    }

    /// Decode the transport protocol number.
    pub fn to_protocol(&self) -> (Protocol, bool) {
        let (value, ok) = self.to_u8();
        (Protocol(value), ok)
    }

    /// Decode the socket mark: exactly four native-endian bytes.
    pub fn to_mark(&self) -> (u32, bool) {
        match <[u8; 4]>::try_from(self.0) {
            Ok(bytes) => (u32::from_ne_bytes(bytes), true),
            Err(_) => (0, false),
        }
    }
}
