//! Error types for diagnostic dump decoding.

use std::io;

/// Result type for diagnostic dump operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while requesting or decoding a diagnostic dump.
///
/// Variants split into two tiers: protocol errors (`SequenceMismatch`,
/// `PidMismatch`, `WrongMessageType`, `HeaderTooShort`, `TruncatedAttribute`)
/// abort the whole dump, while `EmptyRecord` and kernel errors apply to a
/// single record or request. Per-attribute decode problems never surface
/// here; they are tracked on [`Snapshot::not_fully_parsed`](crate::Snapshot).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code in an NLMSG_ERROR message.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value reported by the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Response sequence number does not match the request.
    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Sequence number sent with the request.
        expected: u32,
        /// Sequence number in the received message.
        actual: u32,
    },

    /// Response port ID does not match the requesting socket.
    #[error("pid mismatch: expected {expected}, got {actual}")]
    PidMismatch {
        /// Port ID of the requesting socket.
        expected: u32,
        /// Port ID in the received message.
        actual: u32,
    },

    /// Message type is not SOCK_DIAG_BY_FAMILY.
    #[error("unexpected netlink message type {0}, want SOCK_DIAG_BY_FAMILY (20)")]
    WrongMessageType(u16),

    /// Payload is smaller than the fixed inet_diag_msg header.
    #[error("diagnostic header too short: expected {expected} bytes, got {actual}")]
    HeaderTooShort {
        /// Minimum header size.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Attribute list ends mid-attribute.
    #[error("truncated attribute at offset {offset}: {remaining} bytes remain")]
    TruncatedAttribute {
        /// Byte offset of the truncated attribute within the list.
        offset: usize,
        /// Bytes remaining at that offset.
        remaining: usize,
    },

    /// Malformed netlink framing.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Record carries neither a diagnostic header nor metadata.
    #[error("empty record: no diagnostic header and no metadata")]
    EmptyRecord,
}

impl Error {
    /// Create a kernel error from an errno value.
    ///
    /// Accepts either sign; the kernel embeds the negated errno in
    /// NLMSG_ERROR payloads. Any 4-byte value is tolerated, so a garbage
    /// payload cannot overflow the negation.
    pub fn from_errno(errno: i32) -> Self {
        let errno = errno.unsigned_abs().min(i32::MAX as u32) as i32;
        let message = io::Error::from_raw_os_error(errno).to_string();
        Self::Kernel { errno, message }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }
}
