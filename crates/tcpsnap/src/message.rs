//! Netlink message framing and response classification.
//!
//! A diagnostic dump arrives as a sequence of netlink messages sharing the
//! request's sequence number and the receiving socket's port ID. Each
//! message is either a data message (SOCK_DIAG_BY_FAMILY payload), an
//! NLMSG_ERROR (possibly a benign ack), or the NLMSG_DONE terminator of a
//! multi-part dump. [`classify`] sorts a single message into one of those
//! buckets without retaining any state across calls.

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// No operation, message must be discarded.
pub const NLMSG_NOOP: u16 = 1;
/// Error message or ACK.
pub const NLMSG_ERROR: u16 = 2;
/// End of multipart dump.
pub const NLMSG_DONE: u16 = 3;

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Check if this is an error message.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NLMSG_ERROR
    }

    /// Check if this is a done message.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NLMSG_DONE
    }

    /// Check if this message has the multi-part flag.
    pub fn is_multi(&self) -> bool {
        self.nlmsg_flags & NLM_F_MULTI != 0
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::InvalidMessage(format!(
                "netlink header needs {} bytes, got {}",
                NLMSG_HDRLEN,
                data.len()
            )))
    }
}

/// One raw netlink message: header plus payload borrowed from the
/// receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawMessage<'a> {
    /// The netlink header.
    pub header: NlMsgHdr,
    /// Payload bytes (everything after the header, up to nlmsg_len).
    pub payload: &'a [u8],
}

/// Iterator over netlink messages in a receive buffer.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Create a new message iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<RawMessage<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLMSG_HDRLEN {
            return None;
        }

        let header = match NlMsgHdr::from_bytes(self.data) {
            Ok(h) => *h,
            Err(e) => return Some(Err(e)),
        };

        let msg_len = header.nlmsg_len as usize;
        if msg_len < NLMSG_HDRLEN || msg_len > self.data.len() {
            return Some(Err(Error::InvalidMessage(format!(
                "invalid message length: {}",
                msg_len
            ))));
        }

        let payload = &self.data[NLMSG_HDRLEN..msg_len];
        let aligned_len = nlmsg_align(msg_len);

        // Move to next message
        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some(Ok(RawMessage { header, payload }))
    }
}

/// What to do when the kernel embeds a non-zero errno in the response
/// stream. A zero errno is always treated as a benign ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelErrorPolicy {
    /// Abort the dump with [`Error::Kernel`].
    #[default]
    Abort,
    /// Log the errno and keep consuming messages.
    LogAndContinue,
}

/// Classify one response message against the in-flight request.
///
/// Returns `(accepted, more)`: `accepted` is the message itself when it
/// carries diagnostic data, and `more` is whether further messages are
/// expected for this dump. Sequence or port-ID mismatches are protocol
/// violations and always fail, regardless of message type or flags.
pub fn classify<'a, 'b>(
    msg: &'b RawMessage<'a>,
    expected_seq: u32,
    expected_pid: u32,
    on_kernel_error: KernelErrorPolicy,
) -> Result<(Option<&'b RawMessage<'a>>, bool)> {
    if msg.header.nlmsg_seq != expected_seq {
        return Err(Error::SequenceMismatch {
            expected: expected_seq,
            actual: msg.header.nlmsg_seq,
        });
    }
    if msg.header.nlmsg_pid != expected_pid {
        return Err(Error::PidMismatch {
            expected: expected_pid,
            actual: msg.header.nlmsg_pid,
        });
    }

    if msg.header.is_done() {
        return Ok((None, false));
    }

    if msg.header.is_error() {
        // NLMSG_ERROR payload starts with the negated errno, native endian.
        if msg.payload.len() < 4 {
            return Err(Error::InvalidMessage(
                "NLMSG_ERROR payload shorter than 4 bytes".into(),
            ));
        }
        let errno = i32::from_ne_bytes([
            msg.payload[0],
            msg.payload[1],
            msg.payload[2],
            msg.payload[3],
        ]);
        if errno == 0 {
            tracing::debug!("kernel ack in dump stream");
            return Ok((None, true));
        }
        return match on_kernel_error {
            KernelErrorPolicy::Abort => Err(Error::from_errno(errno)),
            KernelErrorPolicy::LogAndContinue => {
                tracing::warn!(errno = errno.unsigned_abs(), "kernel reported error, continuing");
                Ok((None, true))
            }
        };
    }

    Ok((Some(msg), msg.header.is_multi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(msg_type: u16, flags: u16, seq: u32, pid: u32, payload: &[u8]) -> RawMessage<'_> {
        RawMessage {
            header: NlMsgHdr {
                nlmsg_len: (NLMSG_HDRLEN + payload.len()) as u32,
                nlmsg_type: msg_type,
                nlmsg_flags: flags,
                nlmsg_seq: seq,
                nlmsg_pid: pid,
            },
            payload,
        }
    }

    #[test]
    fn test_seq_mismatch_always_fails() {
        // Mismatch wins over every message type, DONE included.
        for msg_type in [20, NLMSG_DONE, NLMSG_ERROR] {
            let m = msg(msg_type, NLM_F_MULTI, 5, 100, &[0u8; 8]);
            let err = classify(&m, 6, 100, KernelErrorPolicy::Abort).unwrap_err();
            assert!(matches!(
                err,
                Error::SequenceMismatch {
                    expected: 6,
                    actual: 5
                }
            ));
        }
    }

    #[test]
    fn test_pid_mismatch_always_fails() {
        for msg_type in [20, NLMSG_DONE, NLMSG_ERROR] {
            let m = msg(msg_type, 0, 5, 100, &[0u8; 8]);
            let err = classify(&m, 5, 101, KernelErrorPolicy::Abort).unwrap_err();
            assert!(matches!(
                err,
                Error::PidMismatch {
                    expected: 101,
                    actual: 100
                }
            ));
        }
    }

    #[test]
    fn test_done_ends_stream() {
        let m = msg(NLMSG_DONE, NLM_F_MULTI, 5, 100, &[]);
        let (accepted, more) = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap();
        assert!(accepted.is_none());
        assert!(!more);
    }

    #[test]
    fn test_zero_errno_is_benign() {
        let payload = 0i32.to_ne_bytes();
        let m = msg(NLMSG_ERROR, 0, 5, 100, &payload);
        let (accepted, more) = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap();
        assert!(accepted.is_none());
        assert!(more);
    }

    #[test]
    fn test_nonzero_errno_abort_policy() {
        let payload = (-libc::ENOENT).to_ne_bytes();
        let m = msg(NLMSG_ERROR, 0, 5, 100, &payload);
        let err = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap_err();
        assert_eq!(err.errno(), Some(libc::ENOENT));
    }

    #[test]
    fn test_nonzero_errno_continue_policy() {
        let payload = (-libc::ENOENT).to_ne_bytes();
        let m = msg(NLMSG_ERROR, 0, 5, 100, &payload);
        let (accepted, more) = classify(&m, 5, 100, KernelErrorPolicy::LogAndContinue).unwrap();
        assert!(accepted.is_none());
        assert!(more);
    }

    #[test]
    fn test_extreme_errno_does_not_panic() {
        // A garbage errno of i32::MIN must surface as an error, not a panic.
        let payload = i32::MIN.to_ne_bytes();
        let m = msg(NLMSG_ERROR, 0, 5, 100, &payload);
        let err = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap_err();
        assert_eq!(err.errno(), Some(i32::MAX));

        // The logging path tolerates it too.
        let (accepted, more) = classify(&m, 5, 100, KernelErrorPolicy::LogAndContinue).unwrap();
        assert!(accepted.is_none());
        assert!(more);
    }

    #[test]
    fn test_truncated_error_payload() {
        let m = msg(NLMSG_ERROR, 0, 5, 100, &[0u8; 2]);
        let err = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[test]
    fn test_multipart_flag_drives_continuation() {
        let payload = [0u8; 8];

        let m = msg(20, NLM_F_MULTI, 5, 100, &payload);
        let (accepted, more) = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap();
        assert!(accepted.is_some());
        assert!(more);

        // No multi flag: last message of the dump.
        let m = msg(20, 0, 5, 100, &payload);
        let (accepted, more) = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap();
        assert!(accepted.is_some());
        assert!(!more);
    }

    #[test]
    fn test_classify_is_pure() {
        let m = msg(20, NLM_F_MULTI, 5, 100, &[1u8; 8]);
        let first = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap();
        let second = classify(&m, 5, 100, KernelErrorPolicy::Abort).unwrap();
        assert_eq!(first.1, second.1);
        assert_eq!(
            first.0.map(|m| m.payload),
            second.0.map(|m| m.payload)
        );
    }

    #[test]
    fn test_message_iter_splits_buffer() {
        let mut buf = Vec::new();
        for (seq, payload_len) in [(1u32, 8usize), (2, 4)] {
            let hdr = NlMsgHdr {
                nlmsg_len: (NLMSG_HDRLEN + payload_len) as u32,
                nlmsg_type: 20,
                nlmsg_flags: NLM_F_MULTI,
                nlmsg_seq: seq,
                nlmsg_pid: 100,
            };
            buf.extend_from_slice(hdr.as_bytes());
            buf.extend_from_slice(&vec![0xabu8; payload_len]);
        }

        let msgs: Vec<_> = MessageIter::new(&buf).collect::<Result<_>>().unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].header.nlmsg_seq, 1);
        assert_eq!(msgs[0].payload.len(), 8);
        assert_eq!(msgs[1].header.nlmsg_seq, 2);
        assert_eq!(msgs[1].payload.len(), 4);
    }

    #[test]
    fn test_message_iter_rejects_bad_length() {
        let hdr = NlMsgHdr {
            nlmsg_len: 1000,
            nlmsg_type: 20,
            nlmsg_flags: 0,
            nlmsg_seq: 1,
            nlmsg_pid: 100,
        };
        let buf = hdr.as_bytes().to_vec();
        let result: Result<Vec<_>> = MessageIter::new(&buf).collect();
        assert!(matches!(result, Err(Error::InvalidMessage(_))));
    }
}
