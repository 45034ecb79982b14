//! Full socket dumps: request construction and the receive loop.

use tracing::{debug, warn};

use super::error::Result;
use super::inetdiag::{
    AddressFamily, INET_DIAG_CONG, INET_DIAG_INFO, INET_DIAG_MEMINFO, INET_DIAG_SHUTDOWN,
    INET_DIAG_SKMEMINFO, INET_DIAG_TCLASS, INET_DIAG_TOS, INET_DIAG_VEGASINFO, InetDiagReqV2,
    SOCK_DIAG_BY_FAMILY, TcpState,
};
use super::message::{
    KernelErrorPolicy, MessageIter, NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgHdr,
};
use super::record::RawRecord;
use super::snapshot::{self, Snapshot};
use super::socket::DiagSocket;

/// Options controlling a dump.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOptions {
    /// Drop connections whose endpoints are both local.
    pub skip_local: bool,
    /// What to do with kernel-reported errors in the response stream.
    pub kernel_error_policy: KernelErrorPolicy,
}

/// Extensions requested with every dump. One bit per attribute type,
/// `1 << (INET_DIAG_* - 1)`, within the one-byte idiag_ext field.
const REQUESTED_EXTENSIONS: u8 = (1 << (INET_DIAG_MEMINFO - 1))
    | (1 << (INET_DIAG_INFO - 1))
    | (1 << (INET_DIAG_VEGASINFO - 1))
    | (1 << (INET_DIAG_CONG - 1))
    | (1 << (INET_DIAG_TOS - 1))
    | (1 << (INET_DIAG_TCLASS - 1))
    | (1 << (INET_DIAG_SKMEMINFO - 1))
    | (1 << (INET_DIAG_SHUTDOWN - 1));

/// Build the wire bytes of a TCP dump request for one address family.
pub fn build_dump_request(family: AddressFamily, seq: u32) -> Vec<u8> {
    let req = InetDiagReqV2 {
        sdiag_family: family.as_u8(),
        sdiag_protocol: libc::IPPROTO_TCP as u8,
        idiag_ext: REQUESTED_EXTENSIONS,
        pad: 0,
        idiag_states: TcpState::all_mask(),
        id: Default::default(),
    };
    let header = NlMsgHdr {
        nlmsg_len: (NLMSG_HDRLEN + std::mem::size_of::<InetDiagReqV2>()) as u32,
        nlmsg_type: SOCK_DIAG_BY_FAMILY,
        nlmsg_flags: NLM_F_REQUEST | NLM_F_DUMP,
        nlmsg_seq: seq,
        nlmsg_pid: 0,
    };

    let mut buf = Vec::with_capacity(header.nlmsg_len as usize);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(req.as_bytes());
    buf
}

/// Dump every TCP socket of one address family and decode the results.
///
/// Framing and identity violations (sequence or port-ID mismatch, wrong
/// message type, truncated payloads) abort the dump. A record whose
/// attributes decode imperfectly still yields a snapshot with the
/// degraded fields flagged; only records too malformed to split are
/// dropped, with a warning.
pub async fn fetch_snapshots(family: AddressFamily, options: &DumpOptions) -> Result<Vec<Snapshot>> {
    let socket = DiagSocket::new()?;
    let seq = socket.next_seq();
    let pid = socket.pid();

    socket.send(&build_dump_request(family, seq)).await?;

    let mut snapshots = Vec::new();
    let mut more = true;
    while more {
        let buf = socket.recv_msg().await?;
        for msg in MessageIter::new(&buf) {
            let msg = msg?;
            let (accepted, still_more) =
                super::message::classify(&msg, seq, pid, options.kernel_error_policy)?;
            more = still_more;
            let Some(msg) = accepted else {
                if !more {
                    break;
                }
                continue;
            };

            let Some(record) = RawRecord::from_message(msg, options.skip_local)? else {
                continue;
            };
            match snapshot::decode(&record) {
                Ok((_, snap)) => snapshots.push(snap),
                Err(e) => warn!(error = %e, "dropping undecodable record"),
            }
        }
    }

    debug!(family = ?family, count = snapshots.len(), "dump complete");
    Ok(snapshots)
}
