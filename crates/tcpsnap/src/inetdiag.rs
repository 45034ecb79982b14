//! inet_diag kernel ABI structures and attribute constants.
//!
//! Every struct here mirrors a kernel wire layout byte for byte: `repr(C)`,
//! fixed-width fields, no padding. Decoding goes through zerocopy's checked
//! conversions, never pointer casts, so a layout mistake fails to compile
//! or to convert instead of silently corrupting fields.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};

/// Netlink message type carrying a sock_diag response.
pub const SOCK_DIAG_BY_FAMILY: u16 = 20;

// inet_diag attribute types (INET_DIAG_*).
pub const INET_DIAG_NONE: u16 = 0;
pub const INET_DIAG_MEMINFO: u16 = 1;
pub const INET_DIAG_INFO: u16 = 2;
pub const INET_DIAG_VEGASINFO: u16 = 3;
pub const INET_DIAG_CONG: u16 = 4;
pub const INET_DIAG_TOS: u16 = 5;
pub const INET_DIAG_TCLASS: u16 = 6;
pub const INET_DIAG_SKMEMINFO: u16 = 7;
pub const INET_DIAG_SHUTDOWN: u16 = 8;
pub const INET_DIAG_DCTCPINFO: u16 = 9;
pub const INET_DIAG_PROTOCOL: u16 = 10;
pub const INET_DIAG_SKV6ONLY: u16 = 11;
pub const INET_DIAG_LOCALS: u16 = 12;
pub const INET_DIAG_PEERS: u16 = 13;
pub const INET_DIAG_PAD: u16 = 14;
pub const INET_DIAG_MARK: u16 = 15;
pub const INET_DIAG_BBRINFO: u16 = 16;
pub const INET_DIAG_CLASS_ID: u16 = 17;
pub const INET_DIAG_MD5SIG: u16 = 18;

/// Highest attribute type this crate knows about.
pub const INET_DIAG_MAX: u16 = INET_DIAG_MD5SIG;

/// Address family for a dump request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4.
    Inet,
    /// IPv6.
    Inet6,
}

impl AddressFamily {
    /// Get the AF_* value.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Inet => libc::AF_INET as u8,
            Self::Inet6 => libc::AF_INET6 as u8,
        }
    }
}

/// TCP socket states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TcpState {
    /// Unknown state.
    Unknown = 0,
    /// Connection established.
    Established = 1,
    /// SYN sent, waiting for matching SYN.
    SynSent = 2,
    /// SYN received, waiting for ACK.
    SynRecv = 3,
    /// FIN sent, waiting for FIN or FIN-ACK.
    FinWait1 = 4,
    /// FIN received, waiting for FIN.
    FinWait2 = 5,
    /// In TIME-WAIT state.
    TimeWait = 6,
    /// Socket is closed.
    Close = 7,
    /// FIN received, close pending.
    CloseWait = 8,
    /// Close wait acknowledged, waiting for FIN.
    LastAck = 9,
    /// Socket is listening.
    Listen = 10,
    /// Both sides sent FIN simultaneously.
    Closing = 11,
    /// New SYN received (kernel only).
    NewSynRecv = 12,
}

impl TcpState {
    /// Parse from a raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Established,
            2 => Self::SynSent,
            3 => Self::SynRecv,
            4 => Self::FinWait1,
            5 => Self::FinWait2,
            6 => Self::TimeWait,
            7 => Self::Close,
            8 => Self::CloseWait,
            9 => Self::LastAck,
            10 => Self::Listen,
            11 => Self::Closing,
            12 => Self::NewSynRecv,
            _ => Self::Unknown,
        }
    }

    /// Get the state name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Established => "ESTAB",
            Self::SynSent => "SYN-SENT",
            Self::SynRecv => "SYN-RECV",
            Self::FinWait1 => "FIN-WAIT-1",
            Self::FinWait2 => "FIN-WAIT-2",
            Self::TimeWait => "TIME-WAIT",
            Self::Close => "UNCONN",
            Self::CloseWait => "CLOSE-WAIT",
            Self::LastAck => "LAST-ACK",
            Self::Listen => "LISTEN",
            Self::Closing => "CLOSING",
            Self::NewSynRecv => "NEW-SYN-RECV",
        }
    }

    /// Bitmask over all states, for dump requests.
    pub const fn all_mask() -> u32 {
        (1 << 13) - 1
    }
}

/// Transport protocol number, as reported by INET_DIAG_PROTOCOL.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Protocol(pub u8);

impl Protocol {
    /// Get the protocol name.
    pub fn name(&self) -> &'static str {
        match self.0 as i32 {
            libc::IPPROTO_TCP => "tcp",
            libc::IPPROTO_UDP => "udp",
            132 => "sctp",
            33 => "dccp",
            libc::IPPROTO_RAW => "raw",
            _ => "unknown",
        }
    }
}

/// Socket identity within an inet_diag_msg (mirrors struct inet_diag_sockid).
///
/// Ports are big endian on the wire; addresses are 16-byte blocks with IPv4
/// occupying the leading 4 bytes.
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
)]
pub struct InetDiagSockId {
    /// Source port (big endian).
    pub sport: [u8; 2],
    /// Destination port (big endian).
    pub dport: [u8; 2],
    /// Source address.
    pub src: [u8; 16],
    /// Destination address.
    pub dst: [u8; 16],
    /// Interface index.
    pub interface: u32,
    /// Socket cookie (two native-endian words).
    pub cookie: [u32; 2],
}

impl InetDiagSockId {
    /// Source port in host order.
    pub fn sport(&self) -> u16 {
        u16::from_be_bytes(self.sport)
    }

    /// Destination port in host order.
    pub fn dport(&self) -> u16 {
        u16::from_be_bytes(self.dport)
    }

    /// Socket cookie as a single value.
    pub fn cookie(&self) -> u64 {
        (self.cookie[1] as u64) << 32 | self.cookie[0] as u64
    }
}

/// Fixed diagnostic header (mirrors struct inet_diag_msg).
///
/// This is the 72-byte block at the start of every SOCK_DIAG_BY_FAMILY
/// payload. Records keep the raw bytes; this parsed form is produced on
/// demand via [`InetDiagMsg::parse`].
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
)]
pub struct InetDiagMsg {
    /// Address family (AF_INET / AF_INET6).
    pub family: u8,
    /// Protocol state (TCP state for TCP sockets).
    pub state: u8,
    /// Active timer kind.
    pub timer: u8,
    /// Retransmit count for the active timer.
    pub retrans: u8,
    /// Socket identity.
    pub id: InetDiagSockId,
    /// Timer expiry (ms).
    pub expires: u32,
    /// Receive queue length.
    pub rqueue: u32,
    /// Send queue length.
    pub wqueue: u32,
    /// Socket owner UID.
    pub uid: u32,
    /// Inode number.
    pub inode: u32,
}

impl InetDiagMsg {
    /// Wire size of the header.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Parse the header from the leading bytes of a message payload.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::read_from_prefix(raw)
            .map(|(msg, _)| msg)
            .map_err(|_| Error::HeaderTooShort {
                expected: Self::SIZE,
                actual: raw.len(),
            })
    }

    /// TCP state of the socket.
    pub fn tcp_state(&self) -> TcpState {
        TcpState::from_u8(self.state)
    }

    /// Source address, honoring the address family.
    pub fn src_ip(&self) -> IpAddr {
        ip_from_bytes(self.family, &self.id.src)
    }

    /// Destination address, honoring the address family.
    pub fn dst_ip(&self) -> IpAddr {
        ip_from_bytes(self.family, &self.id.dst)
    }

    /// Check whether either endpoint is loopback, link-local, multicast,
    /// or unspecified.
    pub fn is_local(&self) -> bool {
        is_local(self.src_ip()) || is_local(self.dst_ip())
    }
}

fn ip_from_bytes(family: u8, bytes: &[u8; 16]) -> IpAddr {
    if family == libc::AF_INET as u8 {
        IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
    } else {
        IpAddr::V6(Ipv6Addr::from(*bytes))
    }
}

/// Check whether an address is loopback, link-local unicast, multicast,
/// or unspecified.
pub fn is_local(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_link_local() || v4.is_multicast() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || v6.is_multicast()
                || v6.is_unspecified()
        }
    }
}

/// Dump request body (mirrors struct inet_diag_req_v2).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct InetDiagReqV2 {
    /// Address family to dump.
    pub sdiag_family: u8,
    /// Transport protocol (IPPROTO_TCP).
    pub sdiag_protocol: u8,
    /// Requested extension bitmask (1 << (INET_DIAG_* - 1)).
    pub idiag_ext: u8,
    /// Padding, must be zero.
    pub pad: u8,
    /// Socket state bitmask to match.
    pub idiag_states: u32,
    /// Socket identity filter (zeroed for a full dump).
    pub id: InetDiagSockId,
}

impl InetDiagReqV2 {
    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }
}

/// Memory usage for a socket (mirrors struct inet_diag_meminfo).
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
)]
pub struct MemInfo {
    /// Receive queue memory.
    pub rmem: u32,
    /// Send queue memory.
    pub wmem: u32,
    /// Forward-allocated memory.
    pub fmem: u32,
    /// Transmit queue memory.
    pub tmem: u32,
}

/// Socket memory counters (mirrors the SK_MEMINFO_* array).
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
)]
pub struct SockMemInfo {
    /// Receive memory allocated.
    pub rmem_alloc: u32,
    /// Receive buffer size.
    pub rcvbuf: u32,
    /// Write memory allocated.
    pub wmem_alloc: u32,
    /// Send buffer size.
    pub sndbuf: u32,
    /// Forward alloc.
    pub fwd_alloc: u32,
    /// Write memory queued.
    pub wmem_queued: u32,
    /// Option memory.
    pub optmem: u32,
    /// Backlog.
    pub backlog: u32,
    /// Packets dropped.
    pub drops: u32,
}

/// Vegas congestion-control info (mirrors struct tcpvegas_info).
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
)]
pub struct VegasInfo {
    /// Whether Vegas is enabled.
    pub enabled: u32,
    /// RTT sample count.
    pub rtt_count: u32,
    /// Last RTT (usec).
    pub rtt: u32,
    /// Minimum RTT (usec).
    pub min_rtt: u32,
}

/// DCTCP congestion-control info (mirrors struct tcp_dctcp_info).
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
)]
pub struct DctcpInfo {
    /// Whether DCTCP is enabled.
    pub enabled: u16,
    /// CE state.
    pub ce_state: u16,
    /// Current alpha estimate.
    pub alpha: u32,
    /// ECN-marked bytes.
    pub ab_ecn: u32,
    /// Total acked bytes.
    pub ab_tot: u32,
}

/// BBR congestion-control info (mirrors struct tcp_bbr_info).
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
)]
pub struct BbrInfo {
    /// Bandwidth estimate, low word (bytes/sec).
    pub bw_lo: u32,
    /// Bandwidth estimate, high word.
    pub bw_hi: u32,
    /// Minimum RTT (usec).
    pub min_rtt: u32,
    /// Pacing gain shifted left 8 bits.
    pub pacing_gain: u32,
    /// Cwnd gain shifted left 8 bits.
    pub cwnd_gain: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes_match_kernel_abi() {
        assert_eq!(std::mem::size_of::<InetDiagSockId>(), 48);
        assert_eq!(InetDiagMsg::SIZE, 72);
        assert_eq!(std::mem::size_of::<InetDiagReqV2>(), 56);
        assert_eq!(std::mem::size_of::<MemInfo>(), 16);
        assert_eq!(std::mem::size_of::<SockMemInfo>(), 36);
        assert_eq!(std::mem::size_of::<VegasInfo>(), 16);
        assert_eq!(std::mem::size_of::<DctcpInfo>(), 16);
        assert_eq!(std::mem::size_of::<BbrInfo>(), 20);
    }

    #[test]
    fn test_parse_hand_encoded_header() {
        let mut raw = Vec::new();
        raw.push(libc::AF_INET as u8); // family
        raw.push(1); // state: ESTABLISHED
        raw.push(0); // timer
        raw.push(3); // retrans
        raw.extend_from_slice(&443u16.to_be_bytes()); // sport
        raw.extend_from_slice(&52000u16.to_be_bytes()); // dport
        let mut src = [0u8; 16];
        src[..4].copy_from_slice(&[93, 184, 216, 34]);
        raw.extend_from_slice(&src);
        let mut dst = [0u8; 16];
        dst[..4].copy_from_slice(&[203, 0, 113, 9]);
        raw.extend_from_slice(&dst);
        raw.extend_from_slice(&2u32.to_ne_bytes()); // interface
        raw.extend_from_slice(&0x1111u32.to_ne_bytes()); // cookie lo
        raw.extend_from_slice(&0x2222u32.to_ne_bytes()); // cookie hi
        raw.extend_from_slice(&0u32.to_ne_bytes()); // expires
        raw.extend_from_slice(&10u32.to_ne_bytes()); // rqueue
        raw.extend_from_slice(&20u32.to_ne_bytes()); // wqueue
        raw.extend_from_slice(&1000u32.to_ne_bytes()); // uid
        raw.extend_from_slice(&99999u32.to_ne_bytes()); // inode
        assert_eq!(raw.len(), InetDiagMsg::SIZE);

        let msg = InetDiagMsg::parse(&raw).unwrap();
        assert_eq!(msg.tcp_state(), TcpState::Established);
        assert_eq!(msg.retrans, 3);
        assert_eq!(msg.id.sport(), 443);
        assert_eq!(msg.id.dport(), 52000);
        assert_eq!(msg.src_ip(), "93.184.216.34".parse::<IpAddr>().unwrap());
        assert_eq!(msg.dst_ip(), "203.0.113.9".parse::<IpAddr>().unwrap());
        assert_eq!(msg.id.cookie(), 0x2222_0000_1111);
        assert_eq!(msg.uid, 1000);
        assert_eq!(msg.inode, 99999);
        assert!(!msg.is_local());
    }

    #[test]
    fn test_parse_short_header_fails() {
        let err = InetDiagMsg::parse(&[0u8; 40]).unwrap_err();
        assert!(matches!(
            err,
            Error::HeaderTooShort {
                expected: 72,
                actual: 40
            }
        ));
    }

    #[test]
    fn test_is_local() {
        for addr in ["127.0.0.1", "0.0.0.0", "224.0.0.1", "169.254.1.1", "::1", "fe80::1", "ff02::1", "::"] {
            assert!(is_local(addr.parse().unwrap()), "{addr}");
        }
        for addr in ["93.184.216.34", "10.0.0.1", "2001:db8::1"] {
            assert!(!is_local(addr.parse().unwrap()), "{addr}");
        }
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(Protocol(6).name(), "tcp");
        assert_eq!(Protocol(17).name(), "udp");
        assert_eq!(Protocol(250).name(), "unknown");
    }

    #[test]
    fn test_tcp_state_roundtrip() {
        assert_eq!(TcpState::from_u8(10), TcpState::Listen);
        assert_eq!(TcpState::from_u8(10).name(), "LISTEN");
        assert_eq!(TcpState::from_u8(200), TcpState::Unknown);
        assert_eq!(TcpState::all_mask(), 0x1fff);
    }
}
