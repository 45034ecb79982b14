//! The kernel tcp_info structure.

use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// TCP connection state and counters (mirrors struct tcp_info).
///
/// The kernel has grown this structure release by release; the decoder
/// accepts any prefix of it and zero-fills the rest, so fields past what a
/// given kernel sends simply read as zero. This layout runs through
/// `tcpi_snd_wnd` (232 bytes).
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
pub struct TcpInfo {
    /// Connection state.
    pub state: u8,
    /// Congestion-avoidance state.
    pub ca_state: u8,
    /// Retransmit timer count.
    pub retransmits: u8,
    /// Zero-window probe count.
    pub probes: u8,
    /// Exponential backoff.
    pub backoff: u8,
    /// Negotiated TCP options.
    pub options: u8,
    /// Window scales: send in the high nibble, receive in the low.
    pub wscale: u8,
    /// Delivery-rate app-limited flag (low bit).
    pub app_limited: u8,

    /// Retransmission timeout (usec).
    pub rto: u32,
    /// Delayed-ACK timeout (usec).
    pub ato: u32,
    /// Send MSS.
    pub snd_mss: u32,
    /// Receive MSS.
    pub rcv_mss: u32,

    /// Unacknowledged packets.
    pub unacked: u32,
    /// SACKed packets.
    pub sacked: u32,
    /// Lost packets.
    pub lost: u32,
    /// Retransmitted packets in flight.
    pub retrans: u32,
    /// Forward-acknowledged packets.
    pub fackets: u32,

    /// Time since last data sent (ms).
    pub last_data_sent: u32,
    /// Time since last ACK sent (ms).
    pub last_ack_sent: u32,
    /// Time since last data received (ms).
    pub last_data_recv: u32,
    /// Time since last ACK received (ms).
    pub last_ack_recv: u32,

    /// Path MTU.
    pub pmtu: u32,
    /// Receive slow-start threshold.
    pub rcv_ssthresh: u32,
    /// Smoothed RTT (usec).
    pub rtt: u32,
    /// RTT variance (usec).
    pub rttvar: u32,
    /// Send slow-start threshold.
    pub snd_ssthresh: u32,
    /// Congestion window (packets).
    pub snd_cwnd: u32,
    /// Advertised MSS.
    pub advmss: u32,
    /// Reordering metric.
    pub reordering: u32,

    /// Receiver-side RTT estimate (usec).
    pub rcv_rtt: u32,
    /// Receive buffer space.
    pub rcv_space: u32,

    /// Total retransmits over the connection lifetime.
    pub total_retrans: u32,

    /// Pacing rate (bytes/sec).
    pub pacing_rate: u64,
    /// Maximum pacing rate (bytes/sec).
    pub max_pacing_rate: u64,
    /// Bytes acknowledged.
    pub bytes_acked: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Segments sent.
    pub segs_out: u32,
    /// Segments received.
    pub segs_in: u32,

    /// Bytes queued but not yet sent.
    pub notsent_bytes: u32,
    /// Minimum RTT (usec).
    pub min_rtt: u32,
    /// Data segments received.
    pub data_segs_in: u32,
    /// Data segments sent.
    pub data_segs_out: u32,

    /// Delivery rate (bytes/sec).
    pub delivery_rate: u64,

    /// Time busy sending (usec).
    pub busy_time: u64,
    /// Time limited by receive window (usec).
    pub rwnd_limited: u64,
    /// Time limited by send buffer (usec).
    pub sndbuf_limited: u64,

    /// Packets delivered.
    pub delivered: u32,
    /// Packets delivered with CE mark.
    pub delivered_ce: u32,

    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes retransmitted.
    pub bytes_retrans: u64,
    /// Duplicate SACKs received.
    pub dsack_dups: u32,
    /// Reordering events seen.
    pub reord_seen: u32,

    /// Out-of-order packets received.
    pub rcv_ooopack: u32,
    /// Peer's advertised receive window.
    pub snd_wnd: u32,
}

impl TcpInfo {
    /// Wire size of the full structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Send window scale (high nibble of wscale).
    pub fn snd_wscale(&self) -> u8 {
        self.wscale >> 4
    }

    /// Receive window scale (low nibble of wscale).
    pub fn rcv_wscale(&self) -> u8 {
        self.wscale & 0x0f
    }

    /// Convert to wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_matches_kernel_abi() {
        assert_eq!(TcpInfo::SIZE, 232);
    }

    #[test]
    fn test_wscale_nibbles() {
        let info = TcpInfo {
            wscale: 0x7a,
            ..Default::default()
        };
        assert_eq!(info.snd_wscale(), 7);
        assert_eq!(info.rcv_wscale(), 10);
    }
}
