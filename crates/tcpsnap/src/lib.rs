//! TCP connection snapshots via NETLINK_SOCK_DIAG (inet_diag).
//!
//! This crate dumps the kernel's TCP socket table over the sock_diag
//! netlink interface and decodes each response message into an immutable
//! [`Snapshot`]: the fixed diagnostic header plus whatever extension
//! attributes the kernel attached (tcp_info, memory counters,
//! congestion-control state, and so on).
//!
//! Decoding is size-tolerant. Kernels of different generations emit
//! different struct sizes for the same attribute; payloads shorter or
//! longer than expected still decode, and the affected field is flagged
//! in the snapshot's `not_fully_parsed` set instead of failing the
//! record. Protocol-level violations (sequence or port-ID mismatches,
//! truncated framing) abort the dump outright.
//!
//! # Example
//!
//! ```no_run
//! use tcpsnap::{AddressFamily, DumpOptions, fetch_snapshots};
//!
//! # async fn example() -> tcpsnap::Result<()> {
//! let snapshots = fetch_snapshots(AddressFamily::Inet, &DumpOptions::default()).await?;
//! for snap in &snapshots {
//!     if let Some(diag) = &snap.inet_diag {
//!         println!("{} -> {}", diag.src_ip(), diag.dst_ip());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod attr;
pub mod codec;
pub mod dump;
pub mod error;
pub mod inetdiag;
pub mod message;
pub mod record;
pub mod snapshot;
pub mod socket;
pub mod tcp;

#[cfg(test)]
pub(crate) mod fixtures;

pub use dump::{DumpOptions, build_dump_request, fetch_snapshots};
pub use error::{Error, Result};
pub use inetdiag::{AddressFamily, InetDiagMsg, Protocol, TcpState};
pub use message::{KernelErrorPolicy, MessageIter, RawMessage, classify};
pub use record::{Metadata, RawRecord};
pub use snapshot::{AttrSet, Snapshot, decode};
pub use socket::DiagSocket;
pub use tcp::TcpInfo;
