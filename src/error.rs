//! Error taxonomy for the stack.
//!
//! No condition in this layer terminates the process: malformed or
//! unverifiable input is dropped where it arrives, and only the send path
//! surfaces failures to the caller.

use std::net::Ipv4Addr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    /// Header shorter than its minimum or internally inconsistent.
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),

    /// Stored checksum does not verify. Dropped silently by receivers.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The forwarding table has no entry covering the destination.
    #[error("no route to {0}")]
    NoRoute(Ipv4Addr),

    /// A forwarding-table entry string did not parse as `a.b.c.d/n`.
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),
}
