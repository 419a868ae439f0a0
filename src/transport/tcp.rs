//! TCP segment codec.
//!
//! Fixed 20-byte headers, big-endian fields. The checksum is computed over a
//! pseudo-header (source, destination, zero byte, protocol, segment length)
//! concatenated with the whole segment; a segment carrying a valid checksum
//! sums to zero with the stored field included.

use std::net::Ipv4Addr;

use crate::error::StackError;
use crate::network::checksum;
use crate::network::ipv4::protocol;

pub const TCP_HEADER_LEN: usize = 20;

/// Largest payload carried by one segment.
pub const MSS: usize = 1460;

/// Receive window advertised in every outgoing segment. Flow control on the
/// send side is governed by the congestion window, not by this field.
const ADVERTISED_WINDOW: u16 = 0xffff;

/// TCP flag bits within the low nine bits of the offset/flags word.
pub mod flags {
    pub const FIN: u16 = 0x0001;
    pub const SYN: u16 = 0x0002;
    pub const RST: u16 = 0x0004;
    pub const PSH: u16 = 0x0008;
    pub const ACK: u16 = 0x0010;
    pub const URG: u16 = 0x0020;
}

/// The standard 20-byte TCP header (RFC 793).
#[derive(Debug, Clone, Copy)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_number: u32,
    pub ack_number: u32,
    /// Data offset (4 bits) + reserved (3 bits) + flags (9 bits).
    pub data_offset_and_flags: u16,
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_ptr: u16,
}

impl TcpHeader {
    /// Header with a standard 5-word data offset and the given flags.
    pub fn new(src_port: u16, dst_port: u16, seq_number: u32, ack_number: u32, flag_bits: u16) -> Self {
        TcpHeader {
            src_port,
            dst_port,
            seq_number,
            ack_number,
            data_offset_and_flags: (5 << 12) | (flag_bits & 0x01ff),
            window_size: ADVERTISED_WINDOW,
            checksum: 0,
            urgent_ptr: 0,
        }
    }

    /// Parse a TCP header from the start of a segment.
    pub fn from_bytes(data: &[u8]) -> Result<Self, StackError> {
        if data.len() < TCP_HEADER_LEN {
            return Err(StackError::MalformedHeader(
                "TCP header shorter than 20 bytes",
            ));
        }

        let header = TcpHeader {
            src_port: u16::from_be_bytes([data[0], data[1]]),
            dst_port: u16::from_be_bytes([data[2], data[3]]),
            seq_number: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ack_number: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            data_offset_and_flags: u16::from_be_bytes([data[12], data[13]]),
            window_size: u16::from_be_bytes([data[14], data[15]]),
            checksum: u16::from_be_bytes([data[16], data[17]]),
            urgent_ptr: u16::from_be_bytes([data[18], data[19]]),
        };

        if header.data_offset() < TCP_HEADER_LEN {
            return Err(StackError::MalformedHeader("TCP data offset below 5"));
        }
        if data.len() < header.data_offset() {
            return Err(StackError::MalformedHeader(
                "TCP segment shorter than its data offset",
            ));
        }
        Ok(header)
    }

    pub fn to_bytes(&self) -> [u8; TCP_HEADER_LEN] {
        let mut bytes = [0u8; TCP_HEADER_LEN];
        bytes[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.dst_port.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.seq_number.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.ack_number.to_be_bytes());
        bytes[12..14].copy_from_slice(&self.data_offset_and_flags.to_be_bytes());
        bytes[14..16].copy_from_slice(&self.window_size.to_be_bytes());
        bytes[16..18].copy_from_slice(&self.checksum.to_be_bytes());
        bytes[18..20].copy_from_slice(&self.urgent_ptr.to_be_bytes());
        bytes
    }

    /// Payload offset in bytes (`4 * data offset words`).
    pub fn data_offset(&self) -> usize {
        ((self.data_offset_and_flags >> 12) as usize) * 4
    }

    /// The nine flag bits.
    pub fn flag_bits(&self) -> u16 {
        self.data_offset_and_flags & 0x01ff
    }

    pub fn is_syn(&self) -> bool {
        self.flag_bits() & flags::SYN != 0
    }

    pub fn is_ack(&self) -> bool {
        self.flag_bits() & flags::ACK != 0
    }

    pub fn is_fin(&self) -> bool {
        self.flag_bits() & flags::FIN != 0
    }
}

/// Checksum of `segment` under the IPv4 pseudo-header. Valid segments
/// (checksum field populated) produce zero.
pub fn segment_checksum(src_addr: Ipv4Addr, dst_addr: Ipv4Addr, segment: &[u8]) -> u16 {
    let mut buf = Vec::with_capacity(12 + segment.len());
    buf.extend_from_slice(&src_addr.octets());
    buf.extend_from_slice(&dst_addr.octets());
    buf.push(0);
    buf.push(protocol::TCP);
    buf.extend_from_slice(&(segment.len() as u16).to_be_bytes());
    buf.extend_from_slice(segment);
    checksum(&buf)
}

/// Zero the checksum field, compute over the pseudo-header and segment, and
/// store the result.
pub fn fill_checksum(segment: &mut [u8], src_addr: Ipv4Addr, dst_addr: Ipv4Addr) {
    segment[16..18].copy_from_slice(&[0, 0]);
    let csum = segment_checksum(src_addr, dst_addr, segment);
    segment[16..18].copy_from_slice(&csum.to_be_bytes());
}

pub fn verify_checksum(segment: &[u8], src_addr: Ipv4Addr, dst_addr: Ipv4Addr) -> bool {
    segment_checksum(src_addr, dst_addr, segment) == 0
}

/// Assemble a complete segment (header + payload) with its checksum filled.
pub fn build_segment(
    src_port: u16,
    dst_port: u16,
    seq_number: u32,
    ack_number: u32,
    flag_bits: u16,
    payload: &[u8],
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
) -> Vec<u8> {
    let header = TcpHeader::new(src_port, dst_port, seq_number, ack_number, flag_bits);
    let mut segment = Vec::with_capacity(TCP_HEADER_LEN + payload.len());
    segment.extend_from_slice(&header.to_bytes());
    segment.extend_from_slice(payload);
    fill_checksum(&mut segment, src_addr, dst_addr);
    segment
}
