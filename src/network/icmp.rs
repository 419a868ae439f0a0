//! ICMP message codec.
//!
//! The only ICMP message this stack originates is Time Exceeded (type 11,
//! code 0), sent back toward the source of a datagram whose TTL ran out while
//! being routed.

use byteorder::{BigEndian, ByteOrder};

use crate::error::StackError;
use crate::network::checksum;

const ICMP_HEADER_LEN: usize = 8;

/// How much of the offending datagram a Time Exceeded message quotes:
/// the IP header plus the first 8 payload bytes.
const TIME_EXCEEDED_QUOTE_LEN: usize = 28;

pub const ICMP_TYPE_TIME_EXCEEDED: u8 = 11;

/// The standard 8-byte ICMP header (RFC 792).
#[derive(Debug, Clone, Copy)]
pub struct IcmpHeader {
    pub msg_type: u8,
    pub msg_code: u8,
    pub checksum: u16,
    /// Unused for Time Exceeded; left zero.
    pub rest: [u8; 4],
}

impl IcmpHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self, StackError> {
        if data.len() < ICMP_HEADER_LEN {
            return Err(StackError::MalformedHeader(
                "ICMP header shorter than 8 bytes",
            ));
        }

        Ok(IcmpHeader {
            msg_type: data[0],
            msg_code: data[1],
            checksum: BigEndian::read_u16(&data[2..4]),
            rest: [data[4], data[5], data[6], data[7]],
        })
    }

    pub fn to_bytes(&self) -> [u8; ICMP_HEADER_LEN] {
        let mut bytes = [0u8; ICMP_HEADER_LEN];
        bytes[0] = self.msg_type;
        bytes[1] = self.msg_code;
        BigEndian::write_u16(&mut bytes[2..4], self.checksum);
        bytes[4..8].copy_from_slice(&self.rest);
        bytes
    }

    pub fn is_time_exceeded(&self) -> bool {
        self.msg_type == ICMP_TYPE_TIME_EXCEEDED
    }
}

/// Build a Time Exceeded message quoting the first 28 bytes of the
/// unmodified datagram that exhausted its TTL. The checksum covers the whole
/// message.
pub fn build_time_exceeded(original_datagram: &[u8]) -> Vec<u8> {
    let quote_len = original_datagram.len().min(TIME_EXCEEDED_QUOTE_LEN);
    let quoted = &original_datagram[..quote_len];

    let header = IcmpHeader {
        msg_type: ICMP_TYPE_TIME_EXCEEDED,
        msg_code: 0,
        checksum: 0,
        rest: [0; 4],
    };

    let mut message = Vec::with_capacity(ICMP_HEADER_LEN + quote_len);
    message.extend_from_slice(&header.to_bytes());
    message.extend_from_slice(quoted);

    let csum = checksum(&message);
    BigEndian::write_u16(&mut message[2..4], csum);
    message
}
