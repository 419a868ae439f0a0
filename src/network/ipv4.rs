//! IPv4 header codec.
//!
//! The stack carries only fixed 20-byte headers: version 4, IHL 5, no
//! options. Datagrams arriving with options are parsed (the payload offset
//! honors the IHL field) but are re-emitted with a plain 20-byte header when
//! forwarded.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};

use crate::error::StackError;
use crate::network::checksum;

pub const IPV4_HEADER_LEN: usize = 20;
pub const DEFAULT_TTL: u8 = 64;

const IPV4_VERSION: u8 = 4;
const DEFAULT_IHL: u8 = 5;

/// IP protocol numbers understood by this stack.
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
}

/// The standard 20-byte IPv4 header (RFC 791), all fields big-endian on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8,
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags_frag_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

impl Ipv4Header {
    /// Header for a locally originated datagram: TOS 0, no fragmentation.
    /// The checksum is left zero until [`Ipv4Header::fill_checksum`].
    pub fn new(
        id: u16,
        ttl: u8,
        protocol: u8,
        src_addr: Ipv4Addr,
        dst_addr: Ipv4Addr,
        payload_len: u16,
    ) -> Self {
        Ipv4Header {
            version: IPV4_VERSION,
            ihl: DEFAULT_IHL,
            tos: 0,
            total_len: IPV4_HEADER_LEN as u16 + payload_len,
            id,
            flags_frag_offset: 0,
            ttl,
            protocol,
            checksum: 0,
            src_addr,
            dst_addr,
        }
    }

    /// Parse an IPv4 header from the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, StackError> {
        if data.len() < IPV4_HEADER_LEN {
            return Err(StackError::MalformedHeader(
                "IPv4 header shorter than 20 bytes",
            ));
        }

        let version = (data[0] & 0xF0) >> 4;
        if version != IPV4_VERSION {
            return Err(StackError::MalformedHeader("not an IPv4 datagram"));
        }

        let ihl = data[0] & 0x0F;
        if ihl < DEFAULT_IHL {
            return Err(StackError::MalformedHeader("IPv4 IHL below 5"));
        }
        if data.len() < ihl as usize * 4 {
            return Err(StackError::MalformedHeader(
                "IPv4 datagram shorter than its IHL",
            ));
        }

        let total_len = BigEndian::read_u16(&data[2..4]);
        if (total_len as usize) < ihl as usize * 4 {
            return Err(StackError::MalformedHeader(
                "IPv4 total length shorter than header",
            ));
        }

        Ok(Ipv4Header {
            version,
            ihl,
            tos: data[1],
            total_len,
            id: BigEndian::read_u16(&data[4..6]),
            flags_frag_offset: BigEndian::read_u16(&data[6..8]),
            ttl: data[8],
            protocol: data[9],
            checksum: BigEndian::read_u16(&data[10..12]),
            src_addr: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            dst_addr: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
        })
    }

    /// Serialize to a 20-byte header ready for transmission.
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];
        bytes[0] = (self.version << 4) | self.ihl;
        bytes[1] = self.tos;
        BigEndian::write_u16(&mut bytes[2..4], self.total_len);
        BigEndian::write_u16(&mut bytes[4..6], self.id);
        BigEndian::write_u16(&mut bytes[6..8], self.flags_frag_offset);
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        BigEndian::write_u16(&mut bytes[10..12], self.checksum);
        bytes[12..16].copy_from_slice(&self.src_addr.octets());
        bytes[16..20].copy_from_slice(&self.dst_addr.octets());
        bytes
    }

    /// Recompute the checksum over the header with the checksum field zeroed
    /// and store the result. Call after any field change.
    pub fn fill_checksum(&mut self) {
        self.checksum = 0;
        self.checksum = checksum(&self.to_bytes());
    }

    /// True when the stored checksum matches a recomputation over the header.
    pub fn verify_checksum(&self) -> bool {
        let mut copy = self.clone();
        copy.checksum = 0;
        checksum(&copy.to_bytes()) == self.checksum
    }

    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    pub fn payload_len(&self) -> usize {
        self.total_len as usize - self.header_len()
    }
}
