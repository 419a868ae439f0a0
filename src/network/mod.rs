//! Network layer: IPv4 and ICMP wire formats.

pub mod icmp;
pub mod ipv4;

pub use icmp::{IcmpHeader, ICMP_TYPE_TIME_EXCEEDED};
pub use ipv4::{protocol, Ipv4Header};

/// Calculate the Internet checksum (RFC 1071).
///
/// Sums the data in 16-bit big-endian chunks, folds the carry bits back into
/// the sum, and returns the one's complement. An odd trailing byte is padded
/// with zero. Used for the IPv4 header, ICMP messages, and (with a
/// pseudo-header prefix) TCP segments.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = 0u32;

    for chunk in data.chunks_exact(2) {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }

    if data.len() % 2 != 0 {
        if let Some(&last_byte) = data.last() {
            sum += (last_byte as u32) << 8;
        }
    }

    while (sum >> 16) > 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_length_pads_with_zero() {
        assert_eq!(checksum(&[0xab]), checksum(&[0xab, 0x00]));
    }

    #[test]
    fn data_with_inserted_checksum_sums_to_zero() {
        let mut data = vec![0x12, 0x34, 0x56, 0x78, 0x00, 0x00, 0x9a, 0xbc];
        let csum = checksum(&data);
        data[4..6].copy_from_slice(&csum.to_be_bytes());
        assert_eq!(checksum(&data), 0);
    }

    #[test]
    fn carry_bits_are_folded() {
        // 0xffff + 0x0002 overflows; the carry folds back in: 0x0002.
        let data = [0xff, 0xff, 0x00, 0x02];
        assert_eq!(checksum(&data), !0x0002);
    }

    #[test]
    fn empty_input() {
        assert_eq!(checksum(&[]), 0xffff);
    }
}
