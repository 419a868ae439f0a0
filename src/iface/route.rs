//! Forwarding table with longest-prefix-match resolution.

use std::net::Ipv4Addr;

use crate::error::StackError;

/// One `(prefix, next_hop)` forwarding entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub prefix: Ipv4Addr,
    pub prefix_len: u8,
    pub next_hop: Ipv4Addr,
}

impl RouteEntry {
    /// Parse an entry from `"a.b.c.d/n"` notation.
    pub fn from_cidr(cidr: &str, next_hop: Ipv4Addr) -> Result<Self, StackError> {
        let invalid = || StackError::InvalidCidr(cidr.to_string());
        let (addr, len) = cidr.split_once('/').ok_or_else(invalid)?;
        let prefix: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = len.parse().map_err(|_| invalid())?;
        if prefix_len > 32 {
            return Err(invalid());
        }
        Ok(RouteEntry {
            prefix,
            prefix_len,
            next_hop,
        })
    }

    /// True when the leading `prefix_len` bits of `dst` equal the prefix.
    fn matches(&self, dst: Ipv4Addr) -> bool {
        if self.prefix_len == 0 {
            return true;
        }
        let shift = 32 - self.prefix_len as u32;
        (u32::from(dst) >> shift) == (u32::from(self.prefix) >> shift)
    }
}

/// Ordered set of forwarding entries. Resolution picks the longest matching
/// prefix; ties go to the entry inserted first.
#[derive(Debug, Default)]
pub struct ForwardingTable {
    entries: Vec<RouteEntry>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        ForwardingTable::default()
    }

    /// Replace the table wholesale.
    pub fn set_routes(&mut self, entries: Vec<RouteEntry>) {
        self.entries = entries;
    }

    /// Next hop for `dst`, or `None` when no entry covers it. An unresolved
    /// destination is undeliverable, never a crash.
    pub fn resolve(&self, dst: Ipv4Addr) -> Option<Ipv4Addr> {
        let mut best: Option<&RouteEntry> = None;
        for entry in &self.entries {
            if !entry.matches(dst) {
                continue;
            }
            // Strictly greater, so the first match wins among equal lengths.
            match best {
                Some(b) if entry.prefix_len <= b.prefix_len => {}
                _ => best = Some(entry),
            }
        }
        best.map(|e| e.next_hop)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(172, 16, 0, last)
    }

    fn table(routes: &[(&str, Ipv4Addr)]) -> ForwardingTable {
        let mut t = ForwardingTable::new();
        t.set_routes(
            routes
                .iter()
                .map(|(cidr, h)| RouteEntry::from_cidr(cidr, *h).unwrap())
                .collect(),
        );
        t
    }

    #[test]
    fn longest_prefix_wins() {
        let t = table(&[
            ("10.0.0.0/8", hop(1)),
            ("10.1.0.0/16", hop(2)),
            ("10.1.2.0/24", hop(3)),
        ]);
        assert_eq!(t.resolve(Ipv4Addr::new(10, 1, 2, 9)), Some(hop(3)));
        assert_eq!(t.resolve(Ipv4Addr::new(10, 1, 9, 9)), Some(hop(2)));
        assert_eq!(t.resolve(Ipv4Addr::new(10, 9, 9, 9)), Some(hop(1)));
    }

    #[test]
    fn equal_length_tie_goes_to_first_inserted() {
        let t = table(&[("10.0.0.0/8", hop(1)), ("10.0.0.0/8", hop(2))]);
        assert_eq!(t.resolve(Ipv4Addr::new(10, 5, 5, 5)), Some(hop(1)));
    }

    #[test]
    fn no_match_returns_none() {
        let t = table(&[("10.0.0.0/8", hop(1))]);
        assert_eq!(t.resolve(Ipv4Addr::new(192, 168, 0, 1)), None);
    }

    #[test]
    fn zero_length_prefix_is_default_route() {
        let t = table(&[("0.0.0.0/0", hop(1)), ("10.0.0.0/8", hop(2))]);
        assert_eq!(t.resolve(Ipv4Addr::new(192, 168, 0, 1)), Some(hop(1)));
        assert_eq!(t.resolve(Ipv4Addr::new(10, 0, 0, 1)), Some(hop(2)));
    }

    #[test]
    fn set_routes_replaces_table() {
        let mut t = table(&[("10.0.0.0/8", hop(1))]);
        t.set_routes(vec![RouteEntry::from_cidr("192.168.0.0/16", hop(2)).unwrap()]);
        assert_eq!(t.resolve(Ipv4Addr::new(10, 0, 0, 1)), None);
        assert_eq!(t.resolve(Ipv4Addr::new(192, 168, 1, 1)), Some(hop(2)));
    }

    #[test]
    fn from_cidr_rejects_garbage() {
        assert!(RouteEntry::from_cidr("10.0.0.0", hop(1)).is_err());
        assert!(RouteEntry::from_cidr("10.0.0.0/33", hop(1)).is_err());
        assert!(RouteEntry::from_cidr("not-an-addr/8", hop(1)).is_err());
        assert!(RouteEntry::from_cidr("10.0.0.0/x", hop(1)).is_err());
    }

    #[test]
    fn prefix_match_checks_declared_bits_only() {
        // /24 must not match when the third octet differs.
        let t = table(&[("10.0.1.0/24", hop(1))]);
        assert_eq!(t.resolve(Ipv4Addr::new(10, 0, 2, 1)), None);
        assert_eq!(t.resolve(Ipv4Addr::new(10, 0, 1, 200)), Some(hop(1)));
    }
}
