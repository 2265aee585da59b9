//! IP Tree Builder for MMDB Format
//!
//! Builds the binary search tree of an IPv6 MMDB database. IPv4 networks live
//! under `::/96`; with aliasing enabled, the IPv4-mapped block
//! `::ffff:0:0/96` and the 6to4 block `2002::/16` point at that same subtree
//! so IPv4 lookups succeed through either form.

use std::io;

/// Networks that share the IPv4 subtree when aliasing is enabled
const ALIASED_NETWORKS: [(u128, u8); 2] = [
    (0xFFFF_0000_0000, 96),   // ::ffff:0:0/96
    (0x2002 << 112, 16),      // 2002::/16
];

/// Depth of the IPv4 subtree root (`::/96`)
const IPV4_SUBTREE_DEPTH: u8 = 96;

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Create from bit size
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            24 => Some(RecordSize::Bits24),
            28 => Some(RecordSize::Bits28),
            32 => Some(RecordSize::Bits32),
            _ => None,
        }
    }

    /// Number of bits in one record
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Largest value a record can hold
    fn max_value(self) -> u64 {
        (1u64 << self.bits()) - 1
    }
}

/// Result of inserting a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Every network of the range was stored
    Inserted,
    /// Some networks were stored, the rest lay inside an aliased network
    PartiallyAliased,
    /// Every network lay inside an aliased network; nothing was stored
    Aliased,
}

/// IP tree builder using arena allocation
pub struct IpTreeBuilder {
    /// All nodes in the tree (arena)
    nodes: Vec<Node>,
}

/// A node in the IP tree
#[derive(Debug, Clone)]
struct Node {
    /// Left child (bit 0)
    left: NodePointer,
    /// Right child (bit 1)
    right: NodePointer,
}

/// Node pointer - can point to another node, data, an alias, or be empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodePointer {
    /// Points to another node (value is node ID)
    Node(u32),
    /// Points to data section (data offset, prefix length).
    /// The prefix length only matters while building: a longer prefix
    /// always wins over a shorter one.
    Data(u32, u8),
    /// Shares the subtree rooted at the given node; never written through
    Alias(u32),
    /// Empty (not found marker)
    Empty,
}

impl IpTreeBuilder {
    /// Create an IPv6 tree, optionally aliasing IPv4-mapped and 6to4 space
    pub fn new(ipv4_aliasing: bool) -> Self {
        let mut builder = Self {
            nodes: vec![Node::new_empty()],
        };
        if ipv4_aliasing {
            let ipv4_root = builder.ensure_path(0, IPV4_SUBTREE_DEPTH);
            for (network, prefix_len) in ALIASED_NETWORKS {
                let parent = builder.ensure_path(network, prefix_len - 1);
                builder.set_child(parent, bit_at(network, prefix_len - 1), NodePointer::Alias(ipv4_root));
            }
        }
        builder
    }

    /// Number of nodes allocated so far
    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Insert every address in `[start, end]` (128-bit tree space) with the
    /// given data offset
    pub fn insert_range(&mut self, start: u128, end: u128, data_offset: u32) -> InsertOutcome {
        self.insert_range_with(start, end, || data_offset)
    }

    /// Like [`insert_range`](Self::insert_range), but `data_offset` is only
    /// called when at least one network of the range will be stored
    pub fn insert_range_with<F>(&mut self, start: u128, end: u128, data_offset: F) -> InsertOutcome
    where
        F: FnOnce() -> u32,
    {
        let (stored, aliased): (Vec<_>, Vec<_>) = range_to_networks(start, end)
            .into_iter()
            .partition(|&(network, prefix_len)| !self.reaches_alias(network, prefix_len));

        if stored.is_empty() {
            return if aliased.is_empty() {
                InsertOutcome::Inserted
            } else {
                InsertOutcome::Aliased
            };
        }

        let offset = data_offset();
        for (network, prefix_len) in stored {
            self.insert_network(network, prefix_len, offset);
        }

        if aliased.is_empty() {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::PartiallyAliased
        }
    }

    /// Whether the path to a network passes through an alias pointer
    fn reaches_alias(&self, bits: u128, prefix_len: u8) -> bool {
        let mut node_id = 0u32;
        for depth in 0..prefix_len {
            match self.child(node_id, bit_at(bits, depth)) {
                NodePointer::Node(id) => node_id = id,
                NodePointer::Alias(_) => return true,
                NodePointer::Data(..) | NodePointer::Empty => return false,
            }
        }
        false
    }

    /// Insert one network that does not lie in an aliased network
    fn insert_network(&mut self, bits: u128, prefix_len: u8, data_offset: u32) {
        let mut node_id = 0u32;

        for depth in 0..prefix_len {
            let bit = bit_at(bits, depth);
            let child = self.child(node_id, bit);

            if depth + 1 == prefix_len {
                match child {
                    NodePointer::Empty => {
                        self.set_child(node_id, bit, NodePointer::Data(data_offset, prefix_len));
                    }
                    NodePointer::Data(_, existing_prefix_len) => {
                        if prefix_len >= existing_prefix_len {
                            self.set_child(node_id, bit, NodePointer::Data(data_offset, prefix_len));
                        }
                    }
                    NodePointer::Node(child_id) => {
                        // More specific networks already exist below; fill
                        // the gaps around them
                        self.backfill_less_specific(child_id, data_offset, prefix_len);
                    }
                    NodePointer::Alias(_) => {}
                }
                return;
            }

            node_id = match child {
                NodePointer::Empty => {
                    let new_id = self.allocate_node();
                    self.set_child(node_id, bit, NodePointer::Node(new_id));
                    new_id
                }
                NodePointer::Node(child_id) => child_id,
                NodePointer::Data(existing_offset, existing_prefix_len) => {
                    // A less specific network covers this one: push its data
                    // one level down and keep descending
                    let new_id = self.allocate_node();
                    let existing = NodePointer::Data(existing_offset, existing_prefix_len);
                    self.nodes[new_id as usize] = Node {
                        left: existing,
                        right: existing,
                    };
                    self.set_child(node_id, bit, NodePointer::Node(new_id));
                    new_id
                }
                NodePointer::Alias(_) => return,
            };
        }
    }

    /// Walk (and create) the path for the first `depth` bits of `bits`
    fn ensure_path(&mut self, bits: u128, depth: u8) -> u32 {
        let mut node_id = 0u32;
        for d in 0..depth {
            let bit = bit_at(bits, d);
            node_id = match self.child(node_id, bit) {
                NodePointer::Node(child_id) => child_id,
                _ => {
                    let new_id = self.allocate_node();
                    self.set_child(node_id, bit, NodePointer::Node(new_id));
                    new_id
                }
            };
        }
        node_id
    }

    fn child(&self, node_id: u32, bit: u8) -> NodePointer {
        let node = &self.nodes[node_id as usize];
        if bit == 0 {
            node.left
        } else {
            node.right
        }
    }

    fn set_child(&mut self, node_id: u32, bit: u8, pointer: NodePointer) {
        let node = &mut self.nodes[node_id as usize];
        if bit == 0 {
            node.left = pointer;
        } else {
            node.right = pointer;
        }
    }

    /// Allocate a new node and return its ID
    fn allocate_node(&mut self) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(Node::new_empty());
        id
    }

    /// Fill empty, less specific and equally specific slots of a subtree with
    /// the given data, leaving more specific data and aliases alone
    fn backfill_less_specific(&mut self, node_id: u32, data_offset: u32, prefix_len: u8) {
        for bit in [0u8, 1u8] {
            match self.child(node_id, bit) {
                NodePointer::Empty => {
                    self.set_child(node_id, bit, NodePointer::Data(data_offset, prefix_len));
                }
                NodePointer::Data(_, existing_prefix_len) => {
                    if prefix_len >= existing_prefix_len {
                        self.set_child(node_id, bit, NodePointer::Data(data_offset, prefix_len));
                    }
                }
                NodePointer::Node(child_id) => {
                    self.backfill_less_specific(child_id, data_offset, prefix_len);
                }
                NodePointer::Alias(_) => {}
            }
        }
    }

    /// Serialize the tree with the given record size
    pub fn build(&self, record_size: RecordSize) -> io::Result<Vec<u8>> {
        let node_count = self.node_count();
        let node_bytes = record_size.node_bytes();
        let mut tree = vec![0u8; self.nodes.len() * node_bytes];

        for (node_id, node) in self.nodes.iter().enumerate() {
            let left = pointer_to_value(node.left, node_count, record_size)?;
            let right = pointer_to_value(node.right, node_count, record_size)?;
            let slot = &mut tree[node_id * node_bytes..(node_id + 1) * node_bytes];
            write_node(slot, record_size, left, right);
        }

        Ok(tree)
    }

    /// Follow the tree for a 128-bit address, returning the data offset
    #[cfg(test)]
    fn lookup(&self, bits: u128) -> Option<u32> {
        let mut node_id = 0u32;
        for depth in 0..128 {
            match self.child(node_id, bit_at(bits, depth)) {
                NodePointer::Node(id) | NodePointer::Alias(id) => node_id = id,
                NodePointer::Data(offset, _) => return Some(offset),
                NodePointer::Empty => return None,
            }
        }
        None
    }
}

impl Node {
    fn new_empty() -> Self {
        Self {
            left: NodePointer::Empty,
            right: NodePointer::Empty,
        }
    }
}

/// Bit `depth` of a 128-bit address, most significant first
fn bit_at(bits: u128, depth: u8) -> u8 {
    ((bits >> (127 - depth as u32)) & 1) as u8
}

/// Convert node pointer to numeric record value.
/// Data records are `node_count + 16 + offset`, past the 16-byte separator.
fn pointer_to_value(pointer: NodePointer, node_count: u32, record_size: RecordSize) -> io::Result<u32> {
    let value = match pointer {
        NodePointer::Empty => node_count as u64,
        NodePointer::Node(id) | NodePointer::Alias(id) => id as u64,
        NodePointer::Data(offset, _) => node_count as u64 + 16 + offset as u64,
    };
    if value > record_size.max_value() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "record value {} does not fit in {}-bit records",
                value,
                record_size.bits()
            ),
        ));
    }
    Ok(value as u32)
}

fn write_node(slot: &mut [u8], record_size: RecordSize, left: u32, right: u32) {
    let l = left.to_be_bytes();
    let r = right.to_be_bytes();
    match record_size {
        RecordSize::Bits24 => {
            slot[0..3].copy_from_slice(&l[1..]);
            slot[3..6].copy_from_slice(&r[1..]);
        }
        RecordSize::Bits28 => {
            // [left low 24][left high 4 | right high 4][right low 24]
            slot[0..3].copy_from_slice(&l[1..]);
            slot[3] = ((l[0] & 0x0F) << 4) | (r[0] & 0x0F);
            slot[4..7].copy_from_slice(&r[1..]);
        }
        RecordSize::Bits32 => {
            slot[0..4].copy_from_slice(&l);
            slot[4..8].copy_from_slice(&r);
        }
    }
}

/// Split an inclusive range into the minimal list of aligned networks
///
/// The whole address space comes back as two /1 networks since the tree
/// root cannot hold data itself.
pub fn range_to_networks(start: u128, end: u128) -> Vec<(u128, u8)> {
    let mut networks = Vec::new();
    if start > end {
        return networks;
    }

    let mut current = start;
    loop {
        let align = if current == 0 {
            128
        } else {
            current.trailing_zeros()
        };
        let remaining = end - current;
        let fit = match remaining.checked_add(1) {
            Some(count) => 127 - count.leading_zeros(),
            None => 128,
        };
        let host_bits = align.min(fit);

        if host_bits == 128 {
            networks.push((0, 1));
            networks.push((1 << 127, 1));
            break;
        }

        networks.push((current, (128 - host_bits) as u8));
        let last = current + ((1u128 << host_bits) - 1);
        if last >= end {
            break;
        }
        current = last + 1;
    }

    networks
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPV4_MAPPED: u128 = 0xFFFF_0000_0000;

    #[test]
    fn test_range_to_networks_single_block() {
        assert_eq!(range_to_networks(0, 255), vec![(0, 120)]);
        assert_eq!(range_to_networks(0, u32::MAX as u128), vec![(0, 96)]);
        assert_eq!(range_to_networks(7, 7), vec![(7, 128)]);
    }

    #[test]
    fn test_range_to_networks_unaligned() {
        assert_eq!(
            range_to_networks(1, 6),
            vec![(1, 128), (2, 127), (4, 127), (6, 128)]
        );
    }

    #[test]
    fn test_range_to_networks_full_space() {
        assert_eq!(
            range_to_networks(0, u128::MAX),
            vec![(0, 1), (1 << 127, 1)]
        );
        assert_eq!(
            range_to_networks(1 << 48, u128::MAX).last(),
            Some(&(1 << 127, 1))
        );
    }

    #[test]
    fn test_range_to_networks_empty_when_reversed() {
        assert!(range_to_networks(10, 9).is_empty());
    }

    #[test]
    fn test_new_without_aliasing() {
        let builder = IpTreeBuilder::new(false);
        assert_eq!(builder.node_count(), 1);
        let tree = builder.build(RecordSize::Bits24).unwrap();
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_alias_nodes_allocated() {
        // ::/96 path (96 nodes + root), ::ffff:0:0/96 branches at bit 80
        // (15 more), 2002::/16 branches at bit 2 (13 more)
        let builder = IpTreeBuilder::new(true);
        assert_eq!(builder.node_count(), 1 + 96 + 15 + 13);
    }

    #[test]
    fn test_ipv4_visible_through_aliases() {
        let mut builder = IpTreeBuilder::new(true);
        let ip = 0x0102_0304u128;
        assert_eq!(builder.insert_range(ip, ip + 0xFB, 42), InsertOutcome::Inserted);

        assert_eq!(builder.lookup(ip), Some(42));
        assert_eq!(builder.lookup(IPV4_MAPPED | ip), Some(42));
        assert_eq!(builder.lookup((0x2002u128 << 112) | (ip << 80)), Some(42));
        assert_eq!(builder.lookup(0x0102_0303), None);
    }

    #[test]
    fn test_insert_into_alias_reports_aliased() {
        let mut builder = IpTreeBuilder::new(true);
        let nodes_before = builder.node_count();

        let mapped = IPV4_MAPPED | 0x0A00_0000;
        assert_eq!(
            builder.insert_range(mapped, mapped + 255, 1),
            InsertOutcome::Aliased
        );

        let six_to_four = 0x2002u128 << 112;
        assert_eq!(
            builder.insert_range(six_to_four, six_to_four + 0xFFFF, 1),
            InsertOutcome::Aliased
        );
        assert_eq!(builder.node_count(), nodes_before);
    }

    #[test]
    fn test_partially_aliased_range() {
        let mut builder = IpTreeBuilder::new(true);
        // 2001:ffff:: up to the first address of 2002::
        let start = 0x2001_FFFFu128 << 96;
        let end = 0x2002u128 << 112;
        assert_eq!(
            builder.insert_range(start, end, 9),
            InsertOutcome::PartiallyAliased
        );
        assert_eq!(builder.lookup(start), Some(9));
    }

    #[test]
    fn test_more_specific_wins_in_any_order() {
        let net24 = 0xC000_0200u128;
        let host = net24 + 1;

        let mut specific_first = IpTreeBuilder::new(false);
        specific_first.insert_range(host, host, 1);
        specific_first.insert_range(net24, net24 + 255, 2);

        let mut specific_last = IpTreeBuilder::new(false);
        specific_last.insert_range(net24, net24 + 255, 2);
        specific_last.insert_range(host, host, 1);

        for builder in [&specific_first, &specific_last] {
            assert_eq!(builder.lookup(host), Some(1));
            assert_eq!(builder.lookup(net24), Some(2));
            assert_eq!(builder.lookup(net24 + 255), Some(2));
        }
    }

    #[test]
    fn test_equal_prefix_replaces_around_more_specific() {
        let net8 = 0x0A00_0000u128;
        let net24 = 0x0A00_0100u128;

        let mut builder = IpTreeBuilder::new(false);
        builder.insert_range(net8, net8 + 0x00FF_FFFF, 1);
        builder.insert_range(net24, net24 + 255, 2);
        builder.insert_range(net8, net8 + 0x00FF_FFFF, 3);

        assert_eq!(builder.lookup(net8 + 5), Some(3));
        assert_eq!(builder.lookup(net8 + 0x00FF_FFFF), Some(3));
        assert_eq!(builder.lookup(net24 + 5), Some(2));
    }

    #[test]
    fn test_offset_not_requested_when_fully_aliased() {
        let mut builder = IpTreeBuilder::new(true);
        let six_to_four = 0x2002u128 << 112;
        let mut requested = false;

        let outcome = builder.insert_range_with(six_to_four, six_to_four + 255, || {
            requested = true;
            7
        });
        assert_eq!(outcome, InsertOutcome::Aliased);
        assert!(!requested);
    }

    #[test]
    fn test_supernet_keeps_aliases() {
        let mut builder = IpTreeBuilder::new(true);
        assert_eq!(
            builder.insert_range(0, u128::MAX, 5),
            InsertOutcome::Inserted
        );
        builder.insert_range(0x0808_0808, 0x0808_0808, 6);

        assert_eq!(builder.lookup(1 << 100), Some(5));
        assert_eq!(builder.lookup(IPV4_MAPPED | 0x0808_0808), Some(6));
    }

    #[test]
    fn test_build_record_sizes() {
        let mut builder = IpTreeBuilder::new(false);
        builder.insert_range(0, 255, 0);
        let nodes = builder.node_count() as usize;

        assert_eq!(builder.build(RecordSize::Bits24).unwrap().len(), nodes * 6);
        assert_eq!(builder.build(RecordSize::Bits28).unwrap().len(), nodes * 7);
        assert_eq!(builder.build(RecordSize::Bits32).unwrap().len(), nodes * 8);
    }

    #[test]
    fn test_write_28bit_node_layout() {
        let mut slot = [0u8; 7];
        write_node(&mut slot, RecordSize::Bits28, 0x0ABC_DEF1, 0x0123_4567);
        assert_eq!(slot, [0xBC, 0xDE, 0xF1, 0xA1, 0x23, 0x45, 0x67]);
    }

    #[test]
    fn test_empty_records_point_past_nodes() {
        let builder = IpTreeBuilder::new(false);
        let tree = builder.build(RecordSize::Bits32).unwrap();
        assert_eq!(tree, vec![0, 0, 0, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_data_pointer_overflow_is_an_error() {
        let mut builder = IpTreeBuilder::new(false);
        builder.insert_range(0, 0, 1 << 24);
        let err = builder.build(RecordSize::Bits24).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(builder.build(RecordSize::Bits32).is_ok());
    }

    #[test]
    fn test_record_size_from_bits() {
        assert_eq!(RecordSize::from_bits(28), Some(RecordSize::Bits28));
        assert_eq!(RecordSize::from_bits(30), None);
        assert_eq!(RecordSize::Bits32.bits(), 32);
    }
}
