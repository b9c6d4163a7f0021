// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Received-packet bookkeeping for generating ACK frames

use crate::varint::VarInt;
use alloc::collections::VecDeque;
use core::ops::RangeInclusive;

/// The set of packet numbers pending acknowledgement, stored as ordered
/// disjoint inclusive ranges (ascending)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ranges {
    ranges: VecDeque<RangeInclusive<VarInt>>,
    /// Ranges are dropped from the low end once this capacity is reached
    capacity: usize,
}

pub const DEFAULT_RANGES_CAPACITY: usize = 64;

impl Ranges {
    pub fn new(capacity: usize) -> Self {
        Self {
            ranges: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[inline]
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Returns the largest tracked packet number
    #[inline]
    pub fn largest(&self) -> Option<VarInt> {
        self.ranges.back().map(|range| *range.end())
    }

    /// Inserts a packet number, merging it into adjacent ranges when
    /// possible
    pub fn insert(&mut self, packet_number: VarInt) {
        let one = VarInt::from_u8(1);

        // index of the first range starting above the packet number
        let index = self.ranges.partition_point(|range| *range.start() <= packet_number);

        if index > 0 {
            let below = self.ranges[index - 1].clone();

            if *below.end() >= packet_number {
                // duplicate
                return;
            }

            if below.end().checked_add(one) == Some(packet_number) {
                self.ranges[index - 1] = *below.start()..=packet_number;

                // the extension may have closed the gap to the range above
                if let Some(above) = self.ranges.get(index) {
                    if *above.start() == packet_number + one {
                        let merged = *below.start()..=*above.end();
                        self.ranges[index - 1] = merged;
                        self.ranges.remove(index);
                    }
                }
                return;
            }
        }

        if let Some(above) = self.ranges.get(index) {
            if packet_number.checked_add(one) == Some(*above.start()) {
                self.ranges[index] = packet_number..=*above.end();
                return;
            }
        }

        self.ranges.insert(index, packet_number..=packet_number);
        self.trim();
    }

    /// Drops every range at or below `packet_number`
    pub fn remove_up_to(&mut self, packet_number: VarInt) {
        while let Some(range) = self.ranges.front() {
            if *range.end() <= packet_number {
                self.ranges.pop_front();
            } else if *range.start() <= packet_number {
                let range = range.clone();
                self.ranges[0] = (packet_number + VarInt::from_u8(1))..=*range.end();
                break;
            } else {
                break;
            }
        }
    }

    /// Iterates the ranges in descending order, as an ACK frame encodes them
    #[inline]
    pub fn iter_descending(
        &self,
    ) -> impl ExactSizeIterator<Item = RangeInclusive<VarInt>> + Clone + '_ {
        self.ranges.iter().rev().cloned()
    }

    fn trim(&mut self) {
        // the oldest information is the least valuable
        while self.ranges.len() > self.capacity {
            self.ranges.pop_front();
        }
    }
}

impl crate::frame::ack::AckRanges for &Ranges {
    type Iter = alloc::vec::IntoIter<RangeInclusive<VarInt>>;

    fn ack_ranges(&self) -> Self::Iter {
        let ranges: alloc::vec::Vec<_> = self.iter_descending().collect();
        ranges.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pn(value: u32) -> VarInt {
        VarInt::from_u32(value)
    }

    #[test]
    fn merge_test() {
        let mut ranges = Ranges::new(DEFAULT_RANGES_CAPACITY);
        ranges.insert(pn(5));
        ranges.insert(pn(3));
        ranges.insert(pn(4));
        ranges.insert(pn(9));

        let collected: Vec<_> = ranges.iter_descending().collect();
        assert_eq!(collected, vec![pn(9)..=pn(9), pn(3)..=pn(5)]);
        assert_eq!(ranges.largest(), Some(pn(9)));
    }

    #[test]
    fn gap_close_test() {
        let mut ranges = Ranges::new(DEFAULT_RANGES_CAPACITY);
        for value in [1, 2, 4, 5] {
            ranges.insert(pn(value));
        }
        assert_eq!(ranges.range_count(), 2);

        ranges.insert(pn(3));
        let collected: Vec<_> = ranges.iter_descending().collect();
        assert_eq!(collected, vec![pn(1)..=pn(5)]);
    }

    #[test]
    fn duplicate_insert_test() {
        let mut ranges = Ranges::new(DEFAULT_RANGES_CAPACITY);
        ranges.insert(pn(7));
        ranges.insert(pn(7));
        assert_eq!(ranges.range_count(), 1);
    }

    #[test]
    fn remove_up_to_test() {
        let mut ranges = Ranges::new(DEFAULT_RANGES_CAPACITY);
        for value in [1, 2, 3, 7, 8, 12] {
            ranges.insert(pn(value));
        }

        ranges.remove_up_to(pn(7));
        let collected: Vec<_> = ranges.iter_descending().collect();
        assert_eq!(collected, vec![pn(12)..=pn(12), pn(8)..=pn(8)]);
    }

    #[test]
    fn capacity_trim_test() {
        let mut ranges = Ranges::new(2);
        ranges.insert(pn(1));
        ranges.insert(pn(10));
        ranges.insert(pn(20));
        assert_eq!(ranges.range_count(), 2);
        // the lowest range was dropped
        assert_eq!(ranges.largest(), Some(pn(20)));
        let collected: Vec<_> = ranges.iter_descending().collect();
        assert_eq!(collected, vec![pn(20)..=pn(20), pn(10)..=pn(10)]);
    }
}
