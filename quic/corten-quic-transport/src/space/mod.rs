// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-encryption-level packet number accounting, acknowledgement
//! tracking, CRYPTO stream reassembly and key containers

use corten_quic_core::{
    ack,
    crypto::CryptoSuite,
    packet::{
        number::{PacketNumber, PacketNumberSpace, SlidingWindow, SlidingWindowError},
        KeyPhase,
    },
    time::{Duration, Timestamp},
    transport,
    varint::VarInt,
};
use std::collections::BTreeMap;

/// CRYPTO data buffered out of order past this point is refused
pub const MAX_CRYPTO_BUFFER: usize = 64 * 1024;

/// The send half of a packet number space
#[derive(Debug)]
pub struct TxPacketNumbers {
    space: PacketNumberSpace,
    next: PacketNumber,
    largest_acknowledged: Option<PacketNumber>,
}

impl TxPacketNumbers {
    pub fn new(space: PacketNumberSpace) -> Self {
        Self {
            space,
            next: space.new_packet_number(VarInt::ZERO),
            largest_acknowledged: None,
        }
    }

    /// Allocates the next packet number.
    ///
    /// Exhausting the 62-bit space is fatal for the connection: a packet
    /// number must never be reused under the same key.
    pub fn next(&mut self) -> Result<PacketNumber, transport::Error> {
        let packet_number = self.next;
        self.next = packet_number.next().ok_or_else(|| {
            transport::Error::AEAD_LIMIT_REACHED.with_reason("packet number space exhausted")
        })?;
        Ok(packet_number)
    }

    /// Records an acknowledgement; smaller values are ignored
    pub fn on_packet_ack(&mut self, largest: PacketNumber) {
        self.space.assert_eq(largest.space());
        match self.largest_acknowledged {
            Some(current) if current >= largest => {}
            _ => self.largest_acknowledged = Some(largest),
        }
    }

    #[inline]
    pub fn largest_acknowledged(&self) -> Option<PacketNumber> {
        self.largest_acknowledged
    }

    #[inline]
    pub fn next_unallocated(&self) -> PacketNumber {
        self.next
    }
}

/// The receive half of a packet number space
#[derive(Debug, Default)]
pub struct RxPacketNumbers {
    largest_received: Option<PacketNumber>,
    window: SlidingWindow,
}

impl RxPacketNumbers {
    /// Records a received packet number, rejecting duplicates
    pub fn on_packet_received(
        &mut self,
        packet_number: PacketNumber,
    ) -> Result<(), SlidingWindowError> {
        self.window.insert(packet_number)?;

        match self.largest_received {
            Some(largest) if largest >= packet_number => {}
            _ => self.largest_received = Some(packet_number),
        }

        Ok(())
    }

    #[inline]
    pub fn largest_received(&self) -> Option<PacketNumber> {
        self.largest_received
    }
}

/// Bookkeeping for the ACK frames this endpoint owes its peer
#[derive(Debug)]
pub struct AckTracker {
    ranges: ack::Ranges,
    /// An ack-eliciting packet arrived and has not been acknowledged yet
    ack_pending: bool,
    deadline: Option<Timestamp>,
}

impl AckTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            ranges: ack::Ranges::new(capacity),
            ack_pending: false,
            deadline: None,
        }
    }

    pub fn on_packet_received(
        &mut self,
        packet_number: PacketNumber,
        ack_eliciting: bool,
        now: Timestamp,
        max_ack_delay: Duration,
    ) {
        self.ranges.insert(packet_number.as_varint());

        //= https://www.rfc-editor.org/rfc/rfc9000#section-13.2.1
        //# an endpoint MUST NOT delay sending an ACK frame in
        //# response to at least every second ack-eliciting packet
        if ack_eliciting && self.deadline.is_none() {
            self.ack_pending = true;
            self.deadline = Some(now + max_ack_delay);
        }
    }

    /// True when an ACK must be bundled into the next packet
    pub fn should_transmit(&self, now: Timestamp) -> bool {
        if self.ranges.is_empty() {
            return false;
        }

        match self.deadline {
            Some(deadline) => self.ack_pending || deadline <= now,
            None => false,
        }
    }

    /// True when an ACK can ride along in a packet sent for other reasons
    pub fn can_transmit(&self) -> bool {
        !self.ranges.is_empty() && self.ack_pending
    }

    pub fn ranges(&self) -> &ack::Ranges {
        &self.ranges
    }

    pub fn on_ack_sent(&mut self) {
        self.ack_pending = false;
        self.deadline = None;
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.deadline
    }
}

/// In-order delivery of the CRYPTO stream at one encryption level
#[derive(Debug, Default)]
pub struct CryptoStream {
    // receive side
    rx_offset: u64,
    rx_buffered: BTreeMap<u64, Vec<u8>>,
    rx_buffered_len: usize,
    // send side
    tx_offset: u64,
    tx_chunks: Vec<(u64, Vec<u8>)>,
}

impl CryptoStream {
    /// Buffers a received CRYPTO frame and returns the bytes that are now
    /// contiguous with the delivery offset
    pub fn on_crypto_frame(
        &mut self,
        offset: VarInt,
        data: &[u8],
    ) -> Result<Vec<u8>, transport::Error> {
        let offset = offset.as_u64();
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| {
                transport::Error::FRAME_ENCODING_ERROR.with_reason("crypto offset overflow")
            })?;

        if end > self.rx_offset {
            let start = offset.max(self.rx_offset);
            let skip = (start - offset) as usize;
            let fresh = &data[skip..];

            use std::collections::btree_map::Entry;
            match self.rx_buffered.entry(start) {
                Entry::Vacant(entry) => {
                    if self.rx_buffered_len + fresh.len() > MAX_CRYPTO_BUFFER {
                        return Err(transport::Error::CRYPTO_BUFFER_EXCEEDED
                            .with_reason("crypto reassembly buffer overflow"));
                    }
                    self.rx_buffered_len += fresh.len();
                    entry.insert(fresh.to_vec());
                }
                Entry::Occupied(mut entry) => {
                    // keep the longer of two chunks starting at the same offset
                    if fresh.len() > entry.get().len() {
                        let added = fresh.len() - entry.get().len();
                        if self.rx_buffered_len + added > MAX_CRYPTO_BUFFER {
                            return Err(transport::Error::CRYPTO_BUFFER_EXCEEDED
                                .with_reason("crypto reassembly buffer overflow"));
                        }
                        self.rx_buffered_len += added;
                        entry.insert(fresh.to_vec());
                    }
                }
            }
        }

        // drain everything contiguous with the delivery offset
        let mut delivered = Vec::new();
        while let Some(&start) = self.rx_buffered.keys().next() {
            if start > self.rx_offset {
                break;
            }

            let chunk = self.rx_buffered.remove(&start).expect("the key was just read");
            self.rx_buffered_len -= chunk.len();

            let skip = (self.rx_offset - start) as usize;
            if skip < chunk.len() {
                delivered.extend_from_slice(&chunk[skip..]);
                self.rx_offset += (chunk.len() - skip) as u64;
            }
        }

        Ok(delivered)
    }

    /// Queues handshake bytes for transmission
    pub fn push_tx(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        let offset = self.tx_offset;
        self.tx_offset += data.len() as u64;
        self.tx_chunks.push((offset, data));
    }

    /// Takes the next chunk to transmit, limited to `max_len` bytes
    pub fn pop_tx(&mut self, max_len: usize) -> Option<(u64, Vec<u8>)> {
        if max_len == 0 {
            return None;
        }

        let (offset, mut data) = if self.tx_chunks.is_empty() {
            return None;
        } else {
            self.tx_chunks.remove(0)
        };

        if data.len() > max_len {
            let rest = data.split_off(max_len);
            self.tx_chunks.insert(0, (offset + max_len as u64, rest));
        }

        Some((offset, data))
    }

    pub fn has_tx_data(&self) -> bool {
        !self.tx_chunks.is_empty()
    }
}

/// The state every packet number space carries
#[derive(Debug)]
pub struct SpaceState {
    pub tx: TxPacketNumbers,
    pub rx: RxPacketNumbers,
    pub ack: AckTracker,
    pub crypto: CryptoStream,
}

impl SpaceState {
    pub fn new(space: PacketNumberSpace, ack_capacity: usize) -> Self {
        Self {
            tx: TxPacketNumbers::new(space),
            rx: RxPacketNumbers::default(),
            ack: AckTracker::new(ack_capacity),
            crypto: CryptoStream::default(),
        }
    }
}

/// Initial-level keys and state
pub struct InitialSpace<S: CryptoSuite> {
    pub key: S::InitialKey,
    pub header_key: S::InitialHeaderKey,
    pub state: SpaceState,
}

impl<S: CryptoSuite> InitialSpace<S> {
    pub fn new(key: S::InitialKey, header_key: S::InitialHeaderKey, ack_capacity: usize) -> Self {
        Self {
            key,
            header_key,
            state: SpaceState::new(PacketNumberSpace::Initial, ack_capacity),
        }
    }
}

/// Handshake-level keys and state
pub struct HandshakeSpace<S: CryptoSuite> {
    pub key: S::HandshakeKey,
    pub header_key: S::HandshakeHeaderKey,
    pub state: SpaceState,
}

impl<S: CryptoSuite> HandshakeSpace<S> {
    pub fn new(key: S::HandshakeKey, header_key: S::HandshakeHeaderKey, ack_capacity: usize) -> Self {
        Self {
            key,
            header_key,
            state: SpaceState::new(PacketNumberSpace::Handshake, ack_capacity),
        }
    }
}

//= https://www.rfc-editor.org/rfc/rfc9001#section-6.1
//# An endpoint MUST retain old keys until it has successfully
//# unprotected a packet sent using the new keys.  An endpoint SHOULD
//# retain old keys for some time after unprotecting a packet sent using
//# the new keys.

/// The 1-RTT key generations: the active pair plus a short-lived shadow
/// of the previous generation for reordered packets
pub struct OneRttKeySet<K: corten_quic_core::crypto::OneRttKey> {
    active: K,
    phase: KeyPhase,
    previous: Option<K>,
}

impl<K: corten_quic_core::crypto::OneRttKey> OneRttKeySet<K> {
    pub fn new(key: K) -> Self {
        Self {
            active: key,
            phase: KeyPhase::Zero,
            previous: None,
        }
    }

    #[inline]
    pub fn phase(&self) -> KeyPhase {
        self.phase
    }

    #[inline]
    pub fn active(&self) -> &K {
        &self.active
    }

    #[inline]
    pub fn previous(&self) -> Option<&K> {
        self.previous.as_ref()
    }

    /// Derives the key for the next phase without installing it
    pub fn derive_next(&self) -> K {
        self.active.derive_next_key()
    }

    /// Installs the next generation, demoting the active key to the
    /// read-only shadow
    pub fn rotate(&mut self, next: K) {
        let previous = core::mem::replace(&mut self.active, next);
        self.previous = Some(previous);
        self.phase = self.phase.next();
    }

    /// Drops the previous generation once reordered packets can no longer
    /// use it
    pub fn retire_previous(&mut self) {
        self.previous = None;
    }
}

/// Application (0-RTT and 1-RTT) keys and state
pub struct ApplicationSpace<S: CryptoSuite> {
    pub keys: OneRttKeySet<S::OneRttKey>,
    pub header_key: S::OneRttHeaderKey,
    pub zero_rtt: Option<(S::ZeroRttKey, S::ZeroRttHeaderKey)>,
    pub state: SpaceState,
}

impl<S: CryptoSuite> ApplicationSpace<S> {
    pub fn new(key: S::OneRttKey, header_key: S::OneRttHeaderKey, ack_capacity: usize) -> Self {
        Self {
            keys: OneRttKeySet::new(key),
            header_key,
            zero_rtt: None,
            state: SpaceState::new(PacketNumberSpace::ApplicationData, ack_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_packet_numbers_test() {
        let mut tx = TxPacketNumbers::new(PacketNumberSpace::Initial);
        assert_eq!(tx.next().unwrap().as_u64(), 0);
        assert_eq!(tx.next().unwrap().as_u64(), 1);
        assert_eq!(tx.next().unwrap().as_u64(), 2);
    }

    #[test]
    fn tx_exhaustion_test() {
        let space = PacketNumberSpace::ApplicationData;
        let mut tx = TxPacketNumbers::new(space);
        tx.next = space.new_packet_number(VarInt::MAX);

        let error = tx.next().unwrap_err();
        assert_eq!(error.code, transport::Error::AEAD_LIMIT_REACHED.code);
    }

    #[test]
    fn tx_largest_acked_monotonic_test() {
        let space = PacketNumberSpace::Initial;
        let mut tx = TxPacketNumbers::new(space);

        tx.on_packet_ack(space.new_packet_number(VarInt::from_u8(5)));
        assert_eq!(tx.largest_acknowledged().unwrap().as_u64(), 5);

        // a smaller ack does not move the value back
        tx.on_packet_ack(space.new_packet_number(VarInt::from_u8(3)));
        assert_eq!(tx.largest_acknowledged().unwrap().as_u64(), 5);

        tx.on_packet_ack(space.new_packet_number(VarInt::from_u8(9)));
        assert_eq!(tx.largest_acknowledged().unwrap().as_u64(), 9);
    }

    #[test]
    fn rx_duplicate_test() {
        let space = PacketNumberSpace::Initial;
        let mut rx = RxPacketNumbers::default();

        let pn = space.new_packet_number(VarInt::from_u8(4));
        rx.on_packet_received(pn).unwrap();
        assert_eq!(
            rx.on_packet_received(pn),
            Err(SlidingWindowError::Duplicate)
        );
        assert_eq!(rx.largest_received().unwrap().as_u64(), 4);
    }

    #[test]
    fn crypto_in_order_test() {
        let mut stream = CryptoStream::default();
        let delivered = stream.on_crypto_frame(VarInt::ZERO, b"hello").unwrap();
        assert_eq!(delivered, b"hello");

        let delivered = stream.on_crypto_frame(VarInt::from_u8(5), b" world").unwrap();
        assert_eq!(delivered, b" world");
    }

    #[test]
    fn crypto_reorder_test() {
        let mut stream = CryptoStream::default();

        // the second chunk arrives first and is buffered
        let delivered = stream.on_crypto_frame(VarInt::from_u8(5), b" world").unwrap();
        assert!(delivered.is_empty());

        // the gap fills and both chunks deliver together
        let delivered = stream.on_crypto_frame(VarInt::ZERO, b"hello").unwrap();
        assert_eq!(delivered, b"hello world");

        // duplicates deliver nothing
        let delivered = stream.on_crypto_frame(VarInt::ZERO, b"hello").unwrap();
        assert!(delivered.is_empty());
    }

    #[test]
    fn crypto_buffer_bound_test() {
        let mut stream = CryptoStream::default();
        let chunk = vec![0u8; MAX_CRYPTO_BUFFER];

        // buffered out of order at the limit is accepted
        stream
            .on_crypto_frame(VarInt::from_u8(1), &chunk)
            .unwrap();

        let error = stream
            .on_crypto_frame(VarInt::from_u32(1 << 20), &[0u8; 1])
            .unwrap_err();
        assert_eq!(error.code, transport::Error::CRYPTO_BUFFER_EXCEEDED.code);
    }

    #[test]
    fn crypto_tx_chunking_test() {
        let mut stream = CryptoStream::default();
        stream.push_tx(b"0123456789".to_vec());

        let (offset, data) = stream.pop_tx(4).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(data, b"0123");

        let (offset, data) = stream.pop_tx(100).unwrap();
        assert_eq!(offset, 4);
        assert_eq!(data, b"456789");

        assert!(stream.pop_tx(100).is_none());
    }

    #[test]
    fn ack_tracker_test() {
        let now = Timestamp::now();
        let delay = Duration::from_millis(25);
        let space = PacketNumberSpace::ApplicationData;
        let mut tracker = AckTracker::new(16);

        assert!(!tracker.should_transmit(now));

        tracker.on_packet_received(space.new_packet_number(VarInt::from_u8(0)), true, now, delay);
        assert!(tracker.should_transmit(now));

        tracker.on_ack_sent();
        assert!(!tracker.should_transmit(now));

        // non-eliciting packets do not arm the deadline
        tracker.on_packet_received(space.new_packet_number(VarInt::from_u8(1)), false, now, delay);
        assert!(!tracker.should_transmit(now));
    }
}
