// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use corten_quic_core::{transport, varint::VarInt};

//= https://www.rfc-editor.org/rfc/rfc9000#section-4.1
//# A sender MUST NOT send data in excess of either limit.

/// Send-side flow control for one scope (the connection, or one stream
/// direction)
#[derive(Clone, Copy, Debug)]
pub struct Controller {
    /// The peer-advertised limit, in cumulative bytes
    maximum_data: VarInt,
    /// Cumulative bytes handed to the transport
    sent: VarInt,
    /// The limit a blocked signal was last emitted for
    blocked_signalled_at: Option<VarInt>,
}

impl Controller {
    pub fn new(maximum_data: VarInt) -> Self {
        Self {
            maximum_data,
            sent: VarInt::ZERO,
            blocked_signalled_at: None,
        }
    }

    #[inline]
    pub fn maximum_data(&self) -> VarInt {
        self.maximum_data
    }

    #[inline]
    pub fn sent(&self) -> VarInt {
        self.sent
    }

    /// Bytes still available under the current limit
    #[inline]
    pub fn available(&self) -> VarInt {
        self.maximum_data.saturating_sub(self.sent)
    }

    #[inline]
    pub fn can_send(&self, len: usize) -> bool {
        self.available() >= len
    }

    /// Accounts for `len` sent bytes
    pub fn on_sent(&mut self, len: usize) -> Result<(), transport::Error> {
        let sent = self
            .sent
            .checked_add_usize(len)
            .ok_or(transport::Error::INTERNAL_ERROR)?;

        if sent > self.maximum_data {
            return Err(transport::Error::FLOW_CONTROL_ERROR
                .with_reason("send exceeded the advertised data limit"));
        }

        self.sent = sent;
        Ok(())
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-4.1
    //# A receiver MUST ignore any MAX_STREAM_DATA or MAX_DATA frames that
    //# do not increase flow control limits.

    /// Raises the limit; smaller or equal values are ignored. Returns true
    /// when the limit moved.
    pub fn on_max_data(&mut self, maximum_data: VarInt) -> bool {
        if maximum_data <= self.maximum_data {
            return false;
        }
        self.maximum_data = maximum_data;
        true
    }

    /// Returns the limit to report in a blocked frame, at most once per
    /// distinct limit
    pub fn poll_blocked(&mut self) -> Option<VarInt> {
        if self.available() > 0u64 {
            return None;
        }

        if self.blocked_signalled_at == Some(self.maximum_data) {
            return None;
        }

        self.blocked_signalled_at = Some(self.maximum_data);
        Some(self.maximum_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accounting_test() {
        let mut controller = Controller::new(VarInt::from_u16(1000));
        assert!(controller.can_send(1000));
        assert!(!controller.can_send(1001));

        controller.on_sent(800).unwrap();
        assert_eq!(controller.sent(), VarInt::from_u16(800));
        assert_eq!(controller.available(), VarInt::from_u16(200));

        // 800 + 300 exceeds the 1000-byte limit
        let error = controller.on_sent(300).unwrap_err();
        assert_eq!(error.code, transport::Error::FLOW_CONTROL_ERROR.code);

        // the failed send did not change the accounting
        assert_eq!(controller.sent(), VarInt::from_u16(800));

        controller.on_sent(200).unwrap();
        assert_eq!(controller.available(), VarInt::ZERO);
    }

    #[test]
    fn monotonic_update_test() {
        let mut controller = Controller::new(VarInt::from_u16(1000));

        assert!(controller.on_max_data(VarInt::from_u16(2000)));
        assert_eq!(controller.maximum_data(), VarInt::from_u16(2000));

        // smaller and equal updates are ignored
        assert!(!controller.on_max_data(VarInt::from_u16(1500)));
        assert!(!controller.on_max_data(VarInt::from_u16(2000)));
        assert_eq!(controller.maximum_data(), VarInt::from_u16(2000));
    }

    #[test]
    fn blocked_signal_once_per_limit_test() {
        let mut controller = Controller::new(VarInt::from_u8(10));
        assert!(controller.poll_blocked().is_none());

        controller.on_sent(10).unwrap();
        assert_eq!(controller.poll_blocked(), Some(VarInt::from_u8(10)));
        // only one signal per limit
        assert!(controller.poll_blocked().is_none());

        controller.on_max_data(VarInt::from_u8(20));
        assert!(controller.poll_blocked().is_none());
        controller.on_sent(10).unwrap();
        assert_eq!(controller.poll_blocked(), Some(VarInt::from_u8(20)));
        assert!(controller.poll_blocked().is_none());
    }

    #[test]
    fn sum_of_sends_test() {
        let mut controller = Controller::new(VarInt::MAX);
        let sends = [5usize, 100, 0, 17, 4000];
        for send in sends {
            controller.on_sent(send).unwrap();
        }
        assert_eq!(controller.sent(), sends.iter().sum::<usize>());
    }
}
