// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use corten_quic_core::{transport, varint::VarInt};

//= https://www.rfc-editor.org/rfc/rfc9000#section-4.1
//# A receiver MUST close the connection with an error of type
//# FLOW_CONTROL_ERROR if the sender violates the advertised connection
//# or stream data limits

/// Receive-side flow control for the connection scope
#[derive(Clone, Copy, Debug)]
pub struct Controller {
    /// The limit advertised to the peer
    maximum_data: VarInt,
    /// Cumulative stream bytes received across every stream
    received: VarInt,
    /// How far the window is extended past consumed data when updating
    window: VarInt,
    /// A MAX_DATA carrying this limit needs to be transmitted
    pending_update: Option<VarInt>,
}

impl Controller {
    pub fn new(maximum_data: VarInt, window: VarInt) -> Self {
        Self {
            maximum_data,
            received: VarInt::ZERO,
            window,
            pending_update: None,
        }
    }

    #[inline]
    pub fn maximum_data(&self) -> VarInt {
        self.maximum_data
    }

    #[inline]
    pub fn received(&self) -> VarInt {
        self.received
    }

    /// Accounts for newly received stream bytes (the previously unseen
    /// suffix of a stream frame)
    pub fn on_data_received(&mut self, len: VarInt) -> Result<(), transport::Error> {
        let received = self
            .received
            .checked_add(len)
            .ok_or(transport::Error::INTERNAL_ERROR)?;

        if received > self.maximum_data {
            return Err(transport::Error::FLOW_CONTROL_ERROR
                .with_reason("peer exceeded the advertised connection data limit"));
        }

        self.received = received;
        Ok(())
    }

    /// The application consumed data; extend the window when half of it
    /// has been used up
    pub fn on_data_consumed(&mut self, len: VarInt) {
        let _ = len;
        let in_flight = self.maximum_data.saturating_sub(self.received);

        if in_flight < self.window.saturating_sub(self.window / VarInt::from_u8(2)) {
            let next = self.received.saturating_add(self.window);
            if next > self.maximum_data {
                self.maximum_data = next;
                self.pending_update = Some(next);
            }
        }
    }

    /// Returns a limit to advertise in a MAX_DATA frame, once
    pub fn poll_update(&mut self) -> Option<VarInt> {
        self.pending_update.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_limit_test() {
        let mut controller = Controller::new(VarInt::from_u16(1000), VarInt::from_u16(1000));

        controller.on_data_received(VarInt::from_u16(600)).unwrap();
        controller.on_data_received(VarInt::from_u16(400)).unwrap();

        let error = controller
            .on_data_received(VarInt::from_u8(1))
            .unwrap_err();
        assert_eq!(error.code, transport::Error::FLOW_CONTROL_ERROR.code);
    }

    #[test]
    fn window_update_test() {
        let mut controller = Controller::new(VarInt::from_u16(1000), VarInt::from_u16(1000));
        assert!(controller.poll_update().is_none());

        controller.on_data_received(VarInt::from_u16(900)).unwrap();
        controller.on_data_consumed(VarInt::from_u16(900));

        let update = controller.poll_update().unwrap();
        assert!(update > VarInt::from_u16(1000));
        // the update is only reported once
        assert!(controller.poll_update().is_none());
    }
}
