// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::flow::tx;
use corten_quic_core::{transport, varint::VarInt};

//= https://www.rfc-editor.org/rfc/rfc9000#section-4.5
//# Once a final size for a stream is known, it cannot change.  If a
//# RESET_STREAM or STREAM frame is received indicating a change in the
//# final size for the stream, an endpoint SHOULD respond with an error
//# of type FINAL_SIZE_ERROR

/// Flow control and final-size bookkeeping for one stream
#[derive(Clone, Copy, Debug)]
pub struct Controller {
    /// Send-side accounting against the peer's MAX_STREAM_DATA
    pub tx: tx::Controller,
    /// The receive limit advertised to the peer
    rx_maximum_data: VarInt,
    /// The highest stream offset seen so far
    highest_received_offset: VarInt,
    /// The final size, once a FIN or RESET_STREAM pinned it
    final_size: Option<VarInt>,
}

impl Controller {
    pub fn new(tx_maximum_data: VarInt, rx_maximum_data: VarInt) -> Self {
        Self {
            tx: tx::Controller::new(tx_maximum_data),
            rx_maximum_data,
            highest_received_offset: VarInt::ZERO,
            final_size: None,
        }
    }

    #[inline]
    pub fn highest_received_offset(&self) -> VarInt {
        self.highest_received_offset
    }

    #[inline]
    pub fn final_size(&self) -> Option<VarInt> {
        self.final_size
    }

    /// Accounts for a received STREAM frame.
    ///
    /// Returns the number of previously unseen bytes, which the caller
    /// charges against the connection-scope controller.
    pub fn on_stream_data(
        &mut self,
        offset: VarInt,
        len: usize,
        is_fin: bool,
    ) -> Result<VarInt, transport::Error> {
        let end = offset
            .checked_add_usize(len)
            .ok_or_else(|| {
                transport::Error::FRAME_ENCODING_ERROR.with_reason("stream offset overflow")
            })?;

        if end > self.rx_maximum_data {
            return Err(transport::Error::FLOW_CONTROL_ERROR
                .with_reason("peer exceeded the advertised stream data limit"));
        }

        if let Some(final_size) = self.final_size {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-4.5
            //# A receiver SHOULD treat receipt of data at or beyond the
            //# final size as an error of type FINAL_SIZE_ERROR
            if end > final_size || (is_fin && end != final_size) {
                return Err(transport::Error::FINAL_SIZE_ERROR
                    .with_reason("stream data past the final size"));
            }
        }

        if is_fin {
            if self.highest_received_offset > end {
                return Err(transport::Error::FINAL_SIZE_ERROR
                    .with_reason("final size below received data"));
            }
            self.final_size = Some(end);
        }

        let newly_received = end.saturating_sub(self.highest_received_offset);
        if end > self.highest_received_offset {
            self.highest_received_offset = end;
        }

        Ok(newly_received)
    }

    /// Accounts for a RESET_STREAM declaring `final_size`
    pub fn on_reset(&mut self, final_size: VarInt) -> Result<VarInt, transport::Error> {
        if let Some(known) = self.final_size {
            if known != final_size {
                return Err(transport::Error::FINAL_SIZE_ERROR
                    .with_reason("reset disagrees with the known final size"));
            }
        }

        if self.highest_received_offset > final_size {
            return Err(transport::Error::FINAL_SIZE_ERROR
                .with_reason("reset final size below received data"));
        }

        if final_size > self.rx_maximum_data {
            return Err(transport::Error::FLOW_CONTROL_ERROR
                .with_reason("reset final size exceeds the stream data limit"));
        }

        let newly_received = final_size.saturating_sub(self.highest_received_offset);
        self.final_size = Some(final_size);
        self.highest_received_offset = final_size;

        Ok(newly_received)
    }

    /// Raises the receive limit advertised to the peer
    pub fn on_local_max_stream_data(&mut self, maximum_data: VarInt) {
        if maximum_data > self.rx_maximum_data {
            self.rx_maximum_data = maximum_data;
        }
    }
}
