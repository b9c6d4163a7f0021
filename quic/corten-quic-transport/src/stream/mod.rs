// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Stream bookkeeping: identifier allocation, peer acceptance, per-stream
//! state machines and flow accounting

use crate::flow;
use corten_quic_core::{
    endpoint,
    stream::{RecvState, SendState, StreamId, StreamType},
    transport::{self, parameters::InitialFlowControlLimits},
    varint::VarInt,
};
use hashbrown::HashMap;

#[derive(Debug)]
pub struct Stream {
    pub id: StreamId,
    pub send: SendState,
    pub recv: RecvState,
    pub flow: flow::stream::Controller,
    /// The next offset the application sends at
    pub tx_offset: VarInt,
    /// The peer asked us to stop sending with this error code
    pub stop_sending: Option<VarInt>,
    /// The peer reset its sending half with this error code
    pub reset_error: Option<VarInt>,
}

impl Stream {
    /// True when this endpoint may send STREAM frames here
    pub fn is_send_open(&self, local_type: endpoint::Type) -> bool {
        match self.id.stream_type() {
            StreamType::Bidirectional => true,
            StreamType::Unidirectional => self.id.initiator() == local_type,
        }
    }

    /// True when this endpoint may receive STREAM frames here
    pub fn is_recv_open(&self, local_type: endpoint::Type) -> bool {
        match self.id.stream_type() {
            StreamType::Bidirectional => true,
            StreamType::Unidirectional => self.id.initiator() != local_type,
        }
    }
}

fn type_index(stream_type: StreamType) -> usize {
    match stream_type {
        StreamType::Bidirectional => 0,
        StreamType::Unidirectional => 1,
    }
}

/// The outcome of routing a peer frame to a stream
pub(crate) enum Lookup<'a> {
    Stream(&'a mut Stream),
    /// The stream existed and has been fully closed; the frame is stale
    Closed,
}

#[derive(Debug)]
pub struct Manager {
    local_type: endpoint::Type,
    /// Limits this endpoint advertised (bounds what the peer may do)
    local_limits: InitialFlowControlLimits,
    /// Limits the peer advertised (bounds what we may do)
    peer_limits: InitialFlowControlLimits,
    streams: HashMap<StreamId, Stream>,
    /// Streams allocated locally, per type
    local_opened: [u64; 2],
    /// Peer-initiated streams opened, per type
    peer_opened: [u64; 2],
    /// The concurrent-stream limit we advertise, per type
    local_max_streams: [VarInt; 2],
    /// The concurrent-stream limit the peer advertises, per type
    peer_max_streams: [VarInt; 2],
    /// The limit a STREAMS_BLOCKED was last signalled at, per type
    blocked_signalled: [Option<VarInt>; 2],
}

impl Manager {
    pub fn new(
        local_type: endpoint::Type,
        local_limits: InitialFlowControlLimits,
        peer_limits: InitialFlowControlLimits,
    ) -> Self {
        Self {
            local_type,
            local_limits,
            peer_limits,
            streams: HashMap::new(),
            local_opened: [0; 2],
            peer_opened: [0; 2],
            local_max_streams: [local_limits.max_streams_bidi, local_limits.max_streams_uni],
            peer_max_streams: [peer_limits.max_streams_bidi, peer_limits.max_streams_uni],
            blocked_signalled: [None; 2],
        }
    }

    /// Replaces the peer view once the handshake delivers the real
    /// transport parameters
    pub fn on_peer_limits(&mut self, peer_limits: InitialFlowControlLimits) {
        self.peer_limits = peer_limits;

        for (index, max) in [
            peer_limits.max_streams_bidi,
            peer_limits.max_streams_uni,
        ]
        .into_iter()
        .enumerate()
        {
            if max > self.peer_max_streams[index] {
                self.peer_max_streams[index] = max;
            }
        }

        // streams opened before the parameters arrived keep conservative
        // zero limits; raise their send windows now
        for stream in self.streams.values_mut() {
            let tx_limit = tx_limit_for(self.local_type, stream.id, &self.peer_limits);
            stream.flow.tx.on_max_data(tx_limit);
        }
    }

    #[inline]
    pub fn stream(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(&id)
    }

    #[inline]
    pub fn stream_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    #[inline]
    pub fn open_count(&self) -> usize {
        self.streams.len()
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-4.6
    //# An endpoint MUST NOT open more streams than permitted by the current
    //# stream limit set by its peer.

    /// Allocates the next local stream id of the given type
    pub fn open_local(&mut self, stream_type: StreamType) -> Result<StreamId, transport::Error> {
        let index = type_index(stream_type);
        let count = self.local_opened[index];

        if count >= self.peer_max_streams[index].as_u64() {
            return Err(transport::Error::STREAM_LIMIT_ERROR
                .with_reason("peer stream limit reached"));
        }

        let id = StreamId::nth(self.local_type, stream_type, count)
            .ok_or(transport::Error::INTERNAL_ERROR)?;
        self.local_opened[index] = count + 1;

        let stream = self.insert(id);
        Ok(stream.id)
    }

    /// Returns the limit to report in a STREAMS_BLOCKED frame, at most
    /// once per distinct limit
    pub fn poll_blocked(&mut self, stream_type: StreamType) -> Option<VarInt> {
        let index = type_index(stream_type);
        let limit = self.peer_max_streams[index];

        if self.local_opened[index] < limit.as_u64() {
            return None;
        }

        if self.blocked_signalled[index] == Some(limit) {
            return None;
        }

        self.blocked_signalled[index] = Some(limit);
        Some(limit)
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-19.11
    //# A receiver MUST
    //# ignore any MAX_STREAMS frame that does not increase the stream
    //# limit.

    pub fn on_max_streams(&mut self, stream_type: StreamType, maximum: VarInt) {
        let index = type_index(stream_type);
        if maximum > self.peer_max_streams[index] {
            self.peer_max_streams[index] = maximum;
        }
    }

    /// Routes a peer-sent frame naming `stream_id` to its stream,
    /// implicitly opening peer-initiated streams up to that id
    pub(crate) fn route(&mut self, stream_id: VarInt) -> Result<Lookup<'_>, transport::Error> {
        let id = StreamId::from_varint(stream_id);
        let stream_type = id.stream_type();
        let index = type_index(stream_type);
        // streams of one type are numbered consecutively from 0
        let ordinal = stream_id.as_u64() >> 2;

        if id.initiator() == self.local_type {
            //= https://www.rfc-editor.org/rfc/rfc9000#section-19.8
            //# An endpoint MUST terminate the connection with error
            //# STREAM_STATE_ERROR if it receives a STREAM frame for a locally
            //# initiated stream that has not yet been created
            if ordinal >= self.local_opened[index] {
                return Err(transport::Error::STREAM_STATE_ERROR
                    .with_reason("frame for a local stream that was never opened"));
            }

            return match self.streams.get_mut(&id) {
                Some(stream) => Ok(Lookup::Stream(stream)),
                None => Ok(Lookup::Closed),
            };
        }

        //= https://www.rfc-editor.org/rfc/rfc9000#section-4.6
        //# An endpoint that receives a frame with a stream ID exceeding the
        //# limit it has sent MUST treat this as a connection error of type
        //# STREAM_LIMIT_ERROR
        if ordinal >= self.local_max_streams[index].as_u64() {
            return Err(transport::Error::STREAM_LIMIT_ERROR
                .with_reason("peer exceeded the advertised stream limit"));
        }

        //= https://www.rfc-editor.org/rfc/rfc9000#section-3.2
        //# A stream is opened by the peer along with every lower-numbered
        //# stream of the same type.
        while self.peer_opened[index] <= ordinal {
            let next = StreamId::nth(self.local_type.peer_type(), stream_type, self.peer_opened[index])
                .ok_or(transport::Error::INTERNAL_ERROR)?;
            self.peer_opened[index] += 1;
            self.insert(next);
        }

        match self.streams.get_mut(&id) {
            Some(stream) => Ok(Lookup::Stream(stream)),
            None => Ok(Lookup::Closed),
        }
    }

    fn insert(&mut self, id: StreamId) -> &mut Stream {
        let tx_limit = tx_limit_for(self.local_type, id, &self.peer_limits);
        let rx_limit = rx_limit_for(self.local_type, id, &self.local_limits);

        self.streams.entry(id).or_insert_with(|| Stream {
            id,
            send: SendState::default(),
            recv: RecvState::default(),
            flow: flow::stream::Controller::new(tx_limit, rx_limit),
            tx_offset: VarInt::ZERO,
            stop_sending: None,
            reset_error: None,
        })
    }

    /// Handles a received STREAM frame; returns the newly received byte
    /// count to charge against the connection scope
    pub fn on_stream_frame(
        &mut self,
        stream_id: VarInt,
        offset: VarInt,
        len: usize,
        is_fin: bool,
    ) -> Result<VarInt, transport::Error> {
        let local_type = self.local_type;
        let stream = match self.route(stream_id)? {
            Lookup::Stream(stream) => stream,
            Lookup::Closed => return Ok(VarInt::ZERO),
        };

        if !stream.is_recv_open(local_type) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_reason("stream data on a send-only stream"));
        }

        // the final-size checks run even when the data itself is stale
        let newly = stream.flow.on_stream_data(offset, len, is_fin)?;

        if !stream.recv.can_receive() {
            // data after a reset or past completion carries no new bytes
            return Ok(newly);
        }

        if is_fin {
            stream
                .recv
                .on_fin_received()
                .map_err(|_| transport::Error::STREAM_STATE_ERROR)?;
        }

        if let Some(final_size) = stream.flow.final_size() {
            if stream.flow.highest_received_offset() == final_size
                && stream.recv == RecvState::SizeKnown
            {
                let _ = stream.recv.on_all_data_received();
            }
        }

        Ok(newly)
    }

    /// Handles a received RESET_STREAM frame
    pub fn on_reset_stream(
        &mut self,
        frame: &corten_quic_core::frame::ResetStream,
    ) -> Result<VarInt, transport::Error> {
        let local_type = self.local_type;
        let stream = match self.route(frame.stream_id)? {
            Lookup::Stream(stream) => stream,
            Lookup::Closed => return Ok(VarInt::ZERO),
        };

        if !stream.is_recv_open(local_type) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_reason("reset for a send-only stream"));
        }

        let newly = stream.flow.on_reset(frame.final_size)?;

        if stream.recv.on_reset_received().is_ok() {
            stream.reset_error = Some(frame.application_error_code);
        }

        Ok(newly)
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-19.5
    //# Receiving a STOP_SENDING frame for a
    //# locally initiated stream that has not yet been created MUST be
    //# treated as a connection error of type STREAM_STATE_ERROR.

    /// Handles a received STOP_SENDING frame; the caller queues the
    /// RESET_STREAM answer when one is returned
    pub fn on_stop_sending(
        &mut self,
        frame: &corten_quic_core::frame::StopSending,
    ) -> Result<Option<corten_quic_core::frame::ResetStream>, transport::Error> {
        let local_type = self.local_type;
        let stream = match self.route(frame.stream_id)? {
            Lookup::Stream(stream) => stream,
            Lookup::Closed => return Ok(None),
        };

        if !stream.is_send_open(local_type) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_reason("stop sending for a receive-only stream"));
        }

        stream.stop_sending = Some(frame.application_error_code);

        //= https://www.rfc-editor.org/rfc/rfc9000#section-3.5
        //# An endpoint SHOULD copy the error code from the STOP_SENDING
        //# frame to the RESET_STREAM frame it sends, but it can use any
        //# application error code.
        if stream.send.on_reset_sent().is_ok() {
            return Ok(Some(corten_quic_core::frame::ResetStream {
                stream_id: frame.stream_id,
                application_error_code: frame.application_error_code,
                final_size: stream.tx_offset,
            }));
        }

        Ok(None)
    }

    /// Handles a received MAX_STREAM_DATA frame
    pub fn on_max_stream_data(
        &mut self,
        frame: &corten_quic_core::frame::MaxStreamData,
    ) -> Result<(), transport::Error> {
        let local_type = self.local_type;
        let stream = match self.route(frame.stream_id)? {
            Lookup::Stream(stream) => stream,
            Lookup::Closed => return Ok(()),
        };

        //= https://www.rfc-editor.org/rfc/rfc9000#section-19.10
        //# Receiving a MAX_STREAM_DATA frame for a receive-only stream
        //# MUST be treated as a connection error of type STREAM_STATE_ERROR.
        if !stream.is_send_open(local_type) {
            return Err(transport::Error::STREAM_STATE_ERROR
                .with_reason("max stream data for a receive-only stream"));
        }

        stream.flow.tx.on_max_data(frame.maximum_stream_data);
        Ok(())
    }
}

fn tx_limit_for(
    local_type: endpoint::Type,
    id: StreamId,
    peer_limits: &InitialFlowControlLimits,
) -> VarInt {
    match (id.stream_type(), id.initiator() == local_type) {
        // our bidi stream: remote-initiated from the peer's perspective
        (StreamType::Bidirectional, true) => peer_limits.max_stream_data_bidi_remote,
        // the peer's bidi stream: local from their perspective
        (StreamType::Bidirectional, false) => peer_limits.max_stream_data_bidi_local,
        (StreamType::Unidirectional, true) => peer_limits.max_stream_data_uni,
        // we never send on the peer's unidirectional stream
        (StreamType::Unidirectional, false) => VarInt::ZERO,
    }
}

fn rx_limit_for(
    local_type: endpoint::Type,
    id: StreamId,
    local_limits: &InitialFlowControlLimits,
) -> VarInt {
    match (id.stream_type(), id.initiator() == local_type) {
        (StreamType::Bidirectional, true) => local_limits.max_stream_data_bidi_local,
        (StreamType::Bidirectional, false) => local_limits.max_stream_data_bidi_remote,
        // we never receive on our own unidirectional stream
        (StreamType::Unidirectional, true) => VarInt::ZERO,
        (StreamType::Unidirectional, false) => local_limits.max_stream_data_uni,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_streams: u8) -> InitialFlowControlLimits {
        InitialFlowControlLimits {
            max_data: VarInt::from_u32(1 << 20),
            max_stream_data_bidi_local: VarInt::from_u32(1 << 16),
            max_stream_data_bidi_remote: VarInt::from_u32(1 << 16),
            max_stream_data_uni: VarInt::from_u32(1 << 16),
            max_streams_bidi: VarInt::from_u8(max_streams),
            max_streams_uni: VarInt::from_u8(max_streams),
        }
    }

    fn client_manager() -> Manager {
        Manager::new(endpoint::Type::Client, limits(16), limits(16))
    }

    fn server_manager() -> Manager {
        Manager::new(endpoint::Type::Server, limits(16), limits(16))
    }

    #[test]
    fn local_allocation_test() {
        let mut client = client_manager();
        let ids: Vec<u64> = (0..3)
            .map(|_| client.open_local(StreamType::Bidirectional).unwrap().into())
            .collect();
        assert_eq!(ids, vec![0, 4, 8]);

        let mut server = server_manager();
        let ids: Vec<u64> = (0..3)
            .map(|_| server.open_local(StreamType::Unidirectional).unwrap().into())
            .collect();
        assert_eq!(ids, vec![3, 7, 11]);
    }

    #[test]
    fn local_limit_test() {
        let mut client = Manager::new(endpoint::Type::Client, limits(16), limits(2));
        client.open_local(StreamType::Bidirectional).unwrap();
        client.open_local(StreamType::Bidirectional).unwrap();

        let error = client.open_local(StreamType::Bidirectional).unwrap_err();
        assert_eq!(error.code, transport::Error::STREAM_LIMIT_ERROR.code);

        // the blocked signal fires once per limit
        assert_eq!(
            client.poll_blocked(StreamType::Bidirectional),
            Some(VarInt::from_u8(2))
        );
        assert!(client.poll_blocked(StreamType::Bidirectional).is_none());

        // MAX_STREAMS unblocks
        client.on_max_streams(StreamType::Bidirectional, VarInt::from_u8(3));
        client.open_local(StreamType::Bidirectional).unwrap();
    }

    #[test]
    fn peer_open_up_to_id_test() {
        let mut server = server_manager();

        // client bidi stream 8 implicitly opens 0 and 4
        let newly = server
            .on_stream_frame(VarInt::from_u8(8), VarInt::ZERO, 10, false)
            .unwrap();
        assert_eq!(newly, VarInt::from_u8(10));
        assert_eq!(server.open_count(), 3);
        assert!(server.stream(StreamId::from_varint(VarInt::from_u8(0))).is_some());
        assert!(server.stream(StreamId::from_varint(VarInt::from_u8(4))).is_some());
    }

    #[test]
    fn unopened_local_stream_test() {
        let mut server = server_manager();

        // stream 1 is server-initiated bidi, but the server never opened it
        let error = server
            .on_stream_frame(VarInt::from_u8(1), VarInt::ZERO, 1, false)
            .unwrap_err();
        assert_eq!(error.code, transport::Error::STREAM_STATE_ERROR.code);
    }

    #[test]
    fn peer_stream_limit_test() {
        let mut server = Manager::new(endpoint::Type::Server, limits(2), limits(16));

        server
            .on_stream_frame(VarInt::from_u8(4), VarInt::ZERO, 1, false)
            .unwrap();

        // stream 8 would be the third client bidi stream
        let error = server
            .on_stream_frame(VarInt::from_u8(8), VarInt::ZERO, 1, false)
            .unwrap_err();
        assert_eq!(error.code, transport::Error::STREAM_LIMIT_ERROR.code);
    }

    #[test]
    fn send_only_stream_data_test() {
        let mut client = client_manager();
        let id = client.open_local(StreamType::Unidirectional).unwrap();

        // the peer must never send data on our unidirectional stream
        let error = client
            .on_stream_frame(id.as_varint(), VarInt::ZERO, 1, false)
            .unwrap_err();
        assert_eq!(error.code, transport::Error::STREAM_STATE_ERROR.code);
    }

    #[test]
    fn reset_stream_test() {
        let mut server = server_manager();
        server
            .on_stream_frame(VarInt::from_u8(0), VarInt::ZERO, 10, false)
            .unwrap();

        let frame = corten_quic_core::frame::ResetStream {
            stream_id: VarInt::from_u8(0),
            application_error_code: VarInt::from_u8(7),
            final_size: VarInt::from_u8(10),
        };
        server.on_reset_stream(&frame).unwrap();

        let stream = server
            .stream(StreamId::from_varint(VarInt::from_u8(0)))
            .unwrap();
        assert_eq!(stream.recv, RecvState::ResetRecvd);
        assert_eq!(stream.reset_error, Some(VarInt::from_u8(7)));

        // final size disagreement on a second reset
        let frame = corten_quic_core::frame::ResetStream {
            stream_id: VarInt::from_u8(0),
            application_error_code: VarInt::from_u8(7),
            final_size: VarInt::from_u8(11),
        };
        let error = server.on_reset_stream(&frame).unwrap_err();
        assert_eq!(error.code, transport::Error::FINAL_SIZE_ERROR.code);
    }

    #[test]
    fn stop_sending_answers_with_reset_test() {
        let mut client = client_manager();
        let id = client.open_local(StreamType::Bidirectional).unwrap();

        let frame = corten_quic_core::frame::StopSending {
            stream_id: id.as_varint(),
            application_error_code: VarInt::from_u8(3),
        };
        let reset = client.on_stop_sending(&frame).unwrap().unwrap();
        assert_eq!(reset.stream_id, id.as_varint());
        assert_eq!(reset.application_error_code, VarInt::from_u8(3));

        let stream = client.stream(id).unwrap();
        assert_eq!(stream.send, SendState::ResetSent);
    }

    #[test]
    fn max_stream_data_on_receive_only_test() {
        let mut server = server_manager();

        // client uni stream 2: the server can only receive there
        server
            .on_stream_frame(VarInt::from_u8(2), VarInt::ZERO, 1, false)
            .unwrap();

        let frame = corten_quic_core::frame::MaxStreamData {
            stream_id: VarInt::from_u8(2),
            maximum_stream_data: VarInt::from_u16(1000),
        };
        let error = server.on_max_stream_data(&frame).unwrap_err();
        assert_eq!(error.code, transport::Error::STREAM_STATE_ERROR.code);
    }
}
