// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use corten_quic_core::{
    connection, time::Duration, transport::parameters::TransportParameters, varint::VarInt,
};

/// Locally configured connection limits; the source of the transport
/// parameters this endpoint advertises
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub(crate) max_idle_timeout: Duration,
    pub(crate) initial_max_data: VarInt,
    pub(crate) initial_max_stream_data_bidi_local: VarInt,
    pub(crate) initial_max_stream_data_bidi_remote: VarInt,
    pub(crate) initial_max_stream_data_uni: VarInt,
    pub(crate) initial_max_streams_bidi: VarInt,
    pub(crate) initial_max_streams_uni: VarInt,
    pub(crate) max_ack_delay: Duration,
    pub(crate) ack_ranges_capacity: usize,
    /// The draining period is this many probe timeouts
    pub(crate) draining_pto_factor: u32,
    pub(crate) initial_pto: Duration,
    pub(crate) path_validation_timeout: Duration,
    pub(crate) path_revalidation_threshold: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_idle_timeout: Duration::from_secs(30),
            initial_max_data: VarInt::from_u32(1 << 20),
            initial_max_stream_data_bidi_local: VarInt::from_u32(1 << 17),
            initial_max_stream_data_bidi_remote: VarInt::from_u32(1 << 17),
            initial_max_stream_data_uni: VarInt::from_u32(1 << 17),
            initial_max_streams_bidi: VarInt::from_u8(100),
            initial_max_streams_uni: VarInt::from_u8(100),
            max_ack_delay: Duration::from_millis(25),
            ack_ranges_capacity: 64,
            draining_pto_factor: 3,
            initial_pto: Duration::from_millis(999),
            path_validation_timeout: Duration::from_secs(3),
            path_revalidation_threshold: Duration::from_secs(60),
        }
    }
}

impl Limits {
    pub fn builder() -> Builder {
        Builder {
            limits: Self::default(),
        }
    }

    /// The period spent in the closing state before the connection is
    /// destroyed
    pub(crate) fn draining_duration(&self) -> Duration {
        self.initial_pto * self.draining_pto_factor
    }

    /// Builds the transport parameters this endpoint advertises
    pub(crate) fn transport_parameters(
        &self,
        initial_source_connection_id: connection::Id,
    ) -> TransportParameters {
        let mut parameters = TransportParameters::default();
        parameters.max_idle_timeout =
            VarInt::new(self.max_idle_timeout.as_millis() as u64).unwrap_or(VarInt::MAX);
        parameters.initial_max_data = self.initial_max_data;
        parameters.initial_max_stream_data_bidi_local = self.initial_max_stream_data_bidi_local;
        parameters.initial_max_stream_data_bidi_remote = self.initial_max_stream_data_bidi_remote;
        parameters.initial_max_stream_data_uni = self.initial_max_stream_data_uni;
        parameters.initial_max_streams_bidi = self.initial_max_streams_bidi;
        parameters.initial_max_streams_uni = self.initial_max_streams_uni;
        parameters.max_ack_delay =
            VarInt::new(self.max_ack_delay.as_millis() as u64).unwrap_or(VarInt::MAX);
        parameters.initial_source_connection_id = Some(initial_source_connection_id);
        parameters
    }
}

#[derive(Clone, Debug)]
pub struct Builder {
    limits: Limits,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationError(&'static str);

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for ValidationError {}

impl Builder {
    /// Zero disables the idle timeout
    pub fn with_max_idle_timeout(mut self, timeout: Duration) -> Result<Self, ValidationError> {
        if timeout.as_millis() >= 1 << 62 {
            return Err(ValidationError("idle timeout exceeds the varint range"));
        }
        self.limits.max_idle_timeout = timeout;
        Ok(self)
    }

    pub fn with_max_data(mut self, value: VarInt) -> Result<Self, ValidationError> {
        self.limits.initial_max_data = value;
        Ok(self)
    }

    pub fn with_max_stream_data(mut self, value: VarInt) -> Result<Self, ValidationError> {
        self.limits.initial_max_stream_data_bidi_local = value;
        self.limits.initial_max_stream_data_bidi_remote = value;
        self.limits.initial_max_stream_data_uni = value;
        Ok(self)
    }

    pub fn with_max_open_streams(mut self, value: VarInt) -> Result<Self, ValidationError> {
        self.limits.initial_max_streams_bidi = value;
        self.limits.initial_max_streams_uni = value;
        Ok(self)
    }

    pub fn with_max_ack_delay(mut self, delay: Duration) -> Result<Self, ValidationError> {
        //= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
        //# Values of 2^14 or greater are invalid.
        if delay.as_millis() >= 1 << 14 {
            return Err(ValidationError("max_ack_delay must be less than 2^14 ms"));
        }
        self.limits.max_ack_delay = delay;
        Ok(self)
    }

    pub fn with_ack_ranges_capacity(mut self, capacity: usize) -> Result<Self, ValidationError> {
        if capacity == 0 {
            return Err(ValidationError("at least one ack range must be tracked"));
        }
        self.limits.ack_ranges_capacity = capacity;
        Ok(self)
    }

    pub fn with_path_validation_timeout(
        mut self,
        timeout: Duration,
    ) -> Result<Self, ValidationError> {
        if timeout.is_zero() {
            return Err(ValidationError("path validation needs a non-zero timeout"));
        }
        self.limits.path_validation_timeout = timeout;
        Ok(self)
    }

    pub fn build(self) -> Limits {
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_validation_test() {
        assert!(Limits::builder()
            .with_max_ack_delay(Duration::from_millis(1 << 14))
            .is_err());
        assert!(Limits::builder().with_ack_ranges_capacity(0).is_err());

        let limits = Limits::builder()
            .with_max_ack_delay(Duration::from_millis(10))
            .unwrap()
            .with_max_data(VarInt::from_u32(4096))
            .unwrap()
            .build();
        assert_eq!(limits.max_ack_delay, Duration::from_millis(10));
        assert_eq!(limits.initial_max_data, VarInt::from_u32(4096));
    }

    #[test]
    fn transport_parameters_test() {
        let limits = Limits::default();
        let id = connection::Id::try_from(&[1u8, 2, 3, 4][..]).unwrap();
        let parameters = limits.transport_parameters(id);

        assert_eq!(parameters.initial_max_data, limits.initial_max_data);
        assert_eq!(parameters.initial_source_connection_id, Some(id));
        assert_eq!(parameters.max_ack_delay.as_u64(), 25);
    }
}
