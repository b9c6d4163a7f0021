// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::varint::{VarInt, VarIntError};
use core::fmt;
use corten_codec::DecoderError;

//= https://www.rfc-editor.org/rfc/rfc9000#section-20
//# QUIC transport error codes and application error codes are 62-bit
//# unsigned integers.

/// A connection-level error carrying an RFC 9000 transport error code
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Error {
    pub code: VarInt,
    pub frame_type: Option<VarInt>,
    pub reason: &'static str,
}

impl Error {
    pub const fn new(code: VarInt) -> Self {
        Self {
            code,
            frame_type: None,
            reason: "",
        }
    }

    #[must_use]
    pub const fn with_frame_type(mut self, frame_type: VarInt) -> Self {
        self.frame_type = Some(frame_type);
        self
    }

    #[must_use]
    pub const fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = reason;
        self
    }

    //= https://www.rfc-editor.org/rfc/rfc9001#section-4.8
    //# A TLS alert is converted into a QUIC connection error.  The
    //# AlertDescription value is added to 0x0100 to produce a QUIC error
    //# code from the range reserved for CRYPTO_ERROR.
    pub const fn crypto_error(alert: u8) -> Self {
        Self::new(VarInt::from_u16(0x0100 + alert as u16))
    }

    /// True if the code lies in the CRYPTO_ERROR range (0x0100..=0x01ff)
    pub fn is_crypto_error(&self) -> bool {
        (0x0100u64..=0x01ff).contains(&self.code.as_u64())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.reason.is_empty() {
            let code: u64 = self.code.into();
            write!(f, "transport::Error({code:#x})")
        } else {
            f.write_str(self.reason)
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Internal convenience macro for defining the standard error codes
macro_rules! def_error {
    ($doc:expr, $name:ident, $code:expr) => {
        impl Error {
            #[doc = $doc]
            pub const $name: Self = Self::new(VarInt::from_u8($code));
        }
    };
}

def_error!(
    "The connection is being closed abruptly in the absence of any error.",
    NO_ERROR,
    0x0
);
def_error!(
    "The endpoint encountered an internal error and cannot continue with the connection.",
    INTERNAL_ERROR,
    0x1
);
def_error!(
    "The server refused to accept a new connection.",
    CONNECTION_REFUSED,
    0x2
);
def_error!(
    "An endpoint received more data than it permitted in its advertised data limits.",
    FLOW_CONTROL_ERROR,
    0x3
);
def_error!(
    "An endpoint received a frame for a stream identifier that exceeded its advertised stream limit for the corresponding stream type.",
    STREAM_LIMIT_ERROR,
    0x4
);
def_error!(
    "An endpoint received a frame for a stream that was not in a state that permitted that frame.",
    STREAM_STATE_ERROR,
    0x5
);
def_error!(
    "An endpoint received a STREAM or RESET_STREAM frame that contradicts a previously established final size.",
    FINAL_SIZE_ERROR,
    0x6
);
def_error!(
    "An endpoint received a frame that was badly formatted.",
    FRAME_ENCODING_ERROR,
    0x7
);
def_error!(
    "An endpoint received transport parameters that were badly formatted, absent, or otherwise in error.",
    TRANSPORT_PARAMETER_ERROR,
    0x8
);
def_error!(
    "The number of provided connection ids exceeds the advertised active_connection_id_limit.",
    CONNECTION_ID_LIMIT_ERROR,
    0x9
);
def_error!(
    "An endpoint detected an error with protocol compliance that was not covered by more specific error codes.",
    PROTOCOL_VIOLATION,
    0xa
);
def_error!(
    "A server received a client Initial that contained an invalid Token field.",
    INVALID_TOKEN,
    0xb
);
def_error!(
    "The application or application protocol caused the connection to be closed.",
    APPLICATION_ERROR,
    0xc
);
def_error!(
    "An endpoint received more data in CRYPTO frames than it can buffer.",
    CRYPTO_BUFFER_EXCEEDED,
    0xd
);
def_error!(
    "An endpoint detected errors in performing key updates.",
    KEY_UPDATE_ERROR,
    0xe
);
def_error!(
    "An endpoint has reached the confidentiality or integrity limit for the AEAD algorithm.",
    AEAD_LIMIT_REACHED,
    0xf
);
def_error!(
    "An endpoint has determined that the network path is incapable of supporting QUIC.",
    NO_VIABLE_PATH,
    0x10
);

//= https://www.rfc-editor.org/rfc/rfc9000#section-10.2.3
//# A CONNECTION_CLOSE of type 0x1d MUST be replaced by a CONNECTION_CLOSE
//# of type 0x1c when sending the frame in Initial or Handshake packets.
//# Otherwise, information about the application state might be revealed.
//# Endpoints MUST clear the value of the Reason Phrase field and SHOULD
//# use the APPLICATION_ERROR code when converting to a CONNECTION_CLOSE
//# of type 0x1c.

impl From<DecoderError> for Error {
    fn from(error: DecoderError) -> Self {
        match error {
            DecoderError::InvariantViolation(reason) => {
                Self::PROTOCOL_VIOLATION.with_reason(reason)
            }
            _ => Self::FRAME_ENCODING_ERROR.with_reason("malformed input"),
        }
    }
}

impl From<VarIntError> for Error {
    fn from(_: VarIntError) -> Self {
        Self::INTERNAL_ERROR.with_reason("varint range exceeded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_error_range_test() {
        let error = Error::crypto_error(40);
        assert_eq!(error.code.as_u64(), 0x0128);
        assert!(error.is_crypto_error());
        assert!(!Error::PROTOCOL_VIOLATION.is_crypto_error());
    }

    #[test]
    fn decoder_error_mapping_test() {
        let error: Error = DecoderError::UnexpectedEof(4).into();
        assert_eq!(error.code, Error::FRAME_ENCODING_ERROR.code);

        let error: Error = DecoderError::InvariantViolation("bad frame").into();
        assert_eq!(error.code, Error::PROTOCOL_VIOLATION.code);
        assert_eq!(error.reason, "bad frame");
    }
}
