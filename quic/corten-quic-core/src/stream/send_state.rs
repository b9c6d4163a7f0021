// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;

//= https://www.rfc-editor.org/rfc/rfc9000#section-3.1
//#        o
//#        | Create Stream (Sending)
//#        | Peer Creates Bidirectional Stream
//#        v
//#    +-------+
//#    | Ready | Send RESET_STREAM
//#    |       |-----------------------.
//#    +-------+                       |
//#        |                           |
//#        | Send STREAM /             |
//#        |      STREAM_DATA_BLOCKED  |
//#        v                           |
//#    +-------+                       |
//#    | Send  | Send RESET_STREAM     |
//#    |       |---------------------->|
//#    +-------+                       |
//#        |                           |
//#        | Send STREAM + FIN         |
//#        v                           v
//#    +-------+                   +-------+
//#    | Data  | Send RESET_STREAM | Reset |
//#    | Sent  |------------------>| Sent  |
//#    +-------+                   +-------+
//#        |                           |
//#        | Recv All ACKs             | Recv ACK
//#        v                           v
//#    +-------+                   +-------+
//#    | Data  |                   | Reset |
//#    | Recvd |                   | Recvd |
//#    +-------+                   +-------+

/// The sending half of a stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendState {
    #[default]
    Ready,
    Send,
    DataSent,
    DataRecvd,
    ResetSent,
    ResetRecvd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SendState,
    pub event: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid send transition {:?} on {}", self.from, self.event)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidTransition {}

impl SendState {
    /// The application queued data for sending
    pub fn on_send(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::Ready | Self::Send => {
                *self = Self::Send;
                Ok(())
            }
            _ => Err(self.invalid("send")),
        }
    }

    /// All data including the FIN was handed to the transport
    pub fn on_fin_sent(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::Ready | Self::Send => {
                *self = Self::DataSent;
                Ok(())
            }
            _ => Err(self.invalid("fin sent")),
        }
    }

    /// Every byte up to the final size was acknowledged
    pub fn on_all_data_acked(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::DataSent => {
                *self = Self::DataRecvd;
                Ok(())
            }
            _ => Err(self.invalid("all data acked")),
        }
    }

    /// A RESET_STREAM was emitted
    pub fn on_reset_sent(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::Ready | Self::Send | Self::DataSent => {
                *self = Self::ResetSent;
                Ok(())
            }
            _ => Err(self.invalid("reset sent")),
        }
    }

    /// The RESET_STREAM was acknowledged
    pub fn on_reset_acked(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::ResetSent => {
                *self = Self::ResetRecvd;
                Ok(())
            }
            _ => Err(self.invalid("reset acked")),
        }
    }

    /// True once no further bytes may be queued
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DataRecvd | Self::ResetRecvd)
    }

    /// True while STREAM frames may still be emitted
    #[inline]
    pub fn can_transmit(&self) -> bool {
        matches!(self, Self::Ready | Self::Send | Self::DataSent)
    }

    fn invalid(&self, event: &'static str) -> InvalidTransition {
        InvalidTransition { from: *self, event }
    }
}
