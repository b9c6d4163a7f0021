// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;

//= https://www.rfc-editor.org/rfc/rfc9000#section-3.2
//#        o
//#        | Recv STREAM / STREAM_DATA_BLOCKED / RESET_STREAM
//#        | Create Bidirectional Stream (Sending)
//#        | Recv MAX_STREAM_DATA / STOP_SENDING (Bidirectional)
//#        | Create Higher-Numbered Stream
//#        v
//#    +-------+
//#    | Recv  | Recv RESET_STREAM
//#    |       |-----------------------.
//#    +-------+                       |
//#        |                           |
//#        | Recv STREAM + FIN         |
//#        v                           |
//#    +-------+                       |
//#    | Size  | Recv RESET_STREAM     |
//#    | Known |---------------------->|
//#    +-------+                       |
//#        |                           |
//#        | Recv All Data             |
//#        v                           v
//#    +-------+ Recv RESET_STREAM +-------+
//#    | Data  |--- (optional) --->| Reset |
//#    | Recvd |  Recv All Data    | Recvd |
//#    +-------+ <-- (optional) ---+-------+
//#        |                           |
//#        | App Read All Data         | App Read Reset
//#        v                           v
//#    +-------+                   +-------+
//#    | Data  |                   | Reset |
//#    | Read  |                   | Read  |
//#    +-------+                   +-------+

/// The receiving half of a stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecvState {
    #[default]
    Recv,
    SizeKnown,
    DataRecvd,
    DataRead,
    ResetRecvd,
    ResetRead,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: RecvState,
    pub event: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid recv transition {:?} on {}", self.from, self.event)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidTransition {}

impl RecvState {
    /// A frame carrying the FIN arrived, fixing the final size
    pub fn on_fin_received(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::Recv | Self::SizeKnown => {
                *self = Self::SizeKnown;
                Ok(())
            }
            _ => Err(self.invalid("fin received")),
        }
    }

    /// Every byte up to the final size has arrived
    pub fn on_all_data_received(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::SizeKnown => {
                *self = Self::DataRecvd;
                Ok(())
            }
            _ => Err(self.invalid("all data received")),
        }
    }

    /// A RESET_STREAM arrived
    pub fn on_reset_received(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::Recv | Self::SizeKnown | Self::DataRecvd => {
                *self = Self::ResetRecvd;
                Ok(())
            }
            _ => Err(self.invalid("reset received")),
        }
    }

    /// The application consumed the final byte
    pub fn on_data_read(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::DataRecvd => {
                *self = Self::DataRead;
                Ok(())
            }
            _ => Err(self.invalid("data read")),
        }
    }

    /// The application observed the reset
    pub fn on_reset_read(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::ResetRecvd => {
                *self = Self::ResetRead;
                Ok(())
            }
            _ => Err(self.invalid("reset read")),
        }
    }

    /// True once the final size is pinned, by FIN or by reset
    #[inline]
    pub fn is_size_known(&self) -> bool {
        !matches!(self, Self::Recv)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DataRead | Self::ResetRead)
    }

    /// True while new STREAM data is still acceptable
    #[inline]
    pub fn can_receive(&self) -> bool {
        matches!(self, Self::Recv | Self::SizeKnown)
    }

    fn invalid(&self, event: &'static str) -> InvalidTransition {
        InvalidTransition { from: *self, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_path_test() {
        let mut state = RecvState::default();
        state.on_fin_received().unwrap();
        assert_eq!(state, RecvState::SizeKnown);
        state.on_all_data_received().unwrap();
        assert_eq!(state, RecvState::DataRecvd);
        state.on_data_read().unwrap();
        assert_eq!(state, RecvState::DataRead);
        assert!(state.is_terminal());
    }

    #[test]
    fn reset_path_test() {
        let mut state = RecvState::default();
        state.on_reset_received().unwrap();
        assert_eq!(state, RecvState::ResetRecvd);
        state.on_reset_read().unwrap();
        assert_eq!(state, RecvState::ResetRead);
        assert!(state.is_terminal());

        // a late reset is rejected once read
        assert!(state.on_reset_received().is_err());
    }

    #[test]
    fn reset_after_data_test() {
        let mut state = RecvState::default();
        state.on_fin_received().unwrap();
        state.on_all_data_received().unwrap();
        state.on_reset_received().unwrap();
        assert_eq!(state, RecvState::ResetRecvd);
    }
}
