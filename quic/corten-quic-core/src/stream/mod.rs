// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod id;
pub mod recv_state;
pub mod send_state;
pub mod type_;

pub use id::StreamId;
pub use recv_state::RecvState;
pub use send_state::SendState;
pub use type_::StreamType;
