// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The corten-quic transport: per-connection protocol state machines and
//! the endpoint that routes datagrams to them.
//!
//! The crate is written sans-I/O: the host owns the UDP socket and the
//! clock, feeds datagrams in with [`endpoint::Endpoint::on_datagram`] and
//! drains outgoing datagrams with `poll_transmit`. Every connection is a
//! single-owner state machine; nothing in here spawns tasks or blocks.

pub mod connection;
pub mod endpoint;
pub mod flow;
pub mod path;
pub mod space;
pub mod stream;
pub mod tls;
pub mod transmission;

pub use connection::Connection;
pub use endpoint::Endpoint;
