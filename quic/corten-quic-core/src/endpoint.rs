// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

/// The role of an endpoint on a connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Client,
    Server,
}

impl Type {
    #[inline]
    pub fn is_client(self) -> bool {
        self == Type::Client
    }

    #[inline]
    pub fn is_server(self) -> bool {
        self == Type::Server
    }

    /// Returns the type of the peer endpoint
    #[inline]
    pub fn peer_type(self) -> Self {
        match self {
            Type::Client => Type::Server,
            Type::Server => Type::Client,
        }
    }
}
