// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The QUIC-facing surface of a TLS 1.3 provider
//!
//! The transport never looks inside TLS messages: it shuttles CRYPTO
//! payloads between packets and the session, and the session hands back
//! per-level secrets, the peer's transport parameters, and a completion
//! signal through the [`Context`] callbacks.

use corten_quic_core::{crypto::CryptoSuite, crypto::Level, transport};

/// The callbacks a session drives as the handshake progresses
pub trait Context<S: CryptoSuite> {
    /// Queue handshake bytes for transmission at `level`
    fn deliver_crypto(&mut self, level: Level, data: Vec<u8>);

    /// Keys for the Handshake level are available
    fn install_handshake_keys(&mut self, key: S::HandshakeKey, header_key: S::HandshakeHeaderKey);

    /// Keys for the 1-RTT level are available
    fn install_one_rtt_keys(&mut self, key: S::OneRttKey, header_key: S::OneRttHeaderKey);

    /// Keys for 0-RTT data are available
    fn install_zero_rtt_keys(&mut self, key: S::ZeroRttKey, header_key: S::ZeroRttHeaderKey);

    /// The peer's quic_transport_parameters extension arrived
    fn on_peer_parameters(&mut self, encoded: &[u8]) -> Result<(), transport::Error>;

    /// The TLS handshake completed
    fn on_handshake_complete(&mut self);
}

/// One TLS session, owned by a connection
pub trait Session: 'static + Send + Sized {
    type Suite: CryptoSuite;

    /// Feeds CRYPTO bytes received at `level`, in order
    fn on_crypto_data<C: Context<Self::Suite>>(
        &mut self,
        level: Level,
        data: &[u8],
        context: &mut C,
    ) -> Result<(), transport::Error>;

    /// Drives any session-initiated output (the client's first flight)
    fn poll<C: Context<Self::Suite>>(&mut self, context: &mut C)
        -> Result<(), transport::Error>;

    fn is_handshake_complete(&self) -> bool;
}

/// Creates sessions for an endpoint's connections
pub trait Endpoint: 'static {
    type Session: Session;

    /// `transport_parameters` is the already encoded local extension
    /// payload the session carries to the peer
    fn new_server_session(&mut self, transport_parameters: Vec<u8>) -> Self::Session;

    fn new_client_session(
        &mut self,
        transport_parameters: Vec<u8>,
        server_name: &str,
    ) -> Self::Session;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! A deterministic handshake for exercising the transport without a
    //! real TLS stack.
    //!
    //! The flights mirror TLS 1.3's shape: the client sends a hello
    //! carrying its transport parameters at the Initial level; the server
    //! answers with a hello (Initial), then its parameters and a finished
    //! marker (Handshake); the client closes with its own finished marker.

    use super::{Context, Level, Session};
    use corten_quic_core::{crypto::testing as crypto, endpoint, transport};

    const CLIENT_HELLO: u8 = 0x01;
    const SERVER_HELLO: u8 = 0x02;
    const ENCRYPTED_EXTENSIONS: u8 = 0x03;
    const SERVER_FINISHED: u8 = 0x04;
    const CLIENT_FINISHED: u8 = 0x05;

    fn message(tag: u8, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + body.len());
        out.push(tag);
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[derive(Debug, Default)]
    struct Reassembler {
        buffer: Vec<u8>,
    }

    impl Reassembler {
        fn push(&mut self, data: &[u8]) {
            self.buffer.extend_from_slice(data);
        }

        fn pop(&mut self) -> Option<(u8, Vec<u8>)> {
            if self.buffer.len() < 3 {
                return None;
            }

            let tag = self.buffer[0];
            let len = u16::from_be_bytes([self.buffer[1], self.buffer[2]]) as usize;
            if self.buffer.len() < 3 + len {
                return None;
            }

            let body = self.buffer[3..3 + len].to_vec();
            self.buffer.drain(..3 + len);
            Some((tag, body))
        }
    }

    #[derive(Debug)]
    pub struct MockSession {
        endpoint_type: endpoint::Type,
        transport_parameters: Vec<u8>,
        hello_sent: bool,
        complete: bool,
        initial_rx: Reassembler,
        handshake_rx: Reassembler,
    }

    impl MockSession {
        pub fn new_client(transport_parameters: Vec<u8>) -> Self {
            Self::new(endpoint::Type::Client, transport_parameters)
        }

        pub fn new_server(transport_parameters: Vec<u8>) -> Self {
            Self::new(endpoint::Type::Server, transport_parameters)
        }

        fn new(endpoint_type: endpoint::Type, transport_parameters: Vec<u8>) -> Self {
            Self {
                endpoint_type,
                transport_parameters,
                hello_sent: false,
                complete: false,
                initial_rx: Reassembler::default(),
                handshake_rx: Reassembler::default(),
            }
        }

        fn process<C: Context<crypto::Suite>>(
            &mut self,
            context: &mut C,
        ) -> Result<(), transport::Error> {
            while let Some((tag, body)) = self.initial_rx.pop() {
                match (self.endpoint_type, tag) {
                    (endpoint::Type::Server, CLIENT_HELLO) => {
                        context.on_peer_parameters(&body)?;

                        context.deliver_crypto(Level::Initial, message(SERVER_HELLO, &[]));
                        context.install_handshake_keys(
                            crypto::Key::default(),
                            crypto::HeaderKey,
                        );
                        context.deliver_crypto(
                            Level::Handshake,
                            message(ENCRYPTED_EXTENSIONS, &self.transport_parameters),
                        );
                        context.deliver_crypto(Level::Handshake, message(SERVER_FINISHED, &[]));
                        context.install_one_rtt_keys(crypto::Key::default(), crypto::HeaderKey);
                    }
                    (endpoint::Type::Client, SERVER_HELLO) => {
                        context.install_handshake_keys(
                            crypto::Key::default(),
                            crypto::HeaderKey,
                        );
                    }
                    _ => {
                        return Err(transport::Error::crypto_error(10)
                            .with_reason("unexpected handshake message"));
                    }
                }
            }

            while let Some((tag, body)) = self.handshake_rx.pop() {
                match (self.endpoint_type, tag) {
                    (endpoint::Type::Client, ENCRYPTED_EXTENSIONS) => {
                        context.on_peer_parameters(&body)?;
                    }
                    (endpoint::Type::Client, SERVER_FINISHED) => {
                        context.install_one_rtt_keys(crypto::Key::default(), crypto::HeaderKey);
                        context.deliver_crypto(Level::Handshake, message(CLIENT_FINISHED, &[]));
                        self.complete = true;
                        context.on_handshake_complete();
                    }
                    (endpoint::Type::Server, CLIENT_FINISHED) => {
                        self.complete = true;
                        context.on_handshake_complete();
                    }
                    _ => {
                        return Err(transport::Error::crypto_error(10)
                            .with_reason("unexpected handshake message"));
                    }
                }
            }

            Ok(())
        }
    }

    impl Session for MockSession {
        type Suite = crypto::Suite;

        fn on_crypto_data<C: Context<Self::Suite>>(
            &mut self,
            level: Level,
            data: &[u8],
            context: &mut C,
        ) -> Result<(), transport::Error> {
            match level {
                Level::Initial => self.initial_rx.push(data),
                Level::Handshake => self.handshake_rx.push(data),
                _ => {
                    return Err(transport::Error::PROTOCOL_VIOLATION
                        .with_reason("crypto data at an unexpected level"))
                }
            }

            self.process(context)
        }

        fn poll<C: Context<Self::Suite>>(
            &mut self,
            context: &mut C,
        ) -> Result<(), transport::Error> {
            if self.endpoint_type.is_client() && !self.hello_sent {
                self.hello_sent = true;
                context.deliver_crypto(
                    Level::Initial,
                    message(CLIENT_HELLO, &self.transport_parameters),
                );
            }
            Ok(())
        }

        fn is_handshake_complete(&self) -> bool {
            self.complete
        }
    }

    /// Produces mock sessions
    #[derive(Debug, Default)]
    pub struct MockEndpoint;

    impl super::Endpoint for MockEndpoint {
        type Session = MockSession;

        fn new_server_session(&mut self, transport_parameters: Vec<u8>) -> Self::Session {
            MockSession::new_server(transport_parameters)
        }

        fn new_client_session(
            &mut self,
            transport_parameters: Vec<u8>,
            _server_name: &str,
        ) -> Self::Session {
            MockSession::new_client(transport_parameters)
        }
    }
}
