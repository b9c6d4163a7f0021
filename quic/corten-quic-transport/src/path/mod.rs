// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-connection network paths: validation, migration and statistics

use corten_quic_core::{
    frame::path_challenge,
    path::{Challenge, State},
    random,
    time::{Duration, Timestamp},
    transport,
};
use std::net::SocketAddr;

/// The number of paths tracked at once; spoofed source addresses must not
/// grow this without bound
pub const MAX_ACTIVE_PATHS: usize = 4;

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.2
//# If no previous RTT is available, the initial RTT SHOULD be set to
//# 333 milliseconds.
pub const DEFAULT_INITIAL_RTT: Duration = Duration::from_millis(333);

//= https://www.rfc-editor.org/rfc/rfc9000#section-14
//# QUIC assumes a minimum IP packet size of at least 1280 bytes.
pub const DEFAULT_MTU: u16 = 1200;

#[derive(Debug)]
pub struct Path {
    pub remote_address: SocketAddr,
    pub state: State,
    challenge: Challenge,
    pub rtt: Duration,
    pub mtu: u16,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub last_validated: Option<Timestamp>,
    pub is_primary: bool,
}

impl Path {
    fn new(remote_address: SocketAddr) -> Self {
        Self {
            remote_address,
            state: State::Unknown,
            challenge: Challenge::default(),
            rtt: DEFAULT_INITIAL_RTT,
            mtu: DEFAULT_MTU,
            bytes_sent: 0,
            bytes_received: 0,
            last_validated: None,
            is_primary: false,
        }
    }
}

/// The set of active paths; exactly one is primary
#[derive(Debug)]
pub struct Manager {
    paths: Vec<Path>,
}

impl Manager {
    /// Creates the manager with the handshake path as primary
    pub fn new(remote_address: SocketAddr) -> Self {
        let mut path = Path::new(remote_address);
        path.is_primary = true;

        Self { paths: vec![path] }
    }

    #[inline]
    pub fn primary(&self) -> &Path {
        self.paths
            .iter()
            .find(|path| path.is_primary)
            .expect("one path is always primary")
    }

    #[inline]
    pub fn path(&self, remote_address: SocketAddr) -> Option<&Path> {
        self.paths
            .iter()
            .find(|path| path.remote_address == remote_address)
    }

    fn path_mut(&mut self, remote_address: SocketAddr) -> Option<&mut Path> {
        self.paths
            .iter_mut()
            .find(|path| path.remote_address == remote_address)
    }

    fn ensure_path(&mut self, remote_address: SocketAddr) -> Result<&mut Path, transport::Error> {
        if let Some(index) = self
            .paths
            .iter()
            .position(|path| path.remote_address == remote_address)
        {
            return Ok(&mut self.paths[index]);
        }

        if self.paths.len() >= MAX_ACTIVE_PATHS {
            // evict a dead path before refusing
            if let Some(index) = self.paths.iter().position(|path| {
                !path.is_primary && matches!(path.state, State::Failed | State::Abandoned)
            }) {
                self.paths.remove(index);
            } else {
                return Err(transport::Error::NO_VIABLE_PATH
                    .with_reason("too many active paths"));
            }
        }

        self.paths.push(Path::new(remote_address));
        Ok(self.paths.last_mut().expect("just pushed"))
    }

    /// Records an inbound datagram; returns true when the remote address
    /// was not seen before
    pub fn on_datagram_received(
        &mut self,
        remote_address: SocketAddr,
        len: usize,
    ) -> Result<bool, transport::Error> {
        let is_new = self.path(remote_address).is_none();
        let path = self.ensure_path(remote_address)?;
        path.bytes_received += len as u64;
        Ok(is_new)
    }

    pub fn on_bytes_sent(&mut self, remote_address: SocketAddr, len: usize) {
        if let Some(path) = self.path_mut(remote_address) {
            path.bytes_sent += len as u64;
        }
    }

    /// The handshake itself validates the path it ran on
    pub fn on_handshake_confirmed(&mut self, now: Timestamp) {
        for path in &mut self.paths {
            if path.is_primary {
                path.state = State::Validated;
                path.last_validated = Some(now);
            }
        }
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-8.2.1
    //# An endpoint MUST NOT reuse the data from a previous PATH_CHALLENGE;
    //# doing so allows an attacker to forge a PATH_RESPONSE.

    /// Starts validating a path, returning the challenge data to transmit
    pub fn start_validation(
        &mut self,
        remote_address: SocketAddr,
        now: Timestamp,
        expiration: Duration,
        random: &mut dyn random::Generator,
    ) -> Result<path_challenge::Data, transport::Error> {
        let path = self.ensure_path(remote_address)?;

        let mut data = path_challenge::Data::default();
        random.fill(&mut data);

        path.state = State::Validating;
        path.challenge = Challenge::new(now, expiration, data);

        Ok(data)
    }

    /// Records a PATH_CHALLENGE from the peer; the caller echoes the data
    /// in a PATH_RESPONSE
    pub fn on_path_challenge(
        &mut self,
        remote_address: SocketAddr,
        data: path_challenge::Data,
    ) -> Result<path_challenge::Data, transport::Error> {
        // make sure the peer's address is tracked
        self.ensure_path(remote_address)?;
        Ok(data)
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-8.2.3
    //# Path validation succeeds when a PATH_RESPONSE frame is received
    //# that contains the data that was sent in a previous PATH_CHALLENGE
    //# frame.

    /// Processes a PATH_RESPONSE; responses that match no outstanding
    /// challenge are ignored
    pub fn on_path_response(&mut self, data: &[u8], now: Timestamp) -> bool {
        for path in &mut self.paths {
            if path.state.is_validating() && path.challenge.is_valid(data) {
                path.state = State::Validated;
                path.last_validated = Some(now);
                path.challenge = Challenge::None;
                return true;
            }
        }

        // a response to a stale or foreign challenge; not an error
        false
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-9.3
    //# An endpoint only changes the address to which it sends packets in
    //# response to the highest-numbered non-probing packet.

    /// Promotes a validated path to primary
    pub fn migrate(&mut self, remote_address: SocketAddr) -> Result<(), transport::Error> {
        let target = self
            .paths
            .iter()
            .position(|path| path.remote_address == remote_address)
            .ok_or_else(|| {
                transport::Error::PROTOCOL_VIOLATION.with_reason("migration to an unknown path")
            })?;

        if !self.paths[target].state.is_validated() {
            return Err(transport::Error::PROTOCOL_VIOLATION
                .with_reason("migration to an unvalidated path"));
        }

        for (index, path) in self.paths.iter_mut().enumerate() {
            path.is_primary = index == target;
        }

        Ok(())
    }

    /// True when the path was validated longer than `threshold` ago
    pub fn needs_revalidation(
        &self,
        remote_address: SocketAddr,
        threshold: Duration,
        now: Timestamp,
    ) -> bool {
        let Some(path) = self.path(remote_address) else {
            return false;
        };

        if !path.state.is_validated() {
            return false;
        }

        match path.last_validated {
            Some(validated) => now.saturating_duration_since(validated) > threshold,
            None => true,
        }
    }

    /// Expires outstanding challenges; timed-out validations fail
    pub fn on_timeout(&mut self, now: Timestamp) {
        for path in &mut self.paths {
            if path.state.is_validating() && path.challenge.on_timeout(now) {
                path.state = State::Failed;
            }
        }
    }

    pub fn next_timeout(&self) -> Option<Timestamp> {
        self.paths
            .iter()
            .filter_map(|path| path.challenge.next_expiration())
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corten_quic_core::random::testing::Generator;

    const EXPIRATION: Duration = Duration::from_millis(500);

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn validation_success_test() {
        let now = Timestamp::now();
        let mut random = Generator::default();
        let mut manager = Manager::new(addr(1234));

        let challenge = manager
            .start_validation(addr(5678), now, EXPIRATION, &mut random)
            .unwrap();
        assert!(manager.path(addr(5678)).unwrap().state.is_validating());

        // a mismatched response leaves the path validating
        let mut wrong = challenge;
        wrong[0] ^= 1;
        assert!(!manager.on_path_response(&wrong, now));
        assert!(manager.path(addr(5678)).unwrap().state.is_validating());

        // the matching response validates the path
        assert!(manager.on_path_response(&challenge, now));
        let path = manager.path(addr(5678)).unwrap();
        assert!(path.state.is_validated());
        assert_eq!(path.last_validated, Some(now));

        // and it can now become primary
        manager.migrate(addr(5678)).unwrap();
        assert_eq!(manager.primary().remote_address, addr(5678));
        assert!(!manager.path(addr(1234)).unwrap().is_primary);
    }

    #[test]
    fn validation_timeout_test() {
        let now = Timestamp::now();
        let mut random = Generator::default();
        let mut manager = Manager::new(addr(1234));

        manager
            .start_validation(addr(5678), now, EXPIRATION, &mut random)
            .unwrap();

        manager.on_timeout(now + EXPIRATION);
        assert_eq!(manager.path(addr(5678)).unwrap().state, State::Failed);

        // a late response no longer validates
        assert!(!manager.on_path_response(&[0; 8], now + EXPIRATION));
    }

    #[test]
    fn migrate_unvalidated_rejected_test() {
        let mut manager = Manager::new(addr(1234));
        manager.on_datagram_received(addr(9999), 100).unwrap();

        assert!(manager.migrate(addr(9999)).is_err());
        assert_eq!(manager.primary().remote_address, addr(1234));
    }

    #[test]
    fn path_cap_test() {
        let mut manager = Manager::new(addr(1));
        for port in 2..=(MAX_ACTIVE_PATHS as u16) {
            manager.on_datagram_received(addr(port), 1).unwrap();
        }

        let error = manager
            .on_datagram_received(addr(1000), 1)
            .unwrap_err();
        assert_eq!(error.code, transport::Error::NO_VIABLE_PATH.code);
    }

    #[test]
    fn revalidation_threshold_test() {
        let now = Timestamp::now();
        let mut manager = Manager::new(addr(1234));
        manager.on_handshake_confirmed(now);

        let threshold = Duration::from_secs(30);
        assert!(!manager.needs_revalidation(addr(1234), threshold, now));
        assert!(manager.needs_revalidation(
            addr(1234),
            threshold,
            now + threshold + Duration::from_secs(1)
        ));
    }
}
