// Copyright corten-net. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    frame::path_challenge::DATA_LEN,
    time::{Duration, Timer, Timestamp},
};
use subtle::ConstantTimeEq;

pub type Data = [u8; DATA_LEN];

//= https://www.rfc-editor.org/rfc/rfc9000#section-8.2.1
//# An endpoint MUST NOT delay transmission of a
//# packet containing a PATH_CHALLENGE frame for more than the maximum
//# probe timeout.

/// An outstanding path challenge
///
/// The 8 challenge bytes come from an unpredictable source so an off-path
/// attacker cannot forge the matching PATH_RESPONSE.
#[derive(Clone, Debug)]
pub enum Challenge {
    None,
    Pending(State),
    Abandoned,
}

#[derive(Clone, Debug)]
pub struct State {
    data: Data,
    abandon_timer: Timer,
}

impl Default for Challenge {
    fn default() -> Self {
        Self::None
    }
}

impl Challenge {
    pub fn new(now: Timestamp, expiration: Duration, data: Data) -> Self {
        let mut abandon_timer = Timer::default();
        abandon_timer.set(now + expiration);

        Self::Pending(State {
            data,
            abandon_timer,
        })
    }

    /// The challenge data still awaiting a response, if any
    pub fn data(&self) -> Option<&Data> {
        if let Challenge::Pending(state) = self {
            return Some(&state.data);
        }
        None
    }

    /// Compares a PATH_RESPONSE payload against the outstanding challenge.
    ///
    /// Mismatched data is not an error: responses to stale challenges may
    /// legitimately arrive and are ignored.
    pub fn is_valid(&self, data: &[u8]) -> bool {
        if let Challenge::Pending(state) = self {
            state.data[..].ct_eq(data).into()
        } else {
            false
        }
    }

    /// Abandons the challenge once its timer expires; returns true when
    /// the challenge was abandoned by this call
    pub fn on_timeout(&mut self, now: Timestamp) -> bool {
        if let Challenge::Pending(state) = self {
            if state.abandon_timer.is_expired(now) {
                *self = Challenge::Abandoned;
                return true;
            }
        }
        false
    }

    pub fn next_expiration(&self) -> Option<Timestamp> {
        if let Challenge::Pending(state) = self {
            return state.abandon_timer.next_expiration();
        }
        None
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Challenge::Pending(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRATION: Duration = Duration::from_millis(100);

    fn challenge(now: Timestamp) -> Challenge {
        Challenge::new(now, EXPIRATION, [7; 8])
    }

    #[test]
    fn match_test() {
        let now = Timestamp::now();
        let challenge = challenge(now);

        assert!(challenge.is_pending());
        assert!(challenge.is_valid(&[7; 8]));
        assert!(!challenge.is_valid(&[8; 8]));
    }

    #[test]
    fn timeout_test() {
        let now = Timestamp::now();
        let mut challenge = challenge(now);

        assert!(!challenge.on_timeout(now));
        assert!(challenge.is_pending());

        assert!(challenge.on_timeout(now + EXPIRATION));
        assert!(!challenge.is_pending());
        assert!(!challenge.is_valid(&[7; 8]));
    }
}
