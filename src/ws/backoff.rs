// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded exponential backoff for session reconnects.

use std::time::Duration;

/// Reconnect policy for a [`Session`](crate::Session).
///
/// The delay doubles after every failed attempt, capped at `max_delay`,
/// and the session gives up after `max_attempts` consecutive failures.
/// The attempt counter resets once a connection reaches the initialized
/// state, so a healthy device that drops once reconnects quickly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Consecutive failed attempts before the session gives up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

/// Tracks consecutive reconnect attempts against a [`ReconnectPolicy`].
#[derive(Debug)]
pub(crate) struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Returns the delay before the next attempt, or `None` when the
    /// attempt budget is exhausted.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        let exp = self.attempts.min(16);
        let delay = self
            .policy
            .initial_delay
            .saturating_mul(1_u32 << exp)
            .min(self.policy.max_delay);
        self.attempts += 1;
        Some(delay)
    }

    /// Resets the attempt counter after a healthy connection.
    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
    }
}
