//! Challenge-response authentication with per-identity lockout.
//!
//! The accepting side issues a fresh random challenge per connection; the
//! connecting side proves knowledge of the shared secret by answering with
//! `SHA-256(challenge || secret)`. Identities (source IPs) that fail too
//! often within the lockout window are rejected until the window empties.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::protocol::constants::{
    CHALLENGE_SIZE, LOCKOUT_WINDOW, MAX_AUTH_FAILURES, RESPONSE_SIZE,
};

/// How many failures lock an identity, and for how long they count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failures: usize,
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: MAX_AUTH_FAILURES,
            window: LOCKOUT_WINDOW,
        }
    }
}

/// Verifies challenge responses against a fixed shared secret.
///
/// Failure history is kept per identity behind a single mutex, so the
/// manager can be shared between connection tasks through an `Arc`.
pub struct AuthManager {
    secret: Vec<u8>,
    policy: LockoutPolicy,
    failures: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_policy(secret, LockoutPolicy::default())
    }

    pub fn with_policy(secret: impl AsRef<[u8]>, policy: LockoutPolicy) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            policy,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Returns 32 bytes from the thread-local CSPRNG.
    pub fn generate_challenge(&self) -> [u8; CHALLENGE_SIZE] {
        let mut challenge = [0u8; CHALLENGE_SIZE];
        rand::rng().fill_bytes(&mut challenge);
        challenge
    }

    /// `SHA-256(challenge || secret)`.
    pub fn compute_response(&self, challenge: &[u8]) -> [u8; RESPONSE_SIZE] {
        Sha256::new()
            .chain_update(challenge)
            .chain_update(&self.secret)
            .finalize()
            .into()
    }

    pub fn is_locked(&self, identity: IpAddr) -> bool {
        self.is_locked_at(identity, Instant::now())
    }

    /// Lock status as of `now`. Failures older than the window are pruned.
    pub fn is_locked_at(&self, identity: IpAddr, now: Instant) -> bool {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut failures, identity, now) >= self.policy.max_failures
    }

    pub fn verify(&self, challenge: &[u8], response: &[u8], identity: IpAddr) -> bool {
        self.verify_at(challenge, response, identity, Instant::now())
    }

    /// Checks `response` against `challenge` as of `now`.
    ///
    /// A locked identity is rejected without looking at the response and
    /// without touching its failure window. A mismatch records a failure; a
    /// match clears the identity's history.
    pub fn verify_at(
        &self,
        challenge: &[u8],
        response: &[u8],
        identity: IpAddr,
        now: Instant,
    ) -> bool {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        if self.prune(&mut failures, identity, now) >= self.policy.max_failures {
            tracing::warn!(%identity, "auth_rejected_locked");
            return false;
        }

        let expected = self.compute_response(challenge);
        if constant_time_eq(&expected, response) {
            failures.remove(&identity);
            true
        } else {
            let history = failures.entry(identity).or_default();
            history.push(now);
            tracing::warn!(%identity, failures = history.len(), "auth_failed");
            false
        }
    }

    /// Drops expired failures for `identity` and returns how many remain.
    fn prune(
        &self,
        failures: &mut HashMap<IpAddr, Vec<Instant>>,
        identity: IpAddr,
        now: Instant,
    ) -> usize {
        let Some(history) = failures.get_mut(&identity) else {
            return 0;
        };
        history.retain(|at| now.saturating_duration_since(*at) <= self.policy.window);
        let remaining = history.len();
        if remaining == 0 {
            failures.remove(&identity);
        }
        remaining
    }
}

/// Full-length comparison whose timing does not depend on where the
/// inputs first differ.
fn constant_time_eq(expected: &[u8], actual: &[u8]) -> bool {
    expected.len() == actual.len() && bool::from(expected.ct_eq(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 21));

    #[test]
    fn challenges_are_fresh() {
        let auth = AuthManager::new("P");
        let a = auth.generate_challenge();
        let b = auth.generate_challenge();
        assert_eq!(a.len(), CHALLENGE_SIZE);
        assert_ne!(a, b);
    }

    #[test]
    fn response_is_sha256_of_challenge_then_secret() {
        let auth = AuthManager::new("jz2024");
        let challenge = [0xABu8; 32];
        let mut concatenated = challenge.to_vec();
        concatenated.extend_from_slice(b"jz2024");
        let expected: [u8; 32] = Sha256::digest(&concatenated).into();
        assert_eq!(auth.compute_response(&challenge), expected);
        assert_eq!(
            auth.compute_response(&challenge),
            AuthManager::new("jz2024").compute_response(&challenge)
        );
    }

    #[test]
    fn correct_response_verifies() {
        let auth = AuthManager::new("P");
        let challenge = auth.generate_challenge();
        let response = auth.compute_response(&challenge);
        assert!(auth.verify(&challenge, &response, PEER));
    }

    #[test]
    fn truncated_or_wrong_response_fails() {
        let auth = AuthManager::new("P");
        let challenge = auth.generate_challenge();
        let response = auth.compute_response(&challenge);
        assert!(!auth.verify(&challenge, &response[..31], PEER));
        assert!(!auth.verify(&challenge, &[], PEER));
        assert!(!auth.verify(&challenge, &AuthManager::new("Q").compute_response(&challenge), PEER));
    }

    #[test]
    fn comparison_checks_length_and_every_byte() {
        let expected = [7u8; RESPONSE_SIZE];
        let mut last_differs = expected;
        last_differs[RESPONSE_SIZE - 1] ^= 1;

        assert!(constant_time_eq(&expected, &expected));
        assert!(!constant_time_eq(&expected, &last_differs));
        assert!(!constant_time_eq(&expected, &expected[..RESPONSE_SIZE - 1]));
        assert!(!constant_time_eq(&expected, &[]));
    }

    #[test]
    fn five_failures_lock_until_window_passes() {
        let auth = AuthManager::new("P");
        let challenge = auth.generate_challenge();
        let good = auth.compute_response(&challenge);
        let t0 = Instant::now();

        for i in 0..5 {
            assert!(!auth.is_locked_at(PEER, t0 + Duration::from_millis(i)));
            assert!(!auth.verify_at(&challenge, &[0u8; 32], PEER, t0 + Duration::from_millis(i)));
        }
        assert!(auth.is_locked_at(PEER, t0 + Duration::from_millis(5)));

        // Even the right answer is refused while locked.
        assert!(!auth.verify_at(&challenge, &good, PEER, t0 + Duration::from_secs(10)));
        assert!(auth.is_locked_at(PEER, t0 + Duration::from_secs(30)));

        let later = t0 + Duration::from_secs(61);
        assert!(!auth.is_locked_at(PEER, later));
        assert!(auth.verify_at(&challenge, &good, PEER, later));
    }

    #[test]
    fn unlocks_once_earliest_failure_expires() {
        let auth = AuthManager::new("P");
        let challenge = auth.generate_challenge();
        let t0 = Instant::now();

        assert!(!auth.verify_at(&challenge, b"nope", PEER, t0));
        for i in 1..5 {
            assert!(!auth.verify_at(&challenge, b"nope", PEER, t0 + Duration::from_secs(30 + i)));
        }
        assert!(auth.is_locked_at(PEER, t0 + Duration::from_secs(40)));
        assert!(!auth.is_locked_at(PEER, t0 + Duration::from_millis(60_001)));
    }

    #[test]
    fn success_clears_failure_history() {
        let auth = AuthManager::new("P");
        let challenge = auth.generate_challenge();
        let good = auth.compute_response(&challenge);
        let t0 = Instant::now();

        for _ in 0..4 {
            assert!(!auth.verify_at(&challenge, b"bad", PEER, t0));
        }
        assert!(auth.verify_at(&challenge, &good, PEER, t0));
        for _ in 0..4 {
            assert!(!auth.verify_at(&challenge, b"bad", PEER, t0));
        }
        assert!(!auth.is_locked_at(PEER, t0));
    }

    #[test]
    fn identities_are_independent() {
        let auth = AuthManager::new("P");
        let challenge = auth.generate_challenge();
        let t0 = Instant::now();
        for _ in 0..5 {
            auth.verify_at(&challenge, b"bad", PEER, t0);
        }
        assert!(auth.is_locked_at(PEER, t0));
        assert!(!auth.is_locked_at(OTHER, t0));
        assert!(auth.verify_at(&challenge, &auth.compute_response(&challenge), OTHER, t0));
    }

    #[test]
    fn custom_policy_applies() {
        let auth = AuthManager::with_policy(
            "P",
            LockoutPolicy {
                max_failures: 2,
                window: Duration::from_secs(1),
            },
        );
        let t0 = Instant::now();
        auth.verify_at(b"c", b"bad", PEER, t0);
        auth.verify_at(b"c", b"bad", PEER, t0);
        assert!(auth.is_locked_at(PEER, t0));
        assert!(!auth.is_locked_at(PEER, t0 + Duration::from_secs(2)));
    }
}
