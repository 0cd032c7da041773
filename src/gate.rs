use std::time::Duration;

use compact_str::CompactString;
use tracing::{debug, warn};

use crate::hotp::OtpError;
use crate::replay::ReplayGuard;
use crate::session::{self, DEFAULT_SESSION_ID_BYTES, SessionError, SessionService};
use crate::store::{KeyValueStore, StoreError};
use crate::totp::TotpConfig;

/// Errors from the second-factor flow
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Caller-input error from the code engine, surfaced immediately
    #[error(transparent)]
    Otp(#[from] OtpError),

    /// The backing store could not be reached; retryable
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Session issuance failed
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// How a candidate code was classified.
///
/// Together with the [`OtpError::CodeLengthMismatch`] error for malformed
/// input, this gives the boundary the four outcomes it needs to tell user
/// clock skew apart from an attack signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The code matched a counter in the window and had not been used before
    Accepted {
        /// Opaque token the collaborator hands back to the client
        session_id: CompactString,
    },
    /// The code matched but was already consumed once
    Replayed,
    /// No counter in the window produced this code: wrong, or expired
    Mismatch,
}

/// Second-factor gate: TOTP verification, replay rejection, session issuance.
///
/// The replay guard and session service share one cloneable store handle;
/// the gate itself keeps no other state and can be shared freely.
#[derive(Debug, Clone)]
pub struct OtpGate<S> {
    totp: TotpConfig,
    window: u32,
    replay: ReplayGuard<S>,
    sessions: SessionService<S>,
}

impl<S: KeyValueStore + Clone> OtpGate<S> {
    /// Assemble the gate over one shared store handle
    pub fn new(totp: TotpConfig, window: u32, store: S, session_ttl: Duration) -> Self {
        Self {
            totp,
            window,
            replay: ReplayGuard::new(store.clone()),
            sessions: SessionService::new(store, session_ttl),
        }
    }

    /// The fresh code to deliver to the principal out of band
    pub fn issue_at(&self, timestamp: i64) -> Result<CompactString, OtpError> {
        self.totp.generate_at(timestamp)
    }

    /// Verify `candidate` for `principal_id` at `timestamp`.
    ///
    /// A malformed candidate (wrong length) is an error. A candidate no
    /// counter in the window produces is [`Outcome::Mismatch`]. A time-valid
    /// candidate seen before is [`Outcome::Replayed`] even though it would
    /// still verify. Otherwise the code is consumed and a session minted.
    pub async fn verify_at(
        &self,
        principal_id: &str,
        candidate: &str,
        timestamp: i64,
    ) -> Result<Outcome, GateError> {
        if !self.totp.verify_at(candidate, timestamp, self.window)? {
            debug!(principal = principal_id, "code matches no counter in window");
            return Ok(Outcome::Mismatch);
        }

        // Insert-if-absent in one round trip, so two concurrent verifications
        // of the same code cannot both be accepted.
        if !self.replay.consume(candidate.trim()).await? {
            warn!(principal = principal_id, "time-valid code replayed");
            return Ok(Outcome::Replayed);
        }

        let session_id = session::generate_session_id(DEFAULT_SESSION_ID_BYTES)?;
        self.sessions.set(&session_id, principal_id).await?;
        debug!(principal = principal_id, "second factor accepted, session issued");
        Ok(Outcome::Accepted { session_id })
    }

    /// Session lookups for tokens this gate issued
    pub fn sessions(&self) -> &SessionService<S> {
        &self.sessions
    }

    /// The replay guard view, for callers composing their own flow
    pub fn replay(&self) -> &ReplayGuard<S> {
        &self.replay
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::hotp::{Algorithm, SharedSecret};
    use crate::store::MemoryStore;

    // base32 of "The quick brown fox jumps over the lazy dog."
    const PHRASE_SECRET: &str =
        "KRUGKIDROVUWG2ZAMJZG653OEBTG66BANJ2W24DTEBXXMZLSEB2GQZJANRQXU6JAMRXWOLQ=";

    // Counter 54324351; "000000" matches none of the window's codes.
    const T: i64 = 1_629_730_530;

    fn gate() -> OtpGate<MemoryStore> {
        let secret = SharedSecret::try_from_base32(PHRASE_SECRET).unwrap();
        let totp = TotpConfig::new(secret, 30, 6, Algorithm::Sha512).unwrap();
        OtpGate::new(totp, 1, MemoryStore::new(), Duration::from_secs(900))
    }

    #[tokio::test]
    async fn fresh_code_is_accepted_and_opens_a_session() {
        let gate = gate();
        let code = gate.issue_at(T).unwrap();

        let outcome = gate.verify_at("kaede", &code, T + 5).await.unwrap();
        let Outcome::Accepted { session_id } = outcome else {
            panic!("expected acceptance, got {outcome:?}");
        };
        assert_eq!(
            gate.sessions().get(&session_id).await.unwrap().as_deref(),
            Some("kaede")
        );
    }

    #[tokio::test]
    async fn replayed_code_is_rejected_while_still_time_valid() {
        let gate = gate();
        let code = gate.issue_at(T).unwrap();

        let first = gate.verify_at("kaede", &code, T + 5).await.unwrap();
        assert!(matches!(first, Outcome::Accepted { .. }));

        // Still inside the window, but consumed.
        let second = gate.verify_at("kaede", &code, T + 10).await.unwrap();
        assert_eq!(second, Outcome::Replayed);
    }

    #[tokio::test]
    async fn wrong_code_is_a_mismatch() {
        let gate = gate();
        let outcome = gate.verify_at("kaede", "000000", T).await.unwrap();
        assert_eq!(outcome, Outcome::Mismatch);
    }

    #[tokio::test]
    async fn expired_code_is_a_mismatch() {
        let gate = gate();
        let code = gate.issue_at(T).unwrap();
        let outcome = gate.verify_at("kaede", &code, T + 65).await.unwrap();
        assert_eq!(outcome, Outcome::Mismatch);
    }

    #[tokio::test]
    async fn malformed_code_is_an_error_not_a_mismatch() {
        let gate = gate();
        let result = gate.verify_at("kaede", "123", T).await;
        assert!(matches!(
            result,
            Err(GateError::Otp(OtpError::CodeLengthMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn mismatch_does_not_consume_the_code() {
        let gate = gate();
        let code = gate.issue_at(T).unwrap();

        assert_eq!(
            gate.verify_at("kaede", "000000", T).await.unwrap(),
            Outcome::Mismatch
        );
        // The real code is still fresh.
        let outcome = gate.verify_at("kaede", &code, T).await.unwrap();
        assert!(matches!(outcome, Outcome::Accepted { .. }));
    }
}
