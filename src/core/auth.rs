//! `AuthCore` (§4.4): two-phase authentication with optional fast-auth.
//!
//! Grounded on `protocol::auth`'s phase-one/phase-two exchange and the
//! `combo_key`/`decrypt_cbc`/`SERVER_TO_CLIENT` verification it already
//! performs inline (`protocol/auth.rs:288-293`); this module only owns the
//! *sequencing* of that exchange, leaving the byte-level crypto to
//! `protocol::crypto` as an external collaborator (§1).

use crate::core::action::AuthAction;
use crate::core::model::Parameters;
use crate::error::{BackendError, Error};
use crate::protocol::crypto::decrypt_cbc;
use tracing::{debug, trace};

const SERVER_TO_CLIENT: &[u8] = b"SERVER_TO_CLIENT";

enum State {
    Initialized,
    PhaseOneSent,
    PhaseTwoSent,
    Authenticated,
    Error,
}

/// Drives the O5LOGON handshake's phase sequencing. Carries the combo key
/// derived during phase one (if any) so phase two can verify the server's
/// response without re-deriving it.
pub struct AuthCore {
    state: State,
    fast_auth: bool,
    combo_key: Option<Vec<u8>>,
}

impl AuthCore {
    pub fn new(fast_auth: bool) -> Self {
        Self {
            state: State::Initialized,
            fast_auth,
            combo_key: None,
        }
    }

    /// Combo key derived by the I/O layer during the phase-one exchange,
    /// handed in once it is known (mirrors `AuthSession::combo_key`).
    pub fn set_combo_key(&mut self, combo_key: Vec<u8>) {
        self.combo_key = Some(combo_key);
    }

    /// §4.4 "start".
    pub fn start(&mut self) -> AuthAction {
        self.state = State::PhaseOneSent;
        trace!(fast_auth = self.fast_auth, "auth start -> PhaseOneSent");
        if self.fast_auth {
            AuthAction::SendFastAuth
        } else {
            AuthAction::SendAuthPhaseOne
        }
    }

    /// §4.4 "protocolReceived"/"dataTypesReceived": valid only during
    /// fast-auth while still in phase-one-sent.
    pub fn protocol_received(&mut self) -> AuthAction {
        AuthAction::None
    }

    pub fn data_types_received(&mut self) -> AuthAction {
        AuthAction::None
    }

    /// §4.4 "parameterReceived".
    pub fn parameter_received(&mut self, params: Parameters) -> AuthAction {
        match self.state {
            State::PhaseOneSent => {
                self.state = State::PhaseTwoSent;
                AuthAction::SendAuthPhaseTwo
            }
            State::PhaseTwoSent => match self.verify(&params) {
                Ok(()) => {
                    self.state = State::Authenticated;
                    trace!("auth PhaseTwoSent -> Authenticated");
                    AuthAction::Authenticated(params)
                }
                Err(err) => {
                    self.state = State::Error;
                    debug!(error = %err, "server response verification failed");
                    AuthAction::Fail(err)
                }
            },
            State::Initialized | State::Authenticated | State::Error => AuthAction::None,
        }
    }

    fn verify(&self, params: &Parameters) -> Result<(), Error> {
        let Some(combo_key) = &self.combo_key else {
            return Ok(());
        };
        let response_hex = params
            .get("AUTH_SVR_RESPONSE")
            .ok_or(Error::MissingParameter { name: "AUTH_SVR_RESPONSE" })?;
        let encoded = crate::protocol::crypto::hex_to_bytes(response_hex)
            .ok_or(Error::InvalidServerResponse)?;
        let decrypted = decrypt_cbc(combo_key, &encoded);
        if decrypted.len() < 32 || &decrypted[16..32] != SERVER_TO_CLIENT {
            return Err(Error::InvalidServerResponse);
        }
        Ok(())
    }

    /// §4.4 "errorReceived".
    pub fn error_received(&mut self, err: BackendError) -> AuthAction {
        self.state = State::Error;
        debug!(number = err.number, "authentication rejected by server");
        AuthAction::Fail(Error::server(err))
    }

    /// §4.4 "errorHappened".
    pub fn error_happened(&mut self, err: Error) -> AuthAction {
        match self.state {
            State::PhaseOneSent | State::PhaseTwoSent => {
                self.state = State::Error;
                AuthAction::Fail(err)
            }
            State::Initialized | State::Authenticated | State::Error => AuthAction::None,
        }
    }

    /// §4.4 "IsComplete".
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Authenticated | State::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with_response(hex: &str) -> Parameters {
        let mut p = Parameters::new();
        p.insert("AUTH_SVR_RESPONSE".to_string(), hex.to_string());
        p
    }

    #[test]
    fn start_fast_auth_sends_fast_auth_and_advances_to_phase_one_sent() {
        let mut core = AuthCore::new(true);
        assert!(matches!(core.start(), AuthAction::SendFastAuth));
        assert!(matches!(core.state, State::PhaseOneSent));
    }

    #[test]
    fn start_classic_sends_phase_one() {
        let mut core = AuthCore::new(false);
        assert!(matches!(core.start(), AuthAction::SendAuthPhaseOne));
    }

    #[test]
    fn parameter_received_in_phase_one_sends_phase_two() {
        let mut core = AuthCore::new(false);
        core.start();
        let action = core.parameter_received(Parameters::new());
        assert!(matches!(action, AuthAction::SendAuthPhaseTwo));
        assert!(matches!(core.state, State::PhaseTwoSent));
    }

    #[test]
    fn parameter_received_in_phase_two_without_combo_key_succeeds_unverified() {
        let mut core = AuthCore::new(false);
        core.start();
        core.parameter_received(Parameters::new());
        let action = core.parameter_received(Parameters::new());
        assert!(matches!(action, AuthAction::Authenticated(_)));
        assert!(core.is_complete());
    }

    #[test]
    fn parameter_received_in_phase_two_with_bad_combo_key_response_fails() {
        let mut core = AuthCore::new(false);
        core.set_combo_key(vec![0u8; 32]);
        core.start();
        core.parameter_received(Parameters::new());
        let action = core.parameter_received(params_with_response("00"));
        assert!(matches!(action, AuthAction::Fail(Error::InvalidServerResponse)));
        assert!(core.is_complete());
    }

    #[test]
    fn error_happened_during_phase_transitions_to_error() {
        let mut core = AuthCore::new(false);
        core.start();
        let action = core.error_happened(Error::ConnectionClosed);
        assert!(matches!(action, AuthAction::Fail(Error::ConnectionClosed)));
        assert!(core.is_complete());
    }

    #[test]
    fn error_received_fails_with_server_error() {
        let mut core = AuthCore::new(false);
        core.start();
        let action = core.error_received(BackendError { number: 1017, ..Default::default() });
        assert!(matches!(action, AuthAction::Fail(Error::Server(_))));
    }
}
