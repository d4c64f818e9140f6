// Process-wide session state

use tokio::sync::watch;

/// Authentication flags observed by the rest of the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub is_authenticated: bool,
    pub is_verified: bool,
}

/// Owns the session state and publishes every change
pub struct SessionController {
    state: watch::Sender<SessionState>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::with_state(SessionState::default())
    }

    pub fn with_state(state: SessionState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { state: tx }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn is_verified(&self) -> bool {
        self.state.borrow().is_verified
    }

    /// Receiver that is notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn set_authenticated(&self, is_authenticated: bool) {
        self.state
            .send_modify(|state| state.is_authenticated = is_authenticated);
    }

    pub fn set_verified(&self, is_verified: bool) {
        self.state.send_modify(|state| state.is_verified = is_verified);
    }

    /// Return to the logged-out state
    pub fn logout(&self) {
        self.state.send_replace(SessionState::default());
        tracing::info!("Session logged out");
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let session = SessionController::new();
        assert_eq!(session.state(), SessionState::default());

        session.set_authenticated(true);
        session.set_verified(true);
        assert!(session.is_authenticated());
        assert!(session.is_verified());

        session.logout();
        assert!(!session.is_authenticated());
        assert!(!session.is_verified());
    }

    #[tokio::test]
    async fn test_subscribers_see_logout() {
        let session = SessionController::with_state(SessionState {
            is_authenticated: true,
            is_verified: false,
        });
        let mut rx = session.subscribe();

        session.logout();

        rx.changed().await.unwrap();
        assert!(!rx.borrow().is_authenticated);
    }
}
