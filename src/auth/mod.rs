// Authentication module
// Credential storage, request signing, session state and token refresh

mod authenticator;
mod coordinator;
mod refresh;
mod session;
mod store;
mod types;

pub use authenticator::{authenticate, SESSION_ID_HEADER};
pub use coordinator::{is_refresh_eligible, RefreshCoordinator, SESSION_EXPIRED_MESSAGE};
pub use refresh::{REFRESH_PATH, REFRESH_TOKEN_HEADER};
pub use session::{SessionController, SessionState};
pub use store::CredentialStore;
pub use types::{token_preview, CredentialSet};
