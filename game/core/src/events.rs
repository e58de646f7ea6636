use flint::SessionId;

/// Raised by the C_LOGIN handler; consumed by the login controller on the
/// logic dispatcher.
#[derive(Debug, Clone)]
pub struct LoginRequested {
    pub session_id: SessionId,
    pub username: String,
    pub password: String,
}
