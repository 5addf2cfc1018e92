use crate::{
    entities::{AuthRequest, LoginResponse, SessionRequest, SessionToken, ID, PASSWORD, SESSION_ID},
    error::{Error, Result},
    store::{Assignment, Key, Store},
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// Users, their passwords and their single live session.
///
/// Passwords are stored and compared in clear text.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    user_table: String,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, user_table: &str) -> Self {
        Self {
            store,
            user_table: user_table.to_string(),
        }
    }

    // The existence check and the write are separate calls, so two concurrent
    // registrations of one id can both succeed; the later password wins.
    pub async fn register(&self, user_id: &str, password: &str) -> Result<()> {
        let key = Key::new(ID, user_id);
        let existing = self.store.get(&self.user_table, &key, None, true).await?;
        if existing.is_some_and(|item| !item.is_empty()) {
            return Err(Error::AlreadyExists(user_id.to_string()));
        }

        self.store
            .upsert(&self.user_table, &key, &[Assignment::set(PASSWORD, password)])
            .await?;
        tracing::info!(user_id, "registered user");
        Ok(())
    }

    /// Checks the password and starts a new session, evicting any earlier one.
    pub async fn authenticate(&self, user_id: &str, password: &str) -> Result<SessionToken> {
        let key = Key::new(ID, user_id);
        let stored = self
            .store
            .get(&self.user_table, &key, Some(&[PASSWORD][..]), false)
            .await?;

        let matches = stored
            .as_ref()
            .and_then(|item| item.get(PASSWORD))
            .is_some_and(|stored| stored == password);
        if !matches {
            tracing::debug!(user_id, "rejected credentials");
            return Err(Error::InvalidCredentials);
        }

        let token = SessionToken::generate();
        self.store
            .upsert(
                &self.user_table,
                &key,
                &[Assignment::set(SESSION_ID, token.as_str())],
            )
            .await?;
        tracing::info!(user_id, "started session");
        Ok(token)
    }

    pub async fn revoke_session(&self, user_id: &str, token: &str) -> Result<()> {
        if !self.is_authorized(user_id, token).await {
            return Err(Error::Forbidden);
        }

        self.store
            .upsert(
                &self.user_table,
                &Key::new(ID, user_id),
                &[Assignment::remove(SESSION_ID)],
            )
            .await?;
        tracing::info!(user_id, "ended session");
        Ok(())
    }

    /// True iff `token` is the user's live session. Backend failures deny.
    pub async fn is_authorized(&self, user_id: &str, token: &str) -> bool {
        let stored = match self
            .store
            .get(&self.user_table, &Key::new(ID, user_id), Some(&[SESSION_ID][..]), false)
            .await
        {
            Ok(stored) => stored,
            Err(error) => {
                tracing::warn!(user_id, %error, "session lookup failed, denying");
                return false;
            }
        };

        stored
            .as_ref()
            .and_then(|item| item.get(SESSION_ID))
            .is_some_and(|stored| !stored.is_empty() && stored == token)
    }
}

pub async fn sign_up(
    Extension(sessions): Extension<SessionManager>,
    body: std::result::Result<Json<AuthRequest>, JsonRejection>,
) -> impl IntoResponse {
    // unlike the other endpoints, a bad body here is the client's fault
    let Json(auth_request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(%rejection, "malformed register body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match sessions
        .register(&auth_request.userid, &auth_request.password)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn sign_in(
    Extension(sessions): Extension<SessionManager>,
    body: std::result::Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(auth_request) = body.map_err(|e| Error::MalformedRequest(e.body_text()))?;
    let sessionid = sessions
        .authenticate(&auth_request.userid, &auth_request.password)
        .await?;
    Ok(Json(LoginResponse { sessionid }))
}

pub async fn sign_out(
    Extension(sessions): Extension<SessionManager>,
    body: std::result::Result<Json<SessionRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(session) = body.map_err(|e| Error::MalformedRequest(e.body_text()))?;
    sessions
        .revoke_session(&session.userid, &session.sessionid)
        .await?;
    Ok(StatusCode::OK)
}
