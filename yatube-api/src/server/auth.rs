use crate::{handlers::Viewer, server::ServerError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use yatube_common::model::{auth::AccessToken, user::User};
use yatube_db::Store;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Requests without an `Authorization` header are anonymous; a header with a bad token is refused.
impl<S> FromRequestParts<S> for Viewer
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(header) = Option::<AuthorizationHeader>::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
        else {
            return Ok(Viewer::Anonymous);
        };

        let request_token: AccessToken = header.token().parse()?;
        let token_hash = request_token.hash()?;

        let store = Arc::<dyn Store>::from_ref(state);
        let session = store
            .fetch_session(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if session.user != request_token.user_id
            || session.is_expired_at(OffsetDateTime::now_utc())
        {
            return Err(ServerError::InvalidToken);
        }

        let user = store
            .fetch_user(session.user)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        Ok(Viewer::Authenticated(user))
    }
}

/// A signed-in user. Anonymous requests are sent to the login page instead.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Viewer::from_request_parts(parts, state).await? {
            Viewer::Authenticated(user) => Ok(Self(user)),
            Viewer::Anonymous => Err(ServerError::LoginRequired(parts.uri.clone())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AdminToken(Arc<str>);

impl AdminToken {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self(token.into())
    }

    fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl Debug for AdminToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminToken(<redacted>)")
    }
}

/// Guards `/admin`. Without a configured token those routes do not exist.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AdminAccess;

impl<S> FromRequestParts<S> for AdminAccess
where
    Option<AdminToken>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(expected) = Option::<AdminToken>::from_ref(state) else {
            return Err(ServerError::UnknownRoute(parts.uri.clone()));
        };

        let header = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        if expected.matches(header.token()) {
            Ok(Self)
        } else {
            Err(ServerError::InvalidToken)
        }
    }
}
