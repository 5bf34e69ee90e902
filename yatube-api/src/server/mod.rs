use crate::{
    blob::BlobStore,
    cache::PageCache,
    handlers::{CoreError, Redirect, feeds::FeedService},
    render::{RenderError, Rendered, Renderer, View, render_view},
};
use auth::AdminToken;
use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Redirect as SeeOther, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use yatube_common::{
    model::auth::{AccessTokenDecodeError, AccessTokenHashError},
    util::NonPositiveDurationError,
};
use yatube_db::{DbError, Store};

pub mod auth;
mod extract;
mod json;
mod routes;

pub const LOGIN_URL: &str = "/auth/login/";

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub feeds: FeedService,
    pub renderer: Arc<dyn Renderer>,
    pub blobs: Arc<dyn BlobStore>,
    pub admin_token: Option<AdminToken>,
}

impl ServerState {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<PageCache>,
        renderer: Arc<dyn Renderer>,
        blobs: Arc<dyn BlobStore>,
        admin_token: Option<AdminToken>,
    ) -> Self {
        Self {
            feeds: FeedService::new(store.clone(), cache, renderer.clone()),
            store,
            renderer,
            blobs,
            admin_token,
        }
    }
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided access token could not be decoded: {0}")]
    InvalidAccessToken(#[from] AccessTokenDecodeError),
    #[error("The access token could not be hashed: {0}")]
    AccessTokenHash(#[from] AccessTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Token lifetime rejected: {0}")]
    InvalidTokenLifetime(#[from] NonPositiveDurationError),
    #[error("Login required for {0}")]
    LoginRequired(Uri),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<DbError> for ServerError {
    fn from(value: DbError) -> Self {
        ServerError::Core(value.into())
    }
}

impl From<RenderError> for ServerError {
    fn from(value: RenderError) -> Self {
        ServerError::Core(value.into())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => StatusCode::NOT_FOUND,
            ServerError::Core(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            ServerError::Core(CoreError::Store(DbError::MissingReference(_))) => {
                StatusCode::NOT_FOUND
            }
            ServerError::Core(CoreError::Store(DbError::Duplicate(_))) => StatusCode::CONFLICT,
            ServerError::LoginRequired(_) => StatusCode::SEE_OTHER,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::Multipart(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAccessToken(_)
            | ServerError::InvalidTokenLifetime(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::AccessTokenHash(_)
            | ServerError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::LoginRequired(uri) = &self {
            debug!(%uri, "Sending anonymous request to login");
            return SeeOther::to(&format!("{LOGIN_URL}?next={}", uri.path())).into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        SeeOther::to(&self.to_string()).into_response()
    }
}

fn render<C: Serialize>(renderer: &dyn Renderer, view: View, context: &C) -> Result<Rendered> {
    Ok(render_view(renderer, view, context)?)
}

#[cfg(test)]
mod tests;
