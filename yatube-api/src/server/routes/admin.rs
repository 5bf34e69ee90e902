use crate::{
    handlers::{
        admin::{self, IssuedToken},
        feeds::FeedService,
    },
    server::{
        Result, ServerError, ServerRouter,
        auth::AdminAccess,
        json::{Created, Json},
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use yatube_common::{
    model::{
        group::{CreateGroup, Group},
        user::{CreateUser, User},
    },
    util::PositiveDuration,
};
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_user)
        .typed_delete(delete_user)
        .typed_post(issue_token)
        .typed_post(create_group)
        .typed_delete(delete_group)
        .typed_delete(clear_cache)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/users", rejection(ServerError))]
struct UsersPath();

async fn create_user(
    UsersPath(): UsersPath,
    AdminAccess: AdminAccess,
    State(store): State<Arc<dyn Store>>,
    Json(user): Json<CreateUser>,
) -> Result<Created<User>> {
    Ok(Created(admin::create_user(&*store, &user).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/users/{username}", rejection(ServerError))]
struct UserPath {
    username: String,
}

async fn delete_user(
    UserPath { username }: UserPath,
    AdminAccess: AdminAccess,
    State(store): State<Arc<dyn Store>>,
) -> Result<StatusCode> {
    admin::delete_user(&*store, &username).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/users/{username}/tokens", rejection(ServerError))]
struct TokensPath {
    username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct IssueToken {
    /// Tokens without a lifetime never expire.
    #[serde(default)]
    expires_in_seconds: Option<i64>,
}

async fn issue_token(
    TokensPath { username }: TokensPath,
    AdminAccess: AdminAccess,
    State(store): State<Arc<dyn Store>>,
    Json(request): Json<IssueToken>,
) -> Result<Created<IssuedToken>> {
    let expires_after = request
        .expires_in_seconds
        .map(PositiveDuration::from_seconds)
        .transpose()?;

    Ok(Created(
        admin::issue_token(&*store, &username, expires_after).await?,
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/groups", rejection(ServerError))]
struct GroupsPath();

async fn create_group(
    GroupsPath(): GroupsPath,
    AdminAccess: AdminAccess,
    State(store): State<Arc<dyn Store>>,
    Json(group): Json<CreateGroup>,
) -> Result<Created<Group>> {
    Ok(Created(admin::create_group(&*store, &group).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/groups/{slug}", rejection(ServerError))]
struct GroupPath {
    slug: String,
}

async fn delete_group(
    GroupPath { slug }: GroupPath,
    AdminAccess: AdminAccess,
    State(store): State<Arc<dyn Store>>,
) -> Result<StatusCode> {
    admin::delete_group(&*store, &slug).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/cache", rejection(ServerError))]
struct CachePath();

async fn clear_cache(
    CachePath(): CachePath,
    AdminAccess: AdminAccess,
    State(feeds): State<FeedService>,
) -> StatusCode {
    feeds.cache().clear().await;
    info!("Cleared page cache");

    StatusCode::NO_CONTENT
}
