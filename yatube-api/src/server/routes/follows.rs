use crate::{
    handlers::{Redirect, follows},
    server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(follow)
        .typed_post(unfollow)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(ServerError))]
struct FollowPath {
    username: String,
}

async fn follow(
    FollowPath { username }: FollowPath,
    State(store): State<Arc<dyn Store>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Redirect> {
    let followed = follows::follow(&*store, &user, &username).await?;

    Ok(followed.redirect)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(ServerError))]
struct UnfollowPath {
    username: String,
}

async fn unfollow(
    UnfollowPath { username }: UnfollowPath,
    State(store): State<Arc<dyn Store>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Redirect> {
    Ok(follows::unfollow(&*store, &user, &username).await?)
}
