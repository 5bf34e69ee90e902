use crate::{
    handlers::{Viewer, feeds::FeedService},
    render::{Rendered, Renderer, View},
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        extract::{PageQuery, Query},
        render,
    },
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(group_posts)
        .typed_get(profile)
        .typed_get(follow_index)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct IndexPath();

async fn index(
    IndexPath(): IndexPath,
    State(feeds): State<FeedService>,
    Query(query): Query<PageQuery>,
) -> Result<Rendered> {
    Ok(feeds.cached_global(query.page()).await?)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: String,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    State(feeds): State<FeedService>,
    State(renderer): State<Arc<dyn Renderer>>,
    Query(query): Query<PageQuery>,
) -> Result<Rendered> {
    let feed = feeds.group(&slug, query.page()).await?;

    render(&*renderer, View::GroupList, &feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
struct ProfilePath {
    username: String,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(feeds): State<FeedService>,
    State(renderer): State<Arc<dyn Renderer>>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Result<Rendered> {
    let feed = feeds.profile(&viewer, &username, query.page()).await?;

    render(&*renderer, View::Profile, &feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
struct FollowIndexPath();

async fn follow_index(
    FollowIndexPath(): FollowIndexPath,
    State(feeds): State<FeedService>,
    State(renderer): State<Arc<dyn Renderer>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Rendered> {
    let feed = feeds.following(&user, query.page()).await?;

    render(&*renderer, View::Follow, &feed)
}
