//! Operator actions: accounts, access tokens and groups.

use crate::handlers::{CoreError, CoreResult, follows::find_user};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use yatube_common::{
    model::{
        auth::{AccessToken, Session},
        group::{CreateGroup, Group, GroupSlug},
        user::{CreateUser, User},
    },
    util::PositiveDuration,
};
use yatube_db::Store;

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct IssuedToken {
    pub user: User,
    /// Shown once; only its hash is stored.
    pub token: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

pub async fn create_user(store: &dyn Store, user: &CreateUser) -> CoreResult<User> {
    let user = store.create_user(user).await?;
    info!(user = %user.username, "Created user");
    Ok(user)
}

pub async fn delete_user(store: &dyn Store, username: &str) -> CoreResult<()> {
    let user = find_user(store, username).await?;
    if !store.delete_user(user.id).await? {
        return Err(CoreError::UserNotFound(username.to_owned()));
    }

    info!(user = %user.username, "Deleted user");
    Ok(())
}

pub async fn issue_token(
    store: &dyn Store,
    username: &str,
    expires_after: Option<PositiveDuration>,
) -> CoreResult<IssuedToken> {
    let user = find_user(store, username).await?;
    let token = AccessToken::issue(user.id);
    let created_at = OffsetDateTime::now_utc();

    store
        .create_session(&Session {
            user: user.id,
            token_hash: token.hash()?,
            created_at,
            expires_after,
        })
        .await?;

    info!(user = %user.username, "Issued access token");
    Ok(IssuedToken {
        user,
        token: token.to_bearer(),
        expires_at: expires_after.map(|lifetime| created_at + lifetime.get()),
    })
}

pub async fn create_group(store: &dyn Store, group: &CreateGroup) -> CoreResult<Group> {
    let group = store.create_group(group).await?;
    info!(group = %group.slug, "Created group");
    Ok(group)
}

pub async fn delete_group(store: &dyn Store, slug: &str) -> CoreResult<()> {
    let not_found = || CoreError::GroupNotFound(slug.to_owned());
    let parsed = GroupSlug::new(slug.to_owned()).map_err(|_| not_found())?;
    let group = store
        .fetch_group_by_slug(&parsed)
        .await?
        .ok_or_else(not_found)?;

    if !store.delete_group(group.id).await? {
        return Err(not_found());
    }

    info!(group = %group.slug, "Deleted group");
    Ok(())
}
