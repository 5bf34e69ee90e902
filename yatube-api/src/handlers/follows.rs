use crate::handlers::{CoreError, CoreResult, Redirect};
use tracing::{debug, info};
use yatube_common::model::{
    follow::FollowOutcome,
    user::{User, Username},
};
use yatube_db::Store;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum FollowAction {
    Created,
    AlreadyFollowing,
    /// Following yourself is silently skipped.
    SelfFollow,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Followed {
    pub action: FollowAction,
    pub redirect: Redirect,
}

/// Resolves a username from a path segment. Malformed names cannot exist, so they are not found.
pub(crate) async fn find_user(store: &dyn Store, username: &str) -> CoreResult<User> {
    let not_found = || CoreError::UserNotFound(username.to_owned());
    let Ok(parsed) = Username::new(username.to_owned()) else {
        return Err(not_found());
    };

    store
        .fetch_user_by_username(&parsed)
        .await?
        .ok_or_else(not_found)
}

pub async fn follow(store: &dyn Store, requester: &User, username: &str) -> CoreResult<Followed> {
    let author = find_user(store, username).await?;
    let redirect = Redirect::Profile(author.username.clone());

    if author.id == requester.id {
        debug!(user = %requester.username, "Skipped self-follow");
        return Ok(Followed {
            action: FollowAction::SelfFollow,
            redirect,
        });
    }

    let action = match store.follow(requester.id, author.id).await? {
        FollowOutcome::Created(_) => {
            info!(follower = %requester.username, author = %author.username, "Followed");
            FollowAction::Created
        }
        FollowOutcome::Existing(_) => FollowAction::AlreadyFollowing,
    };

    Ok(Followed { action, redirect })
}

pub async fn unfollow(store: &dyn Store, requester: &User, username: &str) -> CoreResult<Redirect> {
    let author = find_user(store, username).await?;

    if !store.unfollow(requester.id, author.id).await? {
        return Err(CoreError::FollowNotFound {
            follower: requester.username.clone(),
            author: author.username,
        });
    }

    info!(follower = %requester.username, author = %author.username, "Unfollowed");
    Ok(Redirect::Profile(author.username))
}
