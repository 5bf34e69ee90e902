//! Request handling independent of the HTTP layer.
//!
//! Every operation receives the requester explicitly and answers with an outcome value that the
//! server maps onto a response.

pub mod admin;
pub mod comments;
pub mod feeds;
pub mod follows;
pub mod forms;
pub mod posts;

use crate::{blob::BlobError, render::RenderError};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use yatube_common::model::{
    Id,
    auth::AccessTokenHashError,
    post::PostMarker,
    user::{User, Username},
};
use yatube_db::DbError;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Post {0} does not exist")]
    PostNotFound(Id<PostMarker>),
    #[error("Group {0:?} does not exist")]
    GroupNotFound(String),
    #[error("User {0:?} does not exist")]
    UserNotFound(String),
    #[error("{follower} does not follow {author}")]
    FollowNotFound { follower: Username, author: Username },
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    TokenHash(#[from] AccessTokenHashError),
    #[error(transparent)]
    Store(#[from] DbError),
}

impl CoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::PostNotFound(_)
                | CoreError::GroupNotFound(_)
                | CoreError::UserNotFound(_)
                | CoreError::FollowNotFound { .. }
        )
    }
}

/// Who is asking.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Viewer {
    Anonymous,
    Authenticated(User),
}

impl Viewer {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(user) => Some(user),
        }
    }
}

/// Where a successful or refused mutation sends the client next.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Redirect {
    Profile(Username),
    PostDetail(Id<PostMarker>),
}

impl Display for Redirect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Redirect::Profile(username) => write!(f, "/profile/{username}/"),
            Redirect::PostDetail(post_id) => write!(f, "/posts/{post_id}/"),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::blob::{BlobError, BlobStore};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use yatube_common::model::{
        Id, Text,
        group::{CreateGroup, Group, GroupSlug, GroupTitle},
        post::{CreatePost, ImageRef, Post},
        user::{CreateUser, User, Username},
    };
    use yatube_db::{Store, memory::MemoryStore};

    /// Records uploads instead of writing them anywhere.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingBlobs(pub Mutex<Vec<String>>);

    #[async_trait]
    impl BlobStore for RecordingBlobs {
        async fn store(&self, file_name: &str, _bytes: Bytes) -> Result<ImageRef, BlobError> {
            self.0.lock().unwrap().push(file_name.to_owned());
            Ok(ImageRef::new(format!("posts/{file_name}")))
        }
    }

    pub(crate) async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(&CreateUser {
                username: Username::new(name.to_owned()).unwrap(),
            })
            .await
            .unwrap()
    }

    pub(crate) async fn group(store: &MemoryStore, slug: &str) -> Group {
        store
            .create_group(&CreateGroup {
                slug: GroupSlug::new(slug.to_owned()).unwrap(),
                title: GroupTitle::new(format!("Group {slug}")).unwrap(),
                description: String::new(),
            })
            .await
            .unwrap()
    }

    pub(crate) async fn post(store: &MemoryStore, author: &User, text: &str, group: Option<&Group>) -> Post {
        store
            .create_post(&CreatePost {
                author: author.id,
                text: Text::new(text).unwrap(),
                group: group.map(|group| group.id),
                image: None,
            })
            .await
            .unwrap()
    }

    pub(crate) fn unknown_id<Marker>() -> Id<Marker> {
        Id::from(987_654_321_u64)
    }
}
