use crate::model::{
    Id, Text,
    group::{Group, GroupMarker},
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: Text,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: User,
    pub group: Option<Group>,
    pub image: Option<ImageRef>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub text: Text,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<ImageRef>,
}

/// The fields an edit may change. `image: None` keeps the current image.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct EditPost {
    pub text: Text,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<ImageRef>,
}

/// Which posts a feed is drawn from.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    FollowedBy(Id<UserMarker>),
}

/// Path of an uploaded image as returned by the blob store, e.g. `posts/cat.png`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    #[must_use]
    pub fn new(path: String) -> Self {
        Self(path)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for ImageRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Post {
    /// Newest first, ties broken by id so equal timestamps still order deterministically.
    #[must_use]
    pub fn feed_order(a: &Post, b: &Post) -> std::cmp::Ordering {
        b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
    }
}
