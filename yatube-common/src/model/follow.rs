use crate::model::{Id, user::UserMarker};
use serde::Serialize;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct FollowMarker;

/// A directed edge: `follower` reads `author`'s posts in their following feed.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Follow {
    pub id: Id<FollowMarker>,
    pub follower: Id<UserMarker>,
    pub author: Id<UserMarker>,
}

/// Result of the get-or-create on a follow edge.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum FollowOutcome {
    Created(Follow),
    Existing(Follow),
}
