//! The persistence seam the request handlers talk to.

use async_trait::async_trait;
use thiserror::Error;
use yatube_common::{
    model::{
        Id, ModelValidationError,
        auth::{AccessTokenHash, Session},
        comment::{Comment, CreateComment},
        follow::FollowOutcome,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, EditPost, Post, PostFilter, PostMarker},
        user::{CreateUser, User, UserMarker, Username},
    },
    pagination::PageWindow,
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A {0} with that key already exists")]
    Duplicate(&'static str),
    #[error("Referenced {0} does not exist")]
    MissingReference(&'static str),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Create/read/update/delete over the entities of the blog.
///
/// Every method is atomic on its own. Deleting a user removes their posts, comments, follow
/// edges and sessions; deleting a post removes its comments; deleting a group detaches its
/// posts. Post listings are ordered newest first with the id as tie-break.
#[async_trait]
pub trait Store: Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>>;

    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    /// Returns whether a user was deleted.
    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool>;

    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn fetch_session(&self, token_hash: &AccessTokenHash) -> Result<Option<Session>>;

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>>;

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>>;

    /// All groups ordered by title, for form choices.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    async fn create_group(&self, group: &CreateGroup) -> Result<Group>;

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    /// Returns `None` when no post has that id.
    async fn update_post(&self, post_id: Id<PostMarker>, edit: &EditPost) -> Result<Option<Post>>;

    async fn count_posts(&self, filter: PostFilter) -> Result<u64>;

    async fn list_posts(&self, filter: PostFilter, window: PageWindow) -> Result<Vec<Post>>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment>;

    /// Comments of one post, newest first.
    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Get-or-create of the `(follower, author)` edge.
    async fn follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<FollowOutcome>;

    /// Returns whether an edge was removed.
    async fn unfollow(&self, follower: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool>;

    async fn is_following(&self, follower: Id<UserMarker>, author: Id<UserMarker>)
    -> Result<bool>;
}
