use sqlx::FromRow;
use time::OffsetDateTime;
use yatube_common::model::{
    Id, ModelValidationError, Text,
    auth::Session,
    comment::Comment,
    follow::Follow,
    group::{Group, GroupSlug, GroupTitle},
    post::{ImageRef, Post},
    user::{User, Username},
};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_snowflake: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
}

/// A post joined with its author and, when set, its group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_snowflake: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub image: Option<String>,
    pub user_snowflake: i64,
    pub username: String,
    pub group_snowflake: Option<i64>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FollowRecord {
    pub follow_snowflake: i64,
    pub follower_snowflake: i64,
    pub author_snowflake: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct SessionRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            username: Username::new(value.username)?,
        })
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.group_snowflake),
            slug: GroupSlug::new(value.slug)?,
            title: GroupTitle::new(value.title)?,
            description: value.description,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let group = match (value.group_snowflake, value.slug, value.title) {
            (Some(group_snowflake), Some(slug), Some(title)) => Some(Group::try_from(GroupRecord {
                group_snowflake,
                slug,
                title,
                description: value.description.unwrap_or_default(),
            })?),
            _ => None,
        };

        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            text: Text::new(&value.text)?,
            created_at: value.created_at,
            author: User {
                id: Id::from_db(value.user_snowflake),
                username: Username::new(value.username)?,
            },
            group,
            image: value.image.map(ImageRef::new),
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post: Id::from_db(value.post_snowflake),
            author: User {
                id: Id::from_db(value.user_snowflake),
                username: Username::new(value.username)?,
            },
            text: Text::new(&value.text)?,
            created_at: value.created_at,
        })
    }
}

impl From<FollowRecord> for Follow {
    fn from(value: FollowRecord) -> Self {
        Self {
            id: Id::from_db(value.follow_snowflake),
            follower: Id::from_db(value.follower_snowflake),
            author: Id::from_db(value.author_snowflake),
        }
    }
}

impl TryFrom<SessionRecord> for Session {
    type Error = ModelValidationError;

    fn try_from(value: SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(yatube_common::util::PositiveDuration::from_seconds)
                .transpose()?,
        })
    }
}
