use crate::{
    record::{
        CommentRecord, FollowRecord, FullPostRecord, GroupRecord, SessionRecord, UserRecord,
    },
    store::{DbError, Result, Store},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions, query, query_as};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;
use yatube_common::{
    model::{
        Id, YatubeSnowflakeGenerator,
        auth::{AccessTokenHash, Session},
        comment::{Comment, CommentMarker, CreateComment},
        follow::{FollowMarker, FollowOutcome},
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, EditPost, Post, PostFilter, PostMarker},
        user::{CreateUser, User, UserMarker, Username},
    },
    pagination::PageWindow,
    snowflake::{ProcessId, WorkerId},
};

const FULL_POST_SELECT: &str = "
    SELECT
        posts.post_snowflake,
        posts.text,
        posts.created_at,
        posts.image,
        users.user_snowflake,
        users.username,
        groups.group_snowflake,
        groups.slug,
        groups.title,
        groups.description
    FROM
        posts.posts
        JOIN users.users ON users.user_snowflake = posts.user_snowflake
        LEFT JOIN posts.groups ON groups.group_snowflake = posts.group_snowflake
    ";

/// PostgreSQL backed [`Store`].
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<YatubeSnowflakeGenerator>,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation())
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            builder.push(" WHERE posts.group_snowflake = ");
            builder.push_bind(group_id.to_db());
        }
        PostFilter::Author(user_id) => {
            builder.push(" WHERE posts.user_snowflake = ");
            builder.push_bind(user_id.to_db());
        }
        PostFilter::FollowedBy(user_id) => {
            builder.push(
                " WHERE posts.user_snowflake IN (
                    SELECT follows.author_snowflake
                    FROM users.follows
                    WHERE follows.follower_snowflake = ",
            );
            builder.push_bind(user_id.to_db());
            builder.push(")");
        }
    }
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(YatubeSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn connect(url: &str, worker_id: WorkerId, process_id: ProcessId) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(url).await?;
        Ok(Self::new(pool, worker_id, process_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn next_id<Marker>(&self) -> Id<Marker> {
        self.snowflake_generator.lock().await.generate().into()
    }
}

#[async_trait]
impl Store for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.username
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.username
            FROM
                users.users
            WHERE
                users.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = self.next_id::<UserMarker>().await;

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (user_snowflake, username)
            VALUES ($1, $2)
            RETURNING users.user_snowflake, users.username
            ",
        )
        .bind(user_id.to_db())
        .bind(user.username.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::Duplicate("user")
            } else {
                err.into()
            }
        })?;

        Ok(User::try_from(record)?)
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        // posts, comments, follows and sessions go with the user through ON DELETE CASCADE
        let result = query("DELETE FROM users.users WHERE users.user_snowflake = $1")
            .bind(user_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        query(
            "
            INSERT INTO users.sessions (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(session.token_hash.0.as_slice())
        .bind(session.user.to_db())
        .bind(session.created_at)
        .bind(session.expires_after.map(|lifetime| lifetime.whole_seconds()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_session(&self, token_hash: &AccessTokenHash) -> Result<Option<Session>> {
        let record = query_as::<_, SessionRecord>(
            "
            SELECT
                sessions.user_snowflake,
                sessions.token_hash,
                sessions.created_at,
                sessions.expires_after_seconds
            FROM
                users.sessions
            WHERE
                sessions.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT groups.group_snowflake, groups.slug, groups.title, groups.description
            FROM posts.groups
            WHERE groups.group_snowflake = $1
            ",
        )
        .bind(group_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT groups.group_snowflake, groups.slug, groups.title, groups.description
            FROM posts.groups
            WHERE groups.slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT groups.group_snowflake, groups.slug, groups.title, groups.description
            FROM posts.groups
            ORDER BY groups.title, groups.group_snowflake
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?;
        Ok(groups)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let group_id = self.next_id::<GroupMarker>().await;

        let record = query_as::<_, GroupRecord>(
            "
            INSERT INTO posts.groups (group_snowflake, slug, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING groups.group_snowflake, groups.slug, groups.title, groups.description
            ",
        )
        .bind(group_id.to_db())
        .bind(group.slug.get())
        .bind(group.title.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::Duplicate("group")
            } else {
                err.into()
            }
        })?;

        Ok(Group::try_from(record)?)
    }

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        // posts keep living with group_snowflake set to NULL
        let result = query("DELETE FROM posts.groups WHERE groups.group_snowflake = $1")
            .bind(group_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut builder = QueryBuilder::<Postgres>::new(FULL_POST_SELECT);
        builder.push(" WHERE posts.post_snowflake = ");
        builder.push_bind(post_id.to_db());

        let record = builder
            .build_query_as::<FullPostRecord>()
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_id = self.next_id::<PostMarker>().await;

        query(
            "
            INSERT INTO posts.posts (post_snowflake, text, created_at, user_snowflake, group_snowflake, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(post_id.to_db())
        .bind(post.text.get())
        .bind(OffsetDateTime::now_utc())
        .bind(post.author.to_db())
        .bind(post.group.map(Id::to_db))
        .bind(post.image.as_ref().map(|image| image.get().to_owned()))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("author or group")
            } else {
                err.into()
            }
        })?;

        self.fetch_post(post_id)
            .await?
            .ok_or(DbError::MissingReference("post"))
    }

    async fn update_post(&self, post_id: Id<PostMarker>, edit: &EditPost) -> Result<Option<Post>> {
        let result = query(
            "
            UPDATE posts.posts
            SET
                text = $2,
                group_snowflake = $3,
                image = COALESCE($4, posts.image)
            WHERE posts.post_snowflake = $1
            ",
        )
        .bind(post_id.to_db())
        .bind(edit.text.get())
        .bind(edit.group.map(Id::to_db))
        .bind(edit.image.as_ref().map(|image| image.get().to_owned()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.fetch_post(post_id).await
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts.posts");
        push_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    async fn list_posts(&self, filter: PostFilter, window: PageWindow) -> Result<Vec<Post>> {
        let mut builder = QueryBuilder::<Postgres>::new(FULL_POST_SELECT);
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY posts.created_at DESC, posts.post_snowflake DESC LIMIT ");
        builder.push_bind(window.limit.cast_signed());
        builder.push(" OFFSET ");
        builder.push_bind(window.offset.cast_signed());

        let records = builder
            .build_query_as::<FullPostRecord>()
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let comment_id = self.next_id::<CommentMarker>().await;

        let record = query_as::<_, CommentRecord>(
            "
            WITH inserted AS (
                INSERT INTO posts.comments (comment_snowflake, post_snowflake, user_snowflake, text, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT
                inserted.comment_snowflake,
                inserted.post_snowflake,
                inserted.text,
                inserted.created_at,
                users.user_snowflake,
                users.username
            FROM
                inserted JOIN users.users ON users.user_snowflake = inserted.user_snowflake
            ",
        )
        .bind(comment_id.to_db())
        .bind(comment.post.to_db())
        .bind(comment.author.to_db())
        .bind(comment.text.get())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                DbError::MissingReference("post or author")
            } else {
                err.into()
            }
        })?;

        Ok(Comment::try_from(record)?)
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.text,
                comments.created_at,
                users.user_snowflake,
                users.username
            FROM
                posts.comments JOIN users.users ON users.user_snowflake = comments.user_snowflake
            WHERE
                comments.post_snowflake = $1
            ORDER BY comments.created_at DESC, comments.comment_snowflake DESC
            ",
        )
        .bind(post_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<FollowOutcome> {
        const SELECT_EDGE: &str = "
            SELECT follows.follow_snowflake, follows.follower_snowflake, follows.author_snowflake
            FROM users.follows
            WHERE follows.follower_snowflake = $1 AND follows.author_snowflake = $2
            ";

        let follow_id = self.next_id::<FollowMarker>().await;
        let mut transaction = self.pool.begin().await?;

        let existing = query_as::<_, FollowRecord>(SELECT_EDGE)
            .bind(follower.to_db())
            .bind(author.to_db())
            .fetch_optional(&mut *transaction)
            .await?;

        if let Some(existing) = existing {
            transaction.commit().await?;
            return Ok(FollowOutcome::Existing(existing.into()));
        }

        let inserted = query_as::<_, FollowRecord>(
            "
            INSERT INTO users.follows (follow_snowflake, follower_snowflake, author_snowflake)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_snowflake, author_snowflake) DO NOTHING
            RETURNING follows.follow_snowflake, follows.follower_snowflake, follows.author_snowflake
            ",
        )
        .bind(follow_id.to_db())
        .bind(follower.to_db())
        .bind(author.to_db())
        .fetch_optional(&mut *transaction)
        .await?;

        let outcome = match inserted {
            Some(record) => FollowOutcome::Created(record.into()),
            None => {
                debug!(%follower, %author, "Concurrent follow won the insert");
                let record = query_as::<_, FollowRecord>(SELECT_EDGE)
                    .bind(follower.to_db())
                    .bind(author.to_db())
                    .fetch_one(&mut *transaction)
                    .await?;
                FollowOutcome::Existing(record.into())
            }
        };

        transaction.commit().await?;
        Ok(outcome)
    }

    async fn unfollow(&self, follower: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let result = query(
            "
            DELETE FROM users.follows
            WHERE follows.follower_snowflake = $1 AND follows.author_snowflake = $2
            ",
        )
        .bind(follower.to_db())
        .bind(author.to_db())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "
            SELECT EXISTS (
                SELECT 1 FROM users.follows
                WHERE follows.follower_snowflake = $1 AND follows.author_snowflake = $2
            )
            ",
        )
        .bind(follower.to_db())
        .bind(author.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
