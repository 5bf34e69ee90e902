//! A [`Store`] kept entirely in process memory.
//!
//! All tables sit behind one lock, so every method observes and leaves a consistent state,
//! which gives the same per-call atomicity the PostgreSQL store gets from transactions.

use crate::store::{DbError, Result, Store};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use yatube_common::{
    model::{
        Id, Text, YatubeSnowflakeGenerator,
        auth::{AccessTokenHash, Session},
        comment::{Comment, CommentMarker, CreateComment},
        follow::{Follow, FollowMarker, FollowOutcome},
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, EditPost, ImageRef, Post, PostFilter, PostMarker},
        user::{CreateUser, User, UserMarker, Username},
    },
    pagination::PageWindow,
    snowflake::{ProcessId, WorkerId},
};

#[derive(Clone, Debug)]
struct PostRow {
    id: Id<PostMarker>,
    text: Text,
    created_at: OffsetDateTime,
    author: Id<UserMarker>,
    group: Option<Id<GroupMarker>>,
    image: Option<ImageRef>,
}

#[derive(Clone, Debug)]
struct CommentRow {
    id: Id<CommentMarker>,
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    text: Text,
    created_at: OffsetDateTime,
}

#[derive(Debug)]
struct Tables {
    generator: YatubeSnowflakeGenerator,
    users: BTreeMap<Id<UserMarker>, User>,
    sessions: HashMap<AccessTokenHash, Session>,
    groups: BTreeMap<Id<GroupMarker>, Group>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    comments: BTreeMap<Id<CommentMarker>, CommentRow>,
    follows: BTreeMap<(Id<UserMarker>, Id<UserMarker>), Follow>,
}

#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(WorkerId::default(), ProcessId::default())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            tables: RwLock::new(Tables {
                generator: YatubeSnowflakeGenerator::new(worker_id, process_id),
                users: BTreeMap::new(),
                sessions: HashMap::new(),
                groups: BTreeMap::new(),
                posts: BTreeMap::new(),
                comments: BTreeMap::new(),
                follows: BTreeMap::new(),
            }),
        }
    }
}

impl Tables {
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.generator.generate().into()
    }

    fn user(&self, user_id: Id<UserMarker>) -> Result<User> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or(DbError::MissingReference("user"))
    }

    fn join_post(&self, row: &PostRow) -> Result<Post> {
        Ok(Post {
            id: row.id,
            text: row.text.clone(),
            created_at: row.created_at,
            author: self.user(row.author)?,
            group: row.group.and_then(|group_id| self.groups.get(&group_id).cloned()),
            image: row.image.clone(),
        })
    }

    fn join_comment(&self, row: &CommentRow) -> Result<Comment> {
        Ok(Comment {
            id: row.id,
            post: row.post,
            author: self.user(row.author)?,
            text: row.text.clone(),
            created_at: row.created_at,
        })
    }

    fn matches(&self, row: &PostRow, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => row.group == Some(group_id),
            PostFilter::Author(user_id) => row.author == user_id,
            PostFilter::FollowedBy(user_id) => self.follows.contains_key(&(user_id, row.author)),
        }
    }

    fn remove_post(&mut self, post_id: Id<PostMarker>) {
        self.posts.remove(&post_id);
        self.comments.retain(|_, comment| comment.post != post_id);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        let user = tables
            .users
            .values()
            .find(|user| &user.username == username)
            .cloned();
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|existing| existing.username == user.username) {
            return Err(DbError::Duplicate("user"));
        }

        let created = User {
            id: tables.next_id(),
            username: user.username.clone(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        let authored: Vec<_> = tables
            .posts
            .values()
            .filter(|post| post.author == user_id)
            .map(|post| post.id)
            .collect();
        for post_id in authored {
            tables.remove_post(post_id);
        }
        tables.comments.retain(|_, comment| comment.author != user_id);
        tables
            .follows
            .retain(|_, follow| follow.follower != user_id && follow.author != user_id);
        tables.sessions.retain(|_, session| session.user != user_id);

        Ok(true)
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.user(session.user)?;
        if tables.sessions.contains_key(&session.token_hash) {
            return Err(DbError::Duplicate("session"));
        }
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn fetch_session(&self, token_hash: &AccessTokenHash) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(token_hash).cloned())
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        Ok(self.tables.read().await.groups.get(&group_id).cloned())
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let tables = self.tables.read().await;
        let group = tables
            .groups
            .values()
            .find(|group| &group.slug == slug)
            .cloned();
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let tables = self.tables.read().await;
        let mut groups: Vec<_> = tables.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let mut tables = self.tables.write().await;
        if tables.groups.values().any(|existing| existing.slug == group.slug) {
            return Err(DbError::Duplicate("group"));
        }

        let created = Group {
            id: tables.next_id(),
            slug: group.slug.clone(),
            title: group.title.clone(),
            description: group.description.clone(),
        };
        tables.groups.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.groups.remove(&group_id).is_none() {
            return Ok(false);
        }

        for post in tables.posts.values_mut() {
            if post.group == Some(group_id) {
                post.group = None;
            }
        }
        Ok(true)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        tables
            .posts
            .get(&post_id)
            .map(|row| tables.join_post(row))
            .transpose()
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut tables = self.tables.write().await;
        tables.user(post.author)?;
        if let Some(group_id) = post.group
            && !tables.groups.contains_key(&group_id)
        {
            return Err(DbError::MissingReference("group"));
        }

        let row = PostRow {
            id: tables.next_id(),
            text: post.text.clone(),
            created_at: OffsetDateTime::now_utc(),
            author: post.author,
            group: post.group,
            image: post.image.clone(),
        };
        let created = tables.join_post(&row)?;
        tables.posts.insert(row.id, row);
        Ok(created)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, edit: &EditPost) -> Result<Option<Post>> {
        let mut tables = self.tables.write().await;
        if let Some(group_id) = edit.group
            && !tables.groups.contains_key(&group_id)
        {
            return Err(DbError::MissingReference("group"));
        }

        let Some(row) = tables.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        row.text = edit.text.clone();
        row.group = edit.group;
        if let Some(image) = &edit.image {
            row.image = Some(image.clone());
        }

        let row = row.clone();
        tables.join_post(&row).map(Some)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let tables = self.tables.read().await;
        let count = tables
            .posts
            .values()
            .filter(|row| tables.matches(row, filter))
            .count();
        Ok(count as u64)
    }

    async fn list_posts(&self, filter: PostFilter, window: PageWindow) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut posts = tables
            .posts
            .values()
            .filter(|row| tables.matches(row, filter))
            .map(|row| tables.join_post(row))
            .collect::<Result<Vec<_>>>()?;
        posts.sort_by(Post::feed_order);

        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(window.limit).unwrap_or(usize::MAX);
        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post) {
            return Err(DbError::MissingReference("post"));
        }
        tables.user(comment.author)?;

        let row = CommentRow {
            id: tables.next_id(),
            post: comment.post,
            author: comment.author,
            text: comment.text.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        let created = tables.join_comment(&row)?;
        tables.comments.insert(row.id, row);
        Ok(created)
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut comments = tables
            .comments
            .values()
            .filter(|row| row.post == post_id)
            .map(|row| tables.join_comment(row))
            .collect::<Result<Vec<_>>>()?;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<FollowOutcome> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.follows.get(&(follower, author)) {
            return Ok(FollowOutcome::Existing(*existing));
        }
        tables.user(follower)?;
        tables.user(author)?;

        let follow = Follow {
            id: tables.next_id::<FollowMarker>(),
            follower,
            author,
        };
        tables.follows.insert((follower, author), follow);
        Ok(FollowOutcome::Created(follow))
    }

    async fn unfollow(&self, follower: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.follows.remove(&(follower, author)).is_some())
    }

    async fn is_following(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .follows
            .contains_key(&(follower, author)))
    }
}
