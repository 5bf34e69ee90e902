//! Paginated post listings: everything, one group, one author, and followed authors.

use crate::{
    cache::PageCache,
    handlers::{CoreError, CoreResult, Viewer, follows::find_user},
    render::{Rendered, Renderer, View, render_view},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use yatube_common::{
    model::{
        group::{Group, GroupSlug},
        post::{Post, PostFilter},
        user::User,
    },
    pagination::{PAGE_SIZE, Page, Paginator},
};
use yatube_db::Store;

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct IndexFeed {
    pub page: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct GroupFeed {
    pub group: Group,
    pub page: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct ProfileFeed {
    pub profile: User,
    pub page: Page<Post>,
    pub post_count: u64,
    /// Always `false` for anonymous viewers.
    pub following: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct FollowFeed {
    pub page: Page<Post>,
}

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn Store>,
    cache: Arc<PageCache>,
    renderer: Arc<dyn Renderer>,
}

impl FeedService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cache: Arc<PageCache>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            store,
            cache,
            renderer,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    async fn paginate(&self, filter: PostFilter, page: Option<&str>) -> CoreResult<Page<Post>> {
        let total = self.store.count_posts(filter).await?;
        let paginator = Paginator::new(total, PAGE_SIZE);
        let window = paginator.window(page);
        let posts = self.store.list_posts(filter, window).await?;

        Ok(Page::new(posts, window, paginator))
    }

    pub async fn global(&self, page: Option<&str>) -> CoreResult<IndexFeed> {
        Ok(IndexFeed {
            page: self.paginate(PostFilter::All, page).await?,
        })
    }

    /// The global feed as served to clients: rendered once, then reused until the cache entry
    /// expires or the cache is cleared.
    pub async fn cached_global(&self, page: Option<&str>) -> CoreResult<Rendered> {
        let key = PageCache::index_key(page);
        self.cache
            .get_or_try_insert_with(key, move || async move {
                debug!(?page, "Rendering global feed");
                let feed = self.global(page).await?;
                Ok::<_, CoreError>(render_view(&*self.renderer, View::Index, &feed)?)
            })
            .await
    }

    pub async fn group(&self, slug: &str, page: Option<&str>) -> CoreResult<GroupFeed> {
        let not_found = || CoreError::GroupNotFound(slug.to_owned());
        let parsed = GroupSlug::new(slug.to_owned()).map_err(|_| not_found())?;
        let group = self
            .store
            .fetch_group_by_slug(&parsed)
            .await?
            .ok_or_else(not_found)?;

        Ok(GroupFeed {
            page: self.paginate(PostFilter::Group(group.id), page).await?,
            group,
        })
    }

    pub async fn profile(
        &self,
        viewer: &Viewer,
        username: &str,
        page: Option<&str>,
    ) -> CoreResult<ProfileFeed> {
        let profile = find_user(&*self.store, username).await?;
        let page = self.paginate(PostFilter::Author(profile.id), page).await?;
        let following = match viewer.user() {
            Some(user) => self.store.is_following(user.id, profile.id).await?,
            None => false,
        };

        Ok(ProfileFeed {
            post_count: page.total_count,
            profile,
            page,
            following,
        })
    }

    /// Posts by every author `requester` follows.
    pub async fn following(&self, requester: &User, page: Option<&str>) -> CoreResult<FollowFeed> {
        Ok(FollowFeed {
            page: self
                .paginate(PostFilter::FollowedBy(requester.id), page)
                .await?,
        })
    }
}
