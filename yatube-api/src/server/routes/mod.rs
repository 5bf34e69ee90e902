use crate::server::ServerRouter;

mod admin;
mod feeds;
mod follows;
mod posts;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(feeds::routes())
        .merge(posts::routes())
        .merge(follows::routes())
        .merge(admin::routes())
}
