use crate::handlers::{
    CoreError, CoreResult, Redirect,
    forms::{CommentForm, FormErrors},
};
use tracing::{debug, info};
use yatube_common::model::{
    Id,
    comment::{Comment, CreateComment},
    post::PostMarker,
    user::User,
};
use yatube_db::Store;

/// Either way the client goes back to the post.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum CommentOutcome {
    Added { comment: Comment, redirect: Redirect },
    Ignored { errors: FormErrors, redirect: Redirect },
}

impl CommentOutcome {
    #[must_use]
    pub fn redirect(&self) -> &Redirect {
        match self {
            CommentOutcome::Added { redirect, .. } | CommentOutcome::Ignored { redirect, .. } => {
                redirect
            }
        }
    }
}

pub async fn add_comment(
    store: &dyn Store,
    author: &User,
    post_id: Id<PostMarker>,
    form: CommentForm,
) -> CoreResult<CommentOutcome> {
    if store.fetch_post(post_id).await?.is_none() {
        return Err(CoreError::PostNotFound(post_id));
    }
    let redirect = Redirect::PostDetail(post_id);

    let text = match form.clean() {
        Ok(text) => text,
        Err(errors) => {
            debug!(post = %post_id, author = %author.username, "Ignored empty comment");
            return Ok(CommentOutcome::Ignored { errors, redirect });
        }
    };

    let comment = store
        .create_comment(&CreateComment {
            post: post_id,
            author: author.id,
            text,
        })
        .await?;

    info!(post = %post_id, author = %author.username, text = comment.text.preview(), "Added comment");
    Ok(CommentOutcome::Added { comment, redirect })
}
