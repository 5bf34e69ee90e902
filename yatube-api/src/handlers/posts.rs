use crate::{
    blob::BlobStore,
    handlers::{
        CoreError, CoreResult, Redirect,
        forms::{CommentForm, FormErrors, PostForm, PostFormValues, PostFormView, Upload},
    },
};
use serde::Serialize;
use tracing::{debug, info};
use yatube_common::model::{
    Id,
    comment::Comment,
    post::{CreatePost, EditPost, ImageRef, Post, PostFilter, PostMarker},
    user::User,
};
use yatube_db::Store;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum CreateOutcome {
    Saved { post: Post, redirect: Redirect },
    Invalid(PostFormView),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum EditOutcome {
    Saved { post: Post, redirect: Redirect },
    Invalid(PostFormView),
    /// Only the author may edit; the post is left untouched.
    NotAuthor(Redirect),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum EditFormOutcome {
    Form(PostFormView),
    NotAuthor(Redirect),
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub author_post_count: u64,
    pub comments: Vec<Comment>,
    pub comment_form: CommentForm,
}

async fn form_view(
    store: &dyn Store,
    form: PostFormValues,
    errors: FormErrors,
    post_id: Option<Id<PostMarker>>,
) -> CoreResult<PostFormView> {
    Ok(PostFormView {
        form,
        errors,
        groups: store.list_groups().await?,
        is_edit: post_id.is_some(),
        post_id,
    })
}

/// Empty uploads are dropped.
async fn store_image(blobs: &dyn BlobStore, upload: Option<Upload>) -> CoreResult<Option<ImageRef>> {
    match upload {
        Some(upload) if !upload.bytes.is_empty() => {
            Ok(Some(blobs.store(&upload.file_name, upload.bytes).await?))
        }
        _ => Ok(None),
    }
}

async fn fetch_post(store: &dyn Store, post_id: Id<PostMarker>) -> CoreResult<Post> {
    store
        .fetch_post(post_id)
        .await?
        .ok_or(CoreError::PostNotFound(post_id))
}

pub async fn create_form(store: &dyn Store) -> CoreResult<PostFormView> {
    form_view(store, PostFormValues::default(), FormErrors::default(), None).await
}

pub async fn create(
    store: &dyn Store,
    blobs: &dyn BlobStore,
    author: &User,
    form: PostForm,
) -> CoreResult<CreateOutcome> {
    let clean = match form.clean(store).await? {
        Ok(clean) => clean,
        Err(errors) => {
            debug!(author = %author.username, ?errors, "Rejected new post");
            let view = form_view(store, (&form).into(), errors, None).await?;
            return Ok(CreateOutcome::Invalid(view));
        }
    };

    let image = store_image(blobs, form.image).await?;
    let post = store
        .create_post(&CreatePost {
            author: author.id,
            text: clean.text,
            group: clean.group,
            image,
        })
        .await?;

    info!(post = %post.id, author = %author.username, text = post.text.preview(), "Created post");
    Ok(CreateOutcome::Saved {
        post,
        redirect: Redirect::Profile(author.username.clone()),
    })
}

pub async fn edit_form(
    store: &dyn Store,
    requester: &User,
    post_id: Id<PostMarker>,
) -> CoreResult<EditFormOutcome> {
    let post = fetch_post(store, post_id).await?;
    if post.author.id != requester.id {
        return Ok(EditFormOutcome::NotAuthor(Redirect::PostDetail(post_id)));
    }

    let view = form_view(store, (&post).into(), FormErrors::default(), Some(post_id)).await?;
    Ok(EditFormOutcome::Form(view))
}

pub async fn edit(
    store: &dyn Store,
    blobs: &dyn BlobStore,
    requester: &User,
    post_id: Id<PostMarker>,
    form: PostForm,
) -> CoreResult<EditOutcome> {
    let post = fetch_post(store, post_id).await?;
    if post.author.id != requester.id {
        info!(post = %post_id, requester = %requester.username, "Refused edit by non-author");
        return Ok(EditOutcome::NotAuthor(Redirect::PostDetail(post_id)));
    }

    let clean = match form.clean(store).await? {
        Ok(clean) => clean,
        Err(errors) => {
            debug!(post = %post_id, ?errors, "Rejected post edit");
            let view = form_view(store, (&form).into(), errors, Some(post_id)).await?;
            return Ok(EditOutcome::Invalid(view));
        }
    };

    let image = store_image(blobs, form.image).await?;
    let post = store
        .update_post(
            post_id,
            &EditPost {
                text: clean.text,
                group: clean.group,
                image,
            },
        )
        .await?
        .ok_or(CoreError::PostNotFound(post_id))?;

    info!(post = %post.id, text = post.text.preview(), "Edited post");
    Ok(EditOutcome::Saved {
        post,
        redirect: Redirect::PostDetail(post_id),
    })
}

pub async fn detail(store: &dyn Store, post_id: Id<PostMarker>) -> CoreResult<PostDetail> {
    let post = fetch_post(store, post_id).await?;
    let author_post_count = store.count_posts(PostFilter::Author(post.author.id)).await?;
    let comments = store.list_comments(post_id).await?;

    Ok(PostDetail {
        post,
        author_post_count,
        comments,
        comment_form: CommentForm::default(),
    })
}
