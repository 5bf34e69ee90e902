use crate::{
    blob::BlobStore,
    handlers::{
        comments::{self, CommentOutcome},
        forms::{CommentForm, PostForm, Upload},
        posts::{self, CreateOutcome, EditFormOutcome, EditOutcome},
    },
    render::{Rendered, Renderer, View},
    server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, render},
};
use axum::{
    Form,
    extract::{Multipart, State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use yatube_common::model::{Id, post::PostMarker};
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(create_form)
        .typed_post(create_post)
        .typed_get(post_detail)
        .typed_get(edit_form)
        .typed_post(edit_post)
        .typed_post(add_comment)
}

/// Reads the `text`, `group` and `image` fields, ignoring anything else.
async fn read_post_form(mut multipart: Multipart) -> Result<PostForm> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => form.text = field.text().await?,
            Some("group") => form.group = Some(field.text().await?),
            Some("image") => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await?;
                // Browsers send an unnamed empty part when no file was picked.
                if !file_name.is_empty() {
                    form.image = Some(Upload { file_name, bytes });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn invalid_form(renderer: &dyn Renderer, view: &impl Serialize) -> Result<Response> {
    let rendered = render(renderer, View::CreatePost, view)?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, rendered).into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/", rejection(ServerError))]
struct CreatePath();

async fn create_form(
    CreatePath(): CreatePath,
    State(store): State<Arc<dyn Store>>,
    State(renderer): State<Arc<dyn Renderer>>,
    AuthenticatedUser(_): AuthenticatedUser,
) -> Result<Rendered> {
    let view = posts::create_form(&*store).await?;

    render(&*renderer, View::CreatePost, &view)
}

async fn create_post(
    CreatePath(): CreatePath,
    State(store): State<Arc<dyn Store>>,
    State(blobs): State<Arc<dyn BlobStore>>,
    State(renderer): State<Arc<dyn Renderer>>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_post_form(multipart).await?;

    match posts::create(&*store, &*blobs, &user, form).await? {
        CreateOutcome::Saved { redirect, .. } => Ok(redirect.into_response()),
        CreateOutcome::Invalid(view) => invalid_form(&*renderer, &view),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/", rejection(ServerError))]
struct PostDetailPath {
    post_id: Id<PostMarker>,
}

async fn post_detail(
    PostDetailPath { post_id }: PostDetailPath,
    State(store): State<Arc<dyn Store>>,
    State(renderer): State<Arc<dyn Renderer>>,
) -> Result<Rendered> {
    let detail = posts::detail(&*store, post_id).await?;

    render(&*renderer, View::PostDetail, &detail)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/edit/", rejection(ServerError))]
struct EditPath {
    post_id: Id<PostMarker>,
}

async fn edit_form(
    EditPath { post_id }: EditPath,
    State(store): State<Arc<dyn Store>>,
    State(renderer): State<Arc<dyn Renderer>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response> {
    match posts::edit_form(&*store, &user, post_id).await? {
        EditFormOutcome::Form(view) => {
            Ok(render(&*renderer, View::CreatePost, &view)?.into_response())
        }
        EditFormOutcome::NotAuthor(redirect) => Ok(redirect.into_response()),
    }
}

async fn edit_post(
    EditPath { post_id }: EditPath,
    State(store): State<Arc<dyn Store>>,
    State(blobs): State<Arc<dyn BlobStore>>,
    State(renderer): State<Arc<dyn Renderer>>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_post_form(multipart).await?;

    match posts::edit(&*store, &*blobs, &user, post_id, form).await? {
        EditOutcome::Saved { redirect, .. } | EditOutcome::NotAuthor(redirect) => {
            Ok(redirect.into_response())
        }
        EditOutcome::Invalid(view) => invalid_form(&*renderer, &view),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comment/", rejection(ServerError))]
struct CommentPath {
    post_id: Id<PostMarker>,
}

async fn add_comment(
    CommentPath { post_id }: CommentPath,
    State(store): State<Arc<dyn Store>>,
    AuthenticatedUser(user): AuthenticatedUser,
    form: std::result::Result<Form<CommentForm>, FormRejection>,
) -> Result<Response> {
    let form = form.map_or_else(
        |rejection| {
            debug!(%rejection, "Treating unreadable comment form as empty");
            CommentForm::default()
        },
        |Form(form)| form,
    );

    let outcome = comments::add_comment(&*store, &user, post_id, form).await?;
    if let CommentOutcome::Ignored { errors, .. } = &outcome {
        debug!(post = %post_id, ?errors, "Comment was not saved");
    }

    Ok(outcome.redirect().clone().into_response())
}
