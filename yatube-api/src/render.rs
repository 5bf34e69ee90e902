//! The seam to the template layer: a view name plus a serializable context becomes a body.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum View {
    Index,
    GroupList,
    Profile,
    PostDetail,
    CreatePost,
    Follow,
}

impl View {
    #[must_use]
    pub fn template(self) -> &'static str {
        match self {
            View::Index => "posts/index.html",
            View::GroupList => "posts/group_list.html",
            View::Profile => "posts/profile.html",
            View::PostDetail => "posts/post_detail.html",
            View::CreatePost => "posts/create_post.html",
            View::Follow => "posts/follow.html",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Rendered {
    pub content_type: &'static str,
    pub body: Bytes,
}

#[derive(Debug, Error)]
#[error("Rendering {template} failed: {source}")]
pub struct RenderError {
    template: &'static str,
    source: serde_json::Error,
}

pub trait Renderer: Send + Sync {
    fn render(&self, view: View, context: Value) -> Result<Rendered, RenderError>;
}

/// Serializes `context` and hands it to `renderer`.
pub fn render_view<C: Serialize>(
    renderer: &dyn Renderer,
    view: View,
    context: &C,
) -> Result<Rendered, RenderError> {
    let context = serde_json::to_value(context).map_err(|source| RenderError {
        template: view.template(),
        source,
    })?;
    renderer.render(view, context)
}

/// Emits `{"view": <template>, "context": <context>}`.
///
/// Object keys come out sorted, so equal contexts always produce identical bytes.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, view: View, context: Value) -> Result<Rendered, RenderError> {
        let document = json!({
            "view": view.template(),
            "context": context,
        });
        let body = serde_json::to_vec(&document).map_err(|source| RenderError {
            template: view.template(),
            source,
        })?;

        Ok(Rendered {
            content_type: "application/json",
            body: body.into(),
        })
    }
}
