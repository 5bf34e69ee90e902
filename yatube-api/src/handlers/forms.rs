//! Submitted form data and its validation.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use yatube_common::model::{
    Id, InvalidTextError, Text,
    group::{Group, GroupMarker},
    post::{Post, PostMarker},
};
use yatube_db::Store;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const NULL_CHARACTERS: &str = "Null characters are not allowed.";

fn text_error(err: InvalidTextError) -> &'static str {
    match err {
        InvalidTextError::Empty => REQUIRED,
        InvalidTextError::NullCharacter => NULL_CHARACTERS,
    }
}

/// Messages per field name.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<&'static str>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.entry(field).or_default().push(message);
    }

    #[must_use]
    pub fn field(&self, field: &str) -> &[&'static str] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// The create/edit form as submitted. `group` is the raw choice value.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<Upload>,
}

pub(crate) struct CleanPostForm {
    pub text: Text,
    pub group: Option<Id<GroupMarker>>,
}

impl PostForm {
    /// `Ok(Err(_))` is a rejected form, `Err(_)` a failed lookup.
    pub(crate) async fn clean(
        &self,
        store: &dyn Store,
    ) -> yatube_db::Result<Result<CleanPostForm, FormErrors>> {
        let mut errors = FormErrors::default();

        let text = Text::new(&self.text)
            .map_err(|err| errors.add("text", text_error(err)))
            .ok();

        let group = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let existing = match raw.parse::<Id<GroupMarker>>() {
                    Ok(group_id) => store.fetch_group(group_id).await?.map(|group| group.id),
                    Err(_) => None,
                };
                if existing.is_none() {
                    errors.add("group", INVALID_CHOICE);
                }
                existing
            }
        };

        Ok(match text {
            Some(text) if errors.is_empty() => Ok(CleanPostForm { text, group }),
            _ => Err(errors),
        })
    }
}

/// The values a post form is shown with.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
pub struct PostFormValues {
    pub text: String,
    pub group: Option<String>,
}

impl From<&PostForm> for PostFormValues {
    fn from(form: &PostForm) -> Self {
        Self {
            text: form.text.clone(),
            group: form.group.clone(),
        }
    }
}

impl From<&Post> for PostFormValues {
    fn from(post: &Post) -> Self {
        Self {
            text: post.text.get().to_owned(),
            group: post.group.as_ref().map(|group| group.id.to_string()),
        }
    }
}

/// Everything the create/edit template needs.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct PostFormView {
    pub form: PostFormValues,
    pub errors: FormErrors,
    pub groups: Vec<Group>,
    pub is_edit: bool,
    pub post_id: Option<Id<PostMarker>>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn clean(&self) -> Result<Text, FormErrors> {
        Text::new(&self.text).map_err(|err| {
            let mut errors = FormErrors::default();
            errors.add("text", text_error(err));
            errors
        })
    }
}
