//! Storage for uploaded post images.

use async_trait::async_trait;
use bytes::Bytes;
use rand::{Rng, distr::Alphanumeric};
use std::{io::ErrorKind, path::PathBuf};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use yatube_common::model::post::ImageRef;

pub const UPLOAD_DIR: &str = "posts";
const MAX_STEM_LEN: usize = 60;
const MAX_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Could not write image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not find a free file name for {0:?}")]
    NameExhausted(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persists `bytes` and returns the stable reference to store on the post.
    async fn store(&self, file_name: &str, bytes: Bytes) -> Result<ImageRef, BlobError>;
}

/// Writes uploads below `<root>/posts/`, never overwriting an existing file.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Splits a client supplied name into a safe stem and extension.
fn sanitize(file_name: &str) -> (String, String) {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, extension),
        _ => (base, ""),
    };

    let clean = |part: &str| -> String {
        part.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    let mut stem: String = clean(stem).chars().take(MAX_STEM_LEN).collect();
    if stem.is_empty() {
        stem.push_str("image");
    }
    let extension: String = clean(extension).chars().take(10).collect();
    (stem, extension)
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

fn join_name(stem: &str, suffix: Option<&str>, extension: &str) -> String {
    let mut name = stem.to_owned();
    if let Some(suffix) = suffix {
        name.push('_');
        name.push_str(suffix);
    }
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension);
    }
    name
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(&self, file_name: &str, bytes: Bytes) -> Result<ImageRef, BlobError> {
        let directory = self.root.join(UPLOAD_DIR);
        fs::create_dir_all(&directory).await?;

        let (stem, extension) = sanitize(file_name);
        for attempt in 0..MAX_ATTEMPTS {
            let suffix = (attempt > 0).then(random_suffix);
            let name = join_name(&stem, suffix.as_deref(), &extension);

            let opened = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(directory.join(&name))
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            };

            file.write_all(&bytes).await?;
            file.flush().await?;

            debug!(%name, size = bytes.len(), "Stored uploaded image");
            return Ok(ImageRef::new(format!("{UPLOAD_DIR}/{name}")));
        }

        Err(BlobError::NameExhausted(file_name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use crate::blob::{BlobStore, FsBlobStore, sanitize};
    use bytes::Bytes;

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize("cat.png"), ("cat".to_owned(), "png".to_owned()));
        assert_eq!(
            sanitize("../../etc/pass wd.gif"),
            ("pass_wd".to_owned(), "gif".to_owned())
        );
        assert_eq!(sanitize("C:\\x\\.hidden"), ("_hidden".to_owned(), String::new()));
        assert_eq!(sanitize(""), ("image".to_owned(), String::new()));
    }

    #[tokio::test]
    async fn collisions_get_a_suffix() {
        let root = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(root.path());

        let first = blobs.store("small.gif", Bytes::from_static(b"GIF89a")).await.unwrap();
        let second = blobs.store("small.gif", Bytes::from_static(b"GIF89a")).await.unwrap();

        assert_eq!(first.get(), "posts/small.gif");
        assert_ne!(first, second);
        assert!(second.get().starts_with("posts/small_"));
        assert!(second.get().ends_with(".gif"));

        let written = std::fs::read(root.path().join(first.get())).unwrap();
        assert_eq!(written, b"GIF89a");
    }
}
