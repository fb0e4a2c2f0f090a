//! Content-addressed blob storage.
//!
//! A blob is stored at a path derived only from its content identifier and,
//! when the producer signed it, its signature:
//!
//! - `<root>/<S[0:2]>/<S[2:4]>/<S>/<H>` when a signature `S` is present,
//! - `<root>/_misc/<H[0:2]>/<H[2:4]>/<H>` otherwise,
//!
//! where `H` is the identifier and both shard components are lower-cased.
//! The presence of a regular file at that path is the only index: it always
//! holds the complete payload, because files only appear there through a
//! no-clobber rename of a fully written file.

use {
    crate::error::{Error, Result},
    bytes::Bytes,
    chunkvault_protocol::{ContentId, Signature},
    fs_err::tokio::{create_dir_all, metadata, read, remove_dir, remove_dir_all, remove_file, write},
    std::{
        env,
        io::{self, Write},
        path::{Path, PathBuf},
    },
    tempfile::{Builder, NamedTempFile, PathPersistError, TempPath},
    tokio::task::spawn_blocking,
    tracing::{debug, instrument, warn},
};

/// Bucket for blobs stored without a signature.
pub const MISC_DIR: &str = "_misc";

/// Name prefix of the per-write directories created under the staging root.
pub const STAGING_PREFIX: &str = "chunkvault-raw-";

#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Write to a private staging file and return its path instead of publishing
    /// the blob. The caller finishes with [`ChunkStore::promote`].
    pub stage: bool,
    /// Identifier announced by the producer. The payload is rejected without
    /// touching the disk if it hashes to something else.
    pub expected_id: Option<ContentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    /// Final blob path, or the staging file path for a staged write.
    pub path: PathBuf,
    pub id: ContentId,
    /// The blob was already stored and nothing was written.
    pub existed: bool,
}

#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
    staging_root: PathBuf,
}

fn check_id(id: &ContentId) -> Result<()> {
    let reason = if id.as_str().is_empty() {
        "identifier is empty"
    } else if bs58::decode(id.as_str()).into_vec().is_err() {
        "identifier is not valid base-58"
    } else {
        return Ok(());
    };
    Err(Error::PathResolution {
        id: id.to_string(),
        reason,
    })
}

/// Appends two levels of two-character shards taken from `encoded`.
fn push_shards(path: &mut PathBuf, encoded: &str) {
    let mut chars = encoded.chars();
    let first: String = chars.by_ref().take(2).collect();
    let second: String = chars.take(2).collect();
    for shard in [first, second] {
        if !shard.is_empty() {
            path.push(shard.to_lowercase());
        }
    }
}

/// Returns the directory and the file path of a blob under `root`.
///
/// Pure function of its arguments: nothing is read from or written to disk.
/// Fails with [`Error::PathResolution`] when `id` is empty or contains
/// characters outside the base-58 alphabet, so an identifier can never name a
/// path outside `root`.
#[inline]
pub fn blob_location(
    root: &Path,
    id: &ContentId,
    signature: Option<&Signature>,
) -> Result<(PathBuf, PathBuf)> {
    check_id(id)?;
    let dir = if let Some(signature) = signature {
        let signature58 = signature.to_base58();
        let mut dir = root.to_path_buf();
        push_shards(&mut dir, &signature58);
        dir.join(signature58)
    } else {
        let mut dir = root.join(MISC_DIR);
        push_shards(&mut dir, id.as_str());
        dir
    };
    let file_path = dir.join(id.as_str());
    Ok((dir, file_path))
}

fn occupied_error(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("`{}` is occupied by something other than a blob", path.display()),
    )
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f).await.map_err(io::Error::other)?
}

/// Fills an anonymous file next to `final_path` and renames it into place unless
/// a blob is already there.
///
/// Returns `false` if another writer published first. The anonymous file is
/// removed on every path that does not publish it.
fn publish_with(
    final_path: &Path,
    fill: impl FnOnce(&mut NamedTempFile) -> io::Result<()>,
) -> io::Result<bool> {
    let dir = final_path
        .parent()
        .ok_or_else(|| io::Error::other("blob path has no parent directory"))?;
    let mut file = NamedTempFile::new_in(dir)?;
    if let Err(err) = fill(&mut file).and_then(|()| file.as_file().sync_all()) {
        let partial = file.path().to_path_buf();
        if let Err(cleanup_err) = file.close() {
            warn!(path = ?partial, error = %cleanup_err, "failed to remove partial file");
        }
        return Err(err);
    }
    match file.persist_noclobber(final_path) {
        Ok(_) => Ok(true),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err.error),
    }
}

/// Moves a staged file to `final_path` without replacing an existing blob.
///
/// Returns `false` if another writer published first, in which case the staged
/// file is removed.
fn persist_staged(staging_path: &Path, final_path: &Path) -> io::Result<bool> {
    let PathPersistError { error, path } =
        match TempPath::from_path(staging_path).persist_noclobber(final_path) {
            Ok(()) => return Ok(true),
            Err(err) => err,
        };
    // Dropping `path` deletes the staged file.
    match error.kind() {
        io::ErrorKind::AlreadyExists => Ok(false),
        io::ErrorKind::CrossesDevices => {
            debug!("staging root is on another filesystem, copying staged file");
            publish_with(final_path, |file| {
                io::copy(&mut fs_err::File::open(&*path)?, file).map(|_copied| ())
            })
        }
        _ => {
            if let Err(keep_err) = path.keep() {
                warn!(error = %keep_err.error, "failed to keep staged file");
            }
            Err(error)
        }
    }
}

impl ChunkStore {
    /// Creates a store rooted at `root`, staging writes under the OS temp directory.
    #[must_use]
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staging_root: env::temp_dir(),
        }
    }

    #[must_use]
    #[inline]
    pub fn with_staging_root(mut self, staging_root: impl Into<PathBuf>) -> Self {
        self.staging_root = staging_root.into();
        self
    }

    #[must_use]
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    #[inline]
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Returns the blob path for `id`, creating its directories if `create_dirs` is set.
    ///
    /// Identifiers that are empty or not base-58 are rejected with
    /// [`Error::PathResolution`]; see [`blob_location`].
    #[inline]
    pub async fn resolve_location(
        &self,
        id: &ContentId,
        signature: Option<&Signature>,
        create_dirs: bool,
    ) -> Result<PathBuf> {
        let (dir, file_path) = blob_location(&self.root, id, signature)?;
        if create_dirs {
            create_dir_all(&dir).await?;
        }
        Ok(file_path)
    }

    /// Returns whether a regular file is stored for `id`.
    ///
    /// Any failure to resolve or inspect the path counts as "absent". The
    /// answer is a dedup hint: a false negative costs a redundant write.
    #[inline]
    pub async fn exists(&self, id: &ContentId, signature: Option<&Signature>) -> bool {
        let Ok((_, file_path)) = blob_location(&self.root, id, signature) else {
            return false;
        };
        metadata(&file_path)
            .await
            .is_ok_and(|metadata| metadata.is_file())
    }

    /// Stores `data` once per identifier.
    #[instrument(skip_all, fields(len = data.len(), ?signature, stage = options.stage))]
    #[inline]
    pub async fn save(
        &self,
        data: Bytes,
        signature: Option<&Signature>,
        options: SaveOptions,
    ) -> Result<SaveResult> {
        let id = ContentId::compute(&data);
        if let Some(expected) = options.expected_id {
            if expected != id {
                return Err(Error::HashMismatch {
                    expected,
                    actual: id,
                });
            }
        }

        let path = self
            .resolve_location(&id, signature, !options.stage)
            .await?;
        if self.exists(&id, signature).await {
            debug!(%id, "blob already stored");
            return Ok(SaveResult {
                path,
                id,
                existed: true,
            });
        }

        if options.stage {
            let staging_path = self.stage(&id, data).await?;
            return Ok(SaveResult {
                path: staging_path,
                id,
                existed: false,
            });
        }

        let target = path.clone();
        let written = blocking(move || publish_with(&target, |file| file.write_all(&data)))
            .await
            .map_err(|source| Error::Write {
                id: id.clone(),
                source,
            })?;
        if !written {
            if !self.exists(&id, signature).await {
                return Err(Error::Write {
                    id,
                    source: occupied_error(&path),
                });
            }
            debug!(%id, "concurrent writer stored the blob first");
        }
        Ok(SaveResult {
            path,
            id,
            existed: !written,
        })
    }

    /// Writes `data` to a fresh staging directory and returns the staging file path.
    #[instrument(skip_all, fields(%id, len = data.len()))]
    #[inline]
    pub async fn stage(&self, id: &ContentId, data: Bytes) -> Result<PathBuf> {
        check_id(id)?;
        let staging_root = self.staging_root.clone();
        let dir = blocking(move || {
            fs_err::create_dir_all(&staging_root)?;
            Ok(Builder::new()
                .prefix(STAGING_PREFIX)
                .tempdir_in(&staging_root)?
                .keep())
        })
        .await?;

        let staging_path = dir.join(id.as_str());
        if let Err(err) = write(&staging_path, &data).await {
            if let Err(cleanup_err) = remove_dir_all(&dir).await {
                warn!(error = %cleanup_err, "failed to remove staging directory");
            }
            return Err(err.into());
        }
        Ok(staging_path)
    }

    /// Publishes a staged file as the blob for `id` and returns the final path.
    ///
    /// If the blob is already stored, the staged file is discarded instead, so
    /// concurrent promotions of one identifier leave exactly one blob.
    #[instrument(skip_all, fields(%id, ?signature, ?staging_path))]
    #[inline]
    pub async fn promote(
        &self,
        staging_path: &Path,
        id: &ContentId,
        signature: Option<&Signature>,
    ) -> Result<PathBuf> {
        let final_path = self.resolve_location(id, signature, true).await?;
        if self.exists(id, signature).await {
            debug!("blob already stored, discarding staged copy");
            if let Err(err) = remove_file(staging_path).await {
                warn!(error = %err, "failed to discard staged copy");
            }
        } else {
            let staged = staging_path.to_path_buf();
            let target = final_path.clone();
            if !blocking(move || persist_staged(&staged, &target)).await? {
                if !self.exists(id, signature).await {
                    return Err(occupied_error(&final_path).into());
                }
                debug!("concurrent writer stored the blob first, discarded staged copy");
            }
        }
        self.remove_staging_dir(staging_path).await;
        Ok(final_path)
    }

    /// Reads a stored blob, checking that it still hashes to `id`.
    #[inline]
    pub async fn read(&self, id: &ContentId, signature: Option<&Signature>) -> Result<Vec<u8>> {
        let (_, file_path) = blob_location(&self.root, id, signature)?;
        let data = read(&file_path).await?;
        let actual = ContentId::compute(&data);
        if actual != *id {
            return Err(Error::HashMismatch {
                expected: id.clone(),
                actual,
            });
        }
        Ok(data)
    }

    async fn remove_staging_dir(&self, staging_path: &Path) {
        let Some(dir) = staging_path.parent() else {
            return;
        };
        let is_staging_dir = dir.parent() == Some(self.staging_root.as_path())
            && dir
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(STAGING_PREFIX));
        if !is_staging_dir {
            return;
        }
        if let Err(err) = remove_dir(dir).await {
            debug!(error = %err, "staging directory was not removed");
        }
    }
}
