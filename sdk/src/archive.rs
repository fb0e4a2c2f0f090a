//! Unpacking of decrypted payloads.
//!
//! A resource arrives either as a ZIP archive or as a single raw file. After
//! decryption it is turned into a directory at the caller's uncompressed
//! path: archives are extracted next to it (their entries are expected to
//! create that directory), raw files are moved to `<uncompressed>/data`.

use {
    crate::error::{Error, Result},
    derive_more::Display,
    fs_err::tokio::{copy, create_dir_all, metadata, remove_file, rename},
    std::{
        io,
        path::{Component, Path, PathBuf, absolute},
        str::FromStr,
    },
    tokio::task::spawn_blocking,
    tracing::{debug, instrument},
    zip::ZipArchive,
};

/// Name of the file a raw payload is moved to.
pub const RAW_FILE_NAME: &str = "data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum Compression {
    #[default]
    #[display("ZIP")]
    Zip,
    #[display("NONE")]
    None,
}

impl FromStr for Compression {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("zip") {
            Ok(Self::Zip)
        } else if s.eq_ignore_ascii_case("none") {
            Ok(Self::None)
        } else {
            Err(format!("unrecognized compression type: {s}"))
        }
    }
}

/// Resolves `path` against the current directory and folds away `.` and `..`
/// without touching the filesystem.
fn normalize(path: &Path) -> io::Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component);
            }
        }
    }
    Ok(normalized)
}

/// Returns whether `path` is one of `roots` or lies below one of them.
#[inline]
pub fn path_inside_any(path: &Path, roots: &[PathBuf]) -> bool {
    let Ok(path) = normalize(path) else {
        return false;
    };
    roots
        .iter()
        .filter_map(|root| normalize(root).ok())
        .any(|root| path.starts_with(root))
}

fn unzip(source: &Path, destination: &Path) -> Result<()> {
    fs_err::create_dir_all(destination)?;
    let file = fs_err::File::open(source)?;
    let mut archive = ZipArchive::new(file).map_err(|source_err| Error::Archive {
        path: source.to_path_buf(),
        source: source_err,
    })?;
    // Entries that would land outside `destination` are rejected by `extract`.
    archive
        .extract(destination)
        .map_err(|source_err| Error::Archive {
            path: source.to_path_buf(),
            source: source_err,
        })
}

/// Turns the payload at `file_path` into the directory `uncompressed_path`
/// and returns that path.
///
/// A `file_path` that is already a directory is renamed into place. The
/// source file is deleted afterwards only if it lies inside one of
/// `safe_delete_roots`.
#[instrument(skip(safe_delete_roots))]
#[inline]
pub async fn uncompress(
    file_path: &Path,
    uncompressed_path: &Path,
    compression: Compression,
    safe_delete_roots: &[PathBuf],
) -> Result<PathBuf> {
    let source_metadata = match metadata(file_path).await {
        Ok(source_metadata) => source_metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(Error::MissingSource {
                path: file_path.to_path_buf(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    if source_metadata.is_dir() {
        if file_path != uncompressed_path {
            if let Some(parent) = uncompressed_path.parent() {
                create_dir_all(parent).await?;
            }
            rename(file_path, uncompressed_path).await?;
        }
        return Ok(uncompressed_path.to_path_buf());
    }

    match compression {
        Compression::Zip => {
            let destination = uncompressed_path
                .parent()
                .unwrap_or(Path::new("."))
                .to_path_buf();
            let source = file_path.to_path_buf();
            spawn_blocking(move || unzip(&source, &destination))
                .await
                .map_err(io::Error::other)??;
        }
        Compression::None => {
            create_dir_all(uncompressed_path).await?;
            let final_path = uncompressed_path.join(RAW_FILE_NAME);
            if let Err(err) = rename(file_path, &final_path).await {
                debug!(error = %err, "rename failed, copying raw payload");
                copy(file_path, &final_path).await?;
            }
        }
    }

    if !metadata(uncompressed_path)
        .await
        .is_ok_and(|output| output.is_dir())
    {
        return Err(Error::MissingOutput {
            path: uncompressed_path.to_path_buf(),
        });
    }

    if path_inside_any(file_path, safe_delete_roots) {
        if let Err(err) = remove_file(file_path).await {
            if err.kind() != io::ErrorKind::NotFound {
                debug!(error = %err, "failed to remove compressed source");
            }
        }
    }
    Ok(uncompressed_path.to_path_buf())
}
