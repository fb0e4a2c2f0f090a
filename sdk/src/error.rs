use {
    chunkvault_protocol::ContentId,
    std::{io, path::PathBuf},
    thiserror::Error,
    zip::result::ZipError,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid content identifier `{id}`: {reason}")]
    PathResolution { id: String, reason: &'static str },
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: ContentId,
        actual: ContentId,
    },
    #[error("encrypted file `{}` is too short to contain an IV ({len} bytes)", path.display())]
    TruncatedFile { path: PathBuf, len: usize },
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(&'static str),
    #[error(
        "unable to decrypt `{}` using either supported format (primary: {primary}; legacy: {legacy})",
        path.display()
    )]
    DecryptionExhausted {
        path: PathBuf,
        primary: Box<Error>,
        legacy: Box<Error>,
    },
    #[error("can't uncompress non-existent file path `{}`", path.display())]
    MissingSource { path: PathBuf },
    #[error("unable to unzip `{}`", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("unable to unzip file: expected directory `{}` to exist", path.display())]
    MissingOutput { path: PathBuf },
    #[error("unable to write data with hash {id}")]
    Write {
        id: ContentId,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}
