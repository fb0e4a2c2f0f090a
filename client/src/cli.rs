use {
    chunkvault_protocol::{ContentId, Signature},
    chunkvault_sdk::archive::Compression,
    clap::{Parser, Subcommand},
    std::path::PathBuf,
};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Cli {
    /// Path to the json5 config. Defaults to `chunkvault.json5` in the
    /// user config directory.
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Print the content identifier of a file.
    Hash { file: PathBuf },
    /// Print where a blob is stored, without touching the store.
    Locate {
        id: ContentId,
        #[arg(short, long)]
        signature: Option<Signature>,
    },
    /// Print whether a blob is stored.
    Exists {
        id: ContentId,
        #[arg(short, long)]
        signature: Option<Signature>,
    },
    /// Store the contents of a file.
    Save {
        file: PathBuf,
        #[arg(short, long)]
        signature: Option<Signature>,
        /// Reject the file unless it hashes to this identifier.
        #[arg(long)]
        expected_hash: Option<ContentId>,
        /// Write to a staging file; finish with `promote`.
        #[arg(long)]
        stage: bool,
    },
    /// Publish a staged file.
    Promote {
        staging_path: PathBuf,
        id: ContentId,
        #[arg(short, long)]
        signature: Option<Signature>,
    },
    /// Copy a verified blob out of the store.
    Read {
        id: ContentId,
        output: PathBuf,
        #[arg(short, long)]
        signature: Option<Signature>,
    },
    /// Decrypt a container into `<working_dir>/zipped.zip`.
    Decrypt {
        encrypted: PathBuf,
        working_dir: PathBuf,
        /// Base-58 key. Defaults to `decryption_key` from the config.
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Build a container from a plaintext file.
    Encrypt {
        plain: PathBuf,
        output: PathBuf,
        /// Use the legacy block mode.
        #[arg(long)]
        legacy: bool,
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Unpack a decrypted payload into a directory.
    Uncompress {
        file: PathBuf,
        output: PathBuf,
        /// `zip` or `none`.
        #[arg(long, default_value_t = Compression::Zip)]
        compression: Compression,
        /// Delete `file` afterwards if it lies below this directory.
        #[arg(long = "safe-root")]
        safe_roots: Vec<PathBuf>,
    },
    /// Print a fresh random key.
    GenerateKey,
}
