use {
    super::{Algorithm, BLOCK_LENGTH, IV_LENGTH, cipher::StreamDecryptor, encrypt_container},
    crate::error::{Error, Result},
    chunkvault_protocol::DecryptionKey,
    fs_err::tokio::{File, create_dir_all, read, remove_file, write},
    std::{
        io,
        path::{Path, PathBuf},
    },
    tokio::io::{AsyncReadExt, AsyncWriteExt},
    tracing::{debug, instrument, warn},
};

/// Name of the plaintext file written into the working directory. The archive
/// extraction step that follows decryption expects this name.
pub const DECRYPTED_FILE_NAME: &str = "zipped.zip";

/// Amount of ciphertext read from disk at once.
const READ_CHUNK_LENGTH: usize = 64 * 1024;

async fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }
    Ok(())
}

/// Decrypts the container at `encrypted_path` into `decrypted_path` using one
/// algorithm. Any existing file at `decrypted_path` is overwritten.
#[instrument(skip(key))]
#[inline]
pub async fn decrypt_file(
    algorithm: Algorithm,
    key: &DecryptionKey,
    encrypted_path: &Path,
    decrypted_path: &Path,
) -> Result<()> {
    ensure_parent(decrypted_path).await?;

    let mut input = File::open(encrypted_path).await?;
    let mut iv = Vec::with_capacity(IV_LENGTH);
    (&mut input)
        .take(u64::try_from(IV_LENGTH).unwrap_or(u64::MAX))
        .read_to_end(&mut iv)
        .await?;
    let iv = <[u8; IV_LENGTH]>::try_from(iv).map_err(|iv| Error::TruncatedFile {
        path: encrypted_path.to_path_buf(),
        len: iv.len(),
    })?;

    let mut decryptor = StreamDecryptor::new(algorithm, key, &iv);
    let mut output = File::create(decrypted_path).await?;
    let mut buf = vec![0u8; READ_CHUNK_LENGTH];
    let mut plaintext = Vec::with_capacity(READ_CHUNK_LENGTH + BLOCK_LENGTH);
    loop {
        let len = input.read(&mut buf).await?;
        let Some(chunk) = buf.get(..len).filter(|chunk| !chunk.is_empty()) else {
            break;
        };
        decryptor.update(chunk, &mut plaintext);
        output.write_all(&plaintext).await?;
        plaintext.clear();
    }
    decryptor.finish(&mut plaintext)?;
    output.write_all(&plaintext).await?;
    output.flush().await?;
    Ok(())
}

/// Decrypts the container at `encrypted_path` into `<working_dir>/zipped.zip`,
/// trying the current format first and the legacy one second.
///
/// Returns `Ok(None)` without touching any file when `secret` is absent or is
/// not a base-58 encoded 32-byte key: the content is then plaintext already.
#[instrument(skip(secret))]
#[inline]
pub async fn decrypt_with_fallback(
    secret: Option<&str>,
    encrypted_path: &Path,
    working_dir: &Path,
) -> Result<Option<PathBuf>> {
    let key = match secret.map(str::parse::<DecryptionKey>) {
        Some(Ok(key)) => key,
        Some(Err(err)) => {
            debug!(error = %err, "unusable key, treating content as plaintext");
            return Ok(None);
        }
        None => {
            debug!("no key, treating content as plaintext");
            return Ok(None);
        }
    };

    let decrypted_path = working_dir.join(DECRYPTED_FILE_NAME);
    let primary = match decrypt_file(Algorithm::Cbc, &key, encrypted_path, &decrypted_path).await
    {
        Ok(()) => return Ok(Some(decrypted_path)),
        Err(err) => err,
    };
    debug!(error = %primary, "primary format failed, trying legacy format");

    match decrypt_file(Algorithm::Ecb, &key, encrypted_path, &decrypted_path).await {
        Ok(()) => Ok(Some(decrypted_path)),
        Err(legacy) => {
            if let Err(err) = remove_file(&decrypted_path).await {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(error = %err, "failed to remove partial plaintext");
                }
            }
            Err(Error::DecryptionExhausted {
                path: encrypted_path.to_path_buf(),
                primary: Box::new(primary),
                legacy: Box::new(legacy),
            })
        }
    }
}

/// Encrypts the file at `plain_path` into a container at `encrypted_path`
/// under a random IV.
#[instrument(skip(key))]
#[inline]
pub async fn encrypt_file(
    algorithm: Algorithm,
    key: &DecryptionKey,
    plain_path: &Path,
    encrypted_path: &Path,
) -> Result<()> {
    let plaintext = read(plain_path).await?;
    let iv: [u8; IV_LENGTH] = rand::random();
    let container = encrypt_container(algorithm, key, &iv, &plaintext);
    ensure_parent(encrypted_path).await?;
    write(encrypted_path, container).await?;
    Ok(())
}
