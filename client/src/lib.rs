pub mod cli;
pub mod config;

use {
    anyhow::{Context as _, Result},
    bytes::Bytes,
    chunkvault_protocol::{ContentId, DecryptionKey, util::log_writer},
    chunkvault_sdk::{
        archive::uncompress,
        crypto::{Algorithm, decrypt_with_fallback, encrypt_file},
        store::SaveOptions,
    },
    cli::Command,
    config::Config,
    fs_err::tokio::{read, write},
    std::{io::Write, path::Path, sync::Mutex},
    tracing::info,
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

/// Installs the global subscriber, writing to `log_file` or stderr.
#[inline]
pub fn setup_logger(log_file: Option<&Path>, log_filter: &str) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(log_file.is_none())
        .with_writer(Mutex::new(log_writer(log_file)?));
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_new(log_filter)?)
        .init();
    Ok(())
}

/// Executes `command`, printing its result to `out`.
#[inline]
pub async fn run(command: Command, config: &Config, out: &mut (impl Write + Send)) -> Result<()> {
    match command {
        Command::Hash { file } => {
            let data = read(&file).await?;
            writeln!(out, "{}", ContentId::compute(&data))?;
        }
        Command::Locate { id, signature } => {
            let path = config
                .store()?
                .resolve_location(&id, signature.as_ref(), false)
                .await?;
            writeln!(out, "{}", path.display())?;
        }
        Command::Exists { id, signature } => {
            let exists = config.store()?.exists(&id, signature.as_ref()).await;
            writeln!(out, "{exists}")?;
        }
        Command::Save {
            file,
            signature,
            expected_hash,
            stage,
        } => {
            let data = Bytes::from(read(&file).await?);
            let options = SaveOptions {
                stage,
                expected_id: expected_hash,
            };
            let saved = config
                .store()?
                .save(data, signature.as_ref(), options)
                .await
                .with_context(|| format!("failed to save {}", file.display()))?;
            writeln!(out, "path: {}", saved.path.display())?;
            writeln!(out, "id: {}", saved.id)?;
            writeln!(out, "existed: {}", saved.existed)?;
        }
        Command::Promote {
            staging_path,
            id,
            signature,
        } => {
            let path = config
                .store()?
                .promote(&staging_path, &id, signature.as_ref())
                .await?;
            writeln!(out, "{}", path.display())?;
        }
        Command::Read {
            id,
            output,
            signature,
        } => {
            let data = config.store()?.read(&id, signature.as_ref()).await?;
            write(&output, data).await?;
            info!(%id, ?output, "blob copied");
        }
        Command::Decrypt {
            encrypted,
            working_dir,
            key,
        } => {
            let key = key.or_else(|| config.decryption_key.clone());
            match decrypt_with_fallback(key.as_deref(), &encrypted, &working_dir).await? {
                Some(path) => writeln!(out, "{}", path.display())?,
                None => writeln!(out, "no decryption performed")?,
            }
        }
        Command::Encrypt {
            plain,
            output,
            legacy,
            key,
        } => {
            let key: DecryptionKey = key
                .or_else(|| config.decryption_key.clone())
                .context("missing `--key` or `decryption_key` in config")?
                .parse()
                .context("invalid key")?;
            let algorithm = if legacy {
                Algorithm::Ecb
            } else {
                Algorithm::Cbc
            };
            encrypt_file(algorithm, &key, &plain, &output).await?;
            info!(%algorithm, ?output, "container written");
        }
        Command::Uncompress {
            file,
            output,
            compression,
            safe_roots,
        } => {
            let path = uncompress(&file, &output, compression, &safe_roots).await?;
            writeln!(out, "{}", path.display())?;
        }
        Command::GenerateKey => {
            writeln!(out, "{}", DecryptionKey::generate()?.display_unmasked())?;
        }
    }
    Ok(())
}
