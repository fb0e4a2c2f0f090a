use {
    anyhow::{Context as _, Result, bail, ensure},
    bytes::Bytes,
    chunkvault_protocol::{ContentId, Signature, util::log_writer},
    chunkvault_sdk::store::{ChunkStore, SaveOptions, blob_location},
    clap::Parser,
    fs_err::read_dir,
    futures::future::try_join_all,
    rand::Rng,
    std::{
        collections::HashSet,
        io,
        path::{Path, PathBuf},
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    },
    tempfile::TempDir,
    tokio::{task::JoinHandle, time::sleep},
    tracing::{debug, error, info},
    tracing_subscriber::{EnvFilter, util::SubscriberInitExt},
};

/// Hammers one store with concurrent writers of overlapping payloads and
/// checks that every payload ends up stored exactly once and intact.
#[derive(Debug, Parser)]
struct Args {
    /// Number of distinct payloads per round.
    #[clap(long, default_value_t = 16)]
    payloads: usize,
    /// Concurrent writers per payload.
    #[clap(long, default_value_t = 8)]
    writers: usize,
    /// Tasks polling the final paths while writers run.
    #[clap(long, default_value_t = 4)]
    readers: usize,
    #[clap(long, default_value_t = 10)]
    rounds: usize,
    /// Upper bound of a payload size in bytes.
    #[clap(long, default_value_t = 256 * 1024)]
    max_len: usize,
    /// Put the staging root on this path instead of inside the store's
    /// temporary directory, e.g. to exercise cross-device promotion.
    #[clap(long)]
    staging_root: Option<PathBuf>,
    #[clap(long)]
    log_file: Option<PathBuf>,
    #[clap(long, default_value = "info")]
    log_filter: String,
    /// Keep the store directory after the run.
    #[clap(long)]
    keep: bool,
}

#[derive(Debug)]
struct Payload {
    data: Bytes,
    id: ContentId,
    signature: Option<Signature>,
    final_path: PathBuf,
}

#[derive(Debug, Default)]
struct Stats {
    reads: AtomicUsize,
    staged_writes: AtomicUsize,
    direct_writes: AtomicUsize,
}

#[tokio::main]
async fn main() {
    if let Err(err) = try_main().await {
        error!("{err:?}");
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(log_writer(args.log_file.as_deref())?))
        .with_env_filter(EnvFilter::try_new(&args.log_filter)?)
        .finish()
        .init();

    let dir = TempDir::new()?;
    info!(dir = ?dir.path(), "starting");
    for round in 0..args.rounds {
        let store_dir = dir.path().join(format!("round{round}"));
        let staging_root = args
            .staging_root
            .as_ref()
            .map_or_else(|| store_dir.join("staging"), |path| path.join(format!("round{round}")));
        let store = ChunkStore::new(store_dir.join("data")).with_staging_root(staging_root);
        run_round(&args, Arc::new(store))
            .await
            .with_context(|| format!("round {round} failed"))?;
        info!(round, "round passed");
    }
    if args.keep {
        info!(dir = ?dir.keep(), "keeping store directory");
    }
    Ok(())
}

fn random_payloads(root: &Path, count: usize, max_len: usize) -> Result<Vec<Payload>> {
    let mut rng = rand::rng();
    let mut payloads = Vec::with_capacity(count);
    let mut seen = HashSet::new();
    while payloads.len() < count {
        let mut data = vec![0u8; rng.random_range(0..=max_len)];
        rng.fill(data.as_mut_slice());
        let id = ContentId::compute(&data);
        if !seen.insert(id.clone()) {
            continue;
        }
        let signature = rng
            .random_bool(0.5)
            .then(|| Signature::from(std::array::from_fn(|_| rng.random::<u8>())));
        let (_, final_path) = blob_location(root, &id, signature.as_ref())?;
        payloads.push(Payload {
            data: data.into(),
            id,
            signature,
            final_path,
        });
    }
    Ok(payloads)
}

async fn write_once(store: &ChunkStore, payload: &Payload, stage: bool) -> Result<()> {
    let options = SaveOptions {
        stage,
        expected_id: Some(payload.id.clone()),
    };
    let saved = store
        .save(payload.data.clone(), payload.signature.as_ref(), options)
        .await?;
    let final_path = if stage && !saved.existed {
        store
            .promote(&saved.path, &payload.id, payload.signature.as_ref())
            .await?
    } else {
        saved.path
    };
    ensure!(
        final_path == payload.final_path,
        "unexpected final path {}",
        final_path.display()
    );
    Ok(())
}

async fn read_until_stopped(
    payloads: Arc<Vec<Payload>>,
    stop: Arc<AtomicBool>,
    stats: Arc<Stats>,
) -> Result<()> {
    while !stop.load(Ordering::Relaxed) {
        for payload in payloads.iter() {
            match fs_err::tokio::read(&payload.final_path).await {
                Ok(data) => {
                    ensure!(
                        data == payload.data,
                        "reader saw {} bytes of a {}-byte blob at {}",
                        data.len(),
                        payload.data.len(),
                        payload.final_path.display()
                    );
                    stats.reads.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        sleep(Duration::from_millis(1)).await;
    }
    Ok(())
}

async fn run_round(args: &Args, store: Arc<ChunkStore>) -> Result<()> {
    let payloads = Arc::new(random_payloads(store.root(), args.payloads, args.max_len)?);
    let stop = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(Stats::default());

    let readers: Vec<JoinHandle<Result<()>>> = (0..args.readers)
        .map(|_| {
            tokio::spawn(read_until_stopped(
                Arc::clone(&payloads),
                Arc::clone(&stop),
                Arc::clone(&stats),
            ))
        })
        .collect();

    let mut writers: Vec<JoinHandle<Result<()>>> = Vec::new();
    for index in 0..payloads.len() {
        for _ in 0..args.writers {
            let stage = rand::random_bool(0.5);
            let store = Arc::clone(&store);
            let payloads = Arc::clone(&payloads);
            let stats = Arc::clone(&stats);
            writers.push(tokio::spawn(async move {
                let payload = payloads.get(index).context("payload index")?;
                write_once(&store, payload, stage).await?;
                let counter = if stage {
                    &stats.staged_writes
                } else {
                    &stats.direct_writes
                };
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }));
        }
    }
    let writer_results = try_join_all(writers).await;
    stop.store(true, Ordering::Relaxed);
    for result in writer_results? {
        result?;
    }
    for result in try_join_all(readers).await? {
        result?;
    }
    debug!(?stats, "workers finished");

    for payload in payloads.iter() {
        let data = store
            .read(&payload.id, payload.signature.as_ref())
            .await
            .with_context(|| format!("payload {} is missing or corrupt", payload.id))?;
        ensure!(data == payload.data, "payload {} differs", payload.id);
        ensure!(
            store.exists(&payload.id, payload.signature.as_ref()).await,
            "payload {} is not reported as stored",
            payload.id
        );
    }

    let expected: HashSet<String> = payloads.iter().map(|p| p.id.to_string()).collect();
    let mut found = Vec::new();
    list_files(store.root(), &mut found)?;
    for path in &found {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if !expected.contains(name) {
            bail!("unexpected file left in store: {}", path.display());
        }
    }
    ensure!(
        found.len() == payloads.len(),
        "expected {} blobs, found {}",
        payloads.len(),
        found.len()
    );

    if store.staging_root().exists() {
        let leftovers = read_dir(store.staging_root())?.count();
        ensure!(leftovers == 0, "{leftovers} staging entries survived");
    }
    Ok(())
}

fn list_files(dir: &Path, output: &mut Vec<PathBuf>) -> Result<()> {
    for entry in read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            list_files(&entry.path(), output)?;
        } else {
            output.push(entry.path());
        }
    }
    Ok(())
}
