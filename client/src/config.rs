use {
    anyhow::{Context as _, Result, anyhow},
    chunkvault_sdk::store::ChunkStore,
    derivative::Derivative,
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

const CONFIG_FILE_NAME: &str = "chunkvault.json5";

#[derive(Derivative, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub staging_path: Option<PathBuf>,
    #[derivative(Debug = "ignore")]
    #[serde(default)]
    pub decryption_key: Option<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[derivative(Default(value = "default_log_filter()"))]
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Config {
    /// Loads the config from `path`, or from the user config directory when
    /// `path` is `None`. A missing default file yields the default config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = if let Some(path) = path {
            path.to_path_buf()
        } else {
            let default_path = dirs::config_dir()
                .ok_or_else(|| anyhow!("cannot find config dir"))?
                .join(CONFIG_FILE_NAME);
            if !default_path.try_exists()? {
                return Ok(Self::default());
            }
            default_path
        };
        let text = fs_err::read_to_string(&path)?;
        json5::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn store(&self) -> Result<ChunkStore> {
        let root = if let Some(path) = &self.store_path {
            path.clone()
        } else {
            dirs::data_dir()
                .ok_or_else(|| anyhow!("cannot find data dir"))?
                .join("chunkvault")
        };
        let store = ChunkStore::new(root);
        Ok(if let Some(staging_path) = &self.staging_path {
            store.with_staging_root(staging_path.clone())
        } else {
            store
        })
    }
}
