use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{converter::Converter, document::template::DEFAULT_TEMPLATE_FILE, error::BibnoteError};

pub const DEFAULT_CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// One `sync` entry as written in the config file. Paths are relative to the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRecord {
    pub bib: String,
    #[serde(alias = "doc")]
    pub md: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// A bibliography and the notes document kept in sync with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPair {
    pub bib: PathBuf,
    pub doc: PathBuf,
    pub template: PathBuf,
}

impl SyncPair {
    pub fn new<P: Into<PathBuf>>(bib: P, doc: P, template: Option<P>) -> Self {
        SyncPair {
            bib: bib.into(),
            doc: doc.into(),
            template: template
                .map(Into::into)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_FILE)),
        }
    }

    fn from_record(record: &PairRecord, base: &Path) -> Self {
        let template = record.template.as_deref().unwrap_or(DEFAULT_TEMPLATE_FILE);
        SyncPair {
            bib: base.join(&record.bib),
            doc: base.join(&record.md),
            template: base.join(template),
        }
    }

    pub fn converter(&self) -> Converter {
        Converter::new(&self.bib, &self.doc, &self.template)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sync: Vec<PairRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debounce_ms: Option<u64>,
}

pub trait ConfigProvider: Send + Sync {
    fn get_pairs(&self) -> Result<Vec<SyncPair>, BibnoteError>;
    fn set_pairs(&self, pairs: Vec<PairRecord>) -> Result<(), BibnoteError>;
    fn get_debounce(&self) -> Result<Duration, BibnoteError> {
        Ok(DEFAULT_DEBOUNCE)
    }
}

/// Reads `config.yml` style files. A `.toml` extension switches the format to TOML.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        FileConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one pair, creating the file when needed.
    pub fn add_pair(&self, record: PairRecord) -> Result<(), BibnoteError> {
        let mut config = if self.path.exists() {
            self.read()?
        } else {
            ConfigFile::default()
        };
        config.sync.push(record);
        self.write(&config)
    }

    fn is_toml(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "toml")
    }

    fn base_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn read(&self) -> Result<ConfigFile, BibnoteError> {
        tracing::debug!("Attempting to read sync pairs from: {:?}", &self.path);
        if !self.path.exists() {
            return Err(BibnoteError::missing_file(&self.path));
        }
        let content = read_to_string(&self.path)?;
        if self.is_toml() {
            Ok(toml::from_str(&content)?)
        } else if content.trim().is_empty() {
            Ok(ConfigFile::default())
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }

    fn write(&self, config: &ConfigFile) -> Result<(), BibnoteError> {
        tracing::debug!("Attempting to write sync pairs to: {:?}", &self.path);
        let text = if self.is_toml() {
            toml::to_string(config)?
        } else {
            serde_yaml::to_string(config)?
        };
        write(&self.path, text)?;
        Ok(())
    }
}

impl ConfigProvider for FileConfigProvider {
    fn get_pairs(&self) -> Result<Vec<SyncPair>, BibnoteError> {
        let config = self.read()?;
        if config.sync.is_empty() {
            return Err(BibnoteError::Config(format!(
                "no sync pairs configured in {}",
                self.path.display()
            )));
        }
        let base = self.base_dir();
        Ok(config
            .sync
            .iter()
            .map(|record| SyncPair::from_record(record, &base))
            .collect())
    }

    fn set_pairs(&self, pairs: Vec<PairRecord>) -> Result<(), BibnoteError> {
        let mut config = if self.path.exists() {
            self.read()?
        } else {
            ConfigFile::default()
        };
        config.sync = pairs;
        self.write(&config)
    }

    fn get_debounce(&self) -> Result<Duration, BibnoteError> {
        Ok(self
            .read()?
            .debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE))
    }
}
