use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::api::{Error, Result};
use crate::result::MetricResult;

/// Append-only sequence of results, persisted after every append.
pub trait OutputStore {
    fn append(&mut self, record: MetricResult) -> Result<()>;

    fn contains(&self, url: &str) -> bool;

    fn records(&self) -> &[MetricResult];
}

/// Keeps the output file a complete JSON array at all times.
///
/// Every append rewrites `<path>.tmp`, syncs it to disk and renames it over `path`.
/// Appending N records therefore writes O(N²) bytes in total, which stays small for
/// batches of a few thousand repositories. Larger batches would need a line-delimited format.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: Vec<MetricResult>,
    urls: HashSet<String>,
}

impl JsonFileStore {
    /// Starts an empty output, replacing any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = JsonFileStore {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
            urls: HashSet::new(),
        };
        store.flush()?;
        Ok(store)
    }

    /// Continues an existing output, or starts an empty one if there is none.
    pub fn resume<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Self::create(path);
        }
        let records: Vec<MetricResult> = serde_json::from_slice(&fs::read(path)?)?;
        let urls = records.iter().map(|record| record.url.clone()).collect();
        debug!("Resuming {} with {} records", path.display(), records.len());
        Ok(JsonFileStore {
            path: path.to_path_buf(),
            records,
            urls,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, &self.records)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl OutputStore for JsonFileStore {
    fn append(&mut self, record: MetricResult) -> Result<()> {
        if !self.urls.insert(record.url.clone()) {
            return Err(Error::DuplicateRecord(record.url));
        }
        self.records.push(record);
        self.flush()
    }

    fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    fn records(&self) -> &[MetricResult] {
        &self.records
    }
}
