use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;

use crate::config::{ConfigPaths, StorageOptions};

mod names;
mod state;

pub use names::{link, log_name, TASKLIST};
pub use state::{StateFile, StateRecord};

const TMP_SUFFIX: &str = "tmp";

/// Named plain-text documents. The planner core only ever reads through this
/// trait; writes are collected in a [`Changeset`] and committed in one go.
pub trait Store {
    fn load(&self, name: &str) -> Result<String>;
    fn save(&mut self, name: &str, text: &str) -> Result<()>;
    fn exists(&self, name: &str) -> bool;

    fn load_optional(&self, name: &str) -> Result<Option<String>> {
        if self.exists(name) {
            self.load(name).map(Some)
        } else {
            Ok(None)
        }
    }

    fn commit(&mut self, changes: &Changeset) -> Result<()> {
        for (name, text) in changes.iter() {
            self.save(name, text)?;
        }
        Ok(())
    }
}

/// Ordered set of pending document writes; a later write to the same name
/// replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    writes: IndexMap<String, String>,
}

impl Changeset {
    pub fn write(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.writes.insert(name.into(), text.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.writes.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.writes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.writes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: IndexMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.docs.insert(name.to_string(), text.to_string());
        self
    }
}

impl Store for MemoryStore {
    fn load(&self, name: &str) -> Result<String> {
        self.docs
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("document {name:?} not found"))
    }

    fn save(&mut self, name: &str, text: &str) -> Result<()> {
        self.docs.insert(name.to_string(), text.to_string());
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.docs.contains_key(name)
    }
}

/// One `<name>.<extension>` file per document under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    extension: String,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}", self.extension))
    }

    fn tmp_path_for(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{name}.{}.{TMP_SUFFIX}", self.extension))
    }

    fn remove_quietly(path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(?err, "failed to remove {}", path.display()),
        }
    }
}

impl Store for DirectoryStore {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.path_for(name);
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    fn save(&mut self, name: &str, text: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating data directory {}", self.root.display()))?;
        let tmp_path = self.tmp_path_for(name);
        let final_path = self.path_for(name);
        fs::write(&tmp_path, text)
            .with_context(|| format!("writing temporary document {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("atomically persisting {}", final_path.display()))?;
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Stages every document next to its target first and only renames once
    /// all of them were written, so a failed stage leaves the store untouched.
    fn commit(&mut self, changes: &Changeset) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating data directory {}", self.root.display()))?;
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(changes.len());
        for (name, text) in changes.iter() {
            let tmp_path = self.tmp_path_for(name);
            if let Err(err) = fs::write(&tmp_path, text) {
                for (path, _) in &staged {
                    Self::remove_quietly(path);
                }
                Self::remove_quietly(&tmp_path);
                return Err(err)
                    .with_context(|| format!("staging document {}", tmp_path.display()));
            }
            staged.push((tmp_path, self.path_for(name)));
        }
        for (tmp_path, final_path) in staged {
            fs::rename(&tmp_path, &final_path)
                .with_context(|| format!("persisting {}", final_path.display()))?;
        }
        tracing::info!(
            documents = changes.len(),
            root = %self.root.display(),
            "committed planner documents"
        );
        Ok(())
    }
}

const SEED_DOCUMENTS: [(&str, &str); 7] = [
    (
        "Checkpoints_Weekday",
        "[ ] WAKE UP by 7:00\n[ ] PLAN the day\n[ ] SLEEP by 11:00\n",
    ),
    (
        "Checkpoints_Weekend",
        "[ ] WAKE UP by 9:00\n[ ] SLEEP by 11:30\n",
    ),
    ("Checkpoints_Week", "[ ] REVIEW last week\n[ ] SET theme\n"),
    ("Checkpoints_Month", "[ ] REVIEW last month\n"),
    ("Checkpoints_Quarter", "[ ] REVIEW last quarter\n"),
    ("Checkpoints_Year", "[ ] REVIEW last year\n"),
    ("Periodic_Day", "exercise\nread\n"),
];

pub fn init(paths: &ConfigPaths, options: &StorageOptions) -> Result<DirectoryStore> {
    let root = &paths.data_dir;
    let existed = root.join(format!("{TASKLIST}.{}", options.extension)).exists();
    fs::create_dir_all(root)
        .with_context(|| format!("creating data directory {}", root.display()))?;
    let mut store = DirectoryStore::new(root.clone(), options.extension.clone());
    if !existed {
        seed_initial_documents(&mut store)?;
    }
    Ok(store)
}

fn seed_initial_documents(store: &mut DirectoryStore) -> Result<()> {
    tracing::info!("seeding first-run checkpoint templates");
    for (name, text) in SEED_DOCUMENTS {
        if !store.exists(name) {
            store.save(name, text).context("writing seed document")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_round_trip() -> anyhow::Result<()> {
        let mut store = MemoryStore::new().with("Tasklist", "TOMORROW:\n");
        assert!(store.exists("Tasklist"));
        assert_eq!(store.load_optional("missing")?, None);
        store.save("Tasklist", "SOMEDAY:\n")?;
        assert_eq!(store.load("Tasklist")?, "SOMEDAY:\n");
        assert!(store.load("missing").is_err());
        Ok(())
    }

    #[test]
    fn changeset_keeps_last_write_per_name() {
        let mut changes = Changeset::default();
        changes.write("a", "1");
        changes.write("b", "2");
        changes.write("a", "3");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes.get("a"), Some("3"));
        assert_eq!(changes.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn directory_commit_writes_every_document() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut store = DirectoryStore::new(temp.path().join("data"), "wiki");
        let mut changes = Changeset::default();
        changes.write("December 6, 2012", "AGENDA:\n");
        changes.write("Tasklist", "TOMORROW:\n");
        store.commit(&changes)?;

        assert!(store.path_for("December 6, 2012").is_file());
        assert_eq!(store.load("Tasklist")?, "TOMORROW:\n");
        let leftovers: Vec<_> = fs::read_dir(store.root())?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some(TMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty(), "no staged files remain");
        Ok(())
    }

    #[test]
    fn failed_stage_leaves_store_untouched() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut store = DirectoryStore::new(temp.path(), "wiki");
        store.save("Tasklist", "original\n")?;

        let mut changes = Changeset::default();
        changes.write("Tasklist", "updated\n");
        changes.write("missing-dir/December 6, 2012", "AGENDA:\n");
        assert!(store.commit(&changes).is_err());

        assert_eq!(store.load("Tasklist")?, "original\n");
        assert!(!store.tmp_path_for("Tasklist").exists());
        Ok(())
    }
}
