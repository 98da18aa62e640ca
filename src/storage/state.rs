use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use time::Date;

use crate::period::Period;

const STATE_FILE: &str = "state.json";
const STATE_TMP_EXTENSION: &str = "json.tmp";

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// What the planner remembers between runs: the tracked date and which
/// document is current at each period.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    pub logs: BTreeMap<Period, String>,
}

#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<StateRecord> {
        let raw = fs::read(&self.path)
            .with_context(|| format!("reading planner state {}", self.path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("parsing planner state {}", self.path.display()))
    }

    pub fn save(&self, record: &StateRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).context("serialising planner state")?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("ensuring state dir {}", parent.display()))?;
        }
        let tmp_path = self.path.with_extension(STATE_TMP_EXTENSION);
        fs::write(&tmp_path, &json)
            .with_context(|| format!("writing temporary state {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("atomically persisting state {}", self.path.display()))?;
        Ok(())
    }
}
