//! Local result store
//!
//! Layout under the worker directory:
//!
//! ```text
//! <worker_dir>/<chainTaskId>/output/            result folder
//! <worker_dir>/<chainTaskId>/output.zip         zipped result
//! <worker_dir>/<chainTaskId>/result-info.json   cached task metadata
//! ```

use crate::chain::TaskDescription;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const OUTPUT_DIR: &str = "output";
const OUTPUT_ZIP: &str = "output.zip";
const RESULT_INFO_FILE: &str = "result-info.json";

/// Local result state. Never fails; problems are logged.
pub trait ResultStore: Send + Sync {
    fn has_result(&self, chain_task_id: &str) -> bool;

    fn save_result_info(&self, chain_task_id: &str, description: &TaskDescription);
}

/// Metadata later pipeline stages read back for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInfo {
    pub image: String,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub dataset_uri: Option<String>,
    pub saved_at: DateTime<Utc>,
}

pub struct FsResultStore {
    worker_dir: PathBuf,
    infos: RwLock<HashMap<String, ResultInfo>>,
}

impl FsResultStore {
    pub fn new(worker_dir: impl Into<PathBuf>) -> Self {
        Self {
            worker_dir: worker_dir.into(),
            infos: RwLock::new(HashMap::new()),
        }
    }

    pub fn task_dir(&self, chain_task_id: &str) -> PathBuf {
        self.worker_dir.join(chain_task_id)
    }

    pub fn result_folder_path(&self, chain_task_id: &str) -> PathBuf {
        self.task_dir(chain_task_id).join(OUTPUT_DIR)
    }

    pub fn result_zip_path(&self, chain_task_id: &str) -> PathBuf {
        self.task_dir(chain_task_id).join(OUTPUT_ZIP)
    }

    /// Cached metadata, falling back to the file written by an earlier run
    pub fn result_info(&self, chain_task_id: &str) -> Option<ResultInfo> {
        if let Some(info) = self.infos.read().get(chain_task_id) {
            return Some(info.clone());
        }

        let path = self.task_dir(chain_task_id).join(RESULT_INFO_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<ResultInfo>(&content) {
            Ok(info) => {
                self.infos
                    .write()
                    .insert(chain_task_id.to_string(), info.clone());
                Some(info)
            }
            Err(e) => {
                warn!("Unreadable result info [path:{}, error:{}]", path.display(), e);
                None
            }
        }
    }

    fn persist(&self, chain_task_id: &str, info: &ResultInfo) -> std::io::Result<()> {
        let dir = self.task_dir(chain_task_id);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(info)?;
        std::fs::write(dir.join(RESULT_INFO_FILE), json)
    }
}

impl ResultStore for FsResultStore {
    fn has_result(&self, chain_task_id: &str) -> bool {
        is_present(&self.result_zip_path(chain_task_id))
            || is_present(&self.result_folder_path(chain_task_id))
    }

    fn save_result_info(&self, chain_task_id: &str, description: &TaskDescription) {
        let info = ResultInfo {
            image: description.app_uri.clone(),
            cmd: description.cmd.clone(),
            dataset_uri: description.dataset_uri.clone(),
            saved_at: Utc::now(),
        };

        if let Err(e) = self.persist(chain_task_id, &info) {
            warn!(
                "Failed to persist result info [chainTaskId:{}, error:{}]",
                chain_task_id, e
            );
        }

        self.infos.write().insert(chain_task_id.to_string(), info);
        info!("Result info saved [chainTaskId:{}]", chain_task_id);
    }
}

fn is_present(path: &Path) -> bool {
    path.exists()
}
