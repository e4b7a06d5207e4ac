//! Per-type local stores rooted at one data directory.

use crate::model::daily_routine::DailyRoutine;
use crate::model::daily_task::DailyTask;
use crate::model::event::Event;
use crate::model::trip::Trip;
use crate::repo::local_store::LocalStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One independent store per entity type. Stores never share a lock.
#[derive(Clone)]
pub struct LocalStores {
    root: PathBuf,
    pub trips: Arc<LocalStore<Trip>>,
    pub events: Arc<LocalStore<Event>>,
    pub daily_tasks: Arc<LocalStore<DailyTask>>,
    pub daily_routines: Arc<LocalStore<DailyRoutine>>,
}

impl LocalStores {
    /// Opens stores under `root`. Files are read lazily on first use.
    pub fn open(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            trips: Arc::new(LocalStore::in_dir(&root)),
            events: Arc::new(LocalStore::in_dir(&root)),
            daily_tasks: Arc::new(LocalStore::in_dir(&root)),
            daily_routines: Arc::new(LocalStore::in_dir(&root)),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
