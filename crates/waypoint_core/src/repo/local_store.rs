//! File-backed local repository for one entity collection.
//!
//! # Responsibility
//! - Keep the whole collection in an in-memory map, loaded once on first use.
//! - Persist the full map as one JSON array after every mutation.
//!
//! # Invariants
//! - All operations on one store are serialized by a single async mutex held
//!   across load, mutate, and persist.
//! - Persistence writes `<stem>.json.tmp`, fsyncs it, then renames it over
//!   `<stem>.json`; readers never observe a half-written file.
//! - A failed persist restores the in-memory map to its previous state.
//! - A missing file is an empty store; a malformed file is `LoadFailed`.

use crate::model::entity::{DatedEntity, Entity, EntityId};
use crate::repo::{stamp_updated_at, BoxError, RepoError, RepoResult, Repository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

type Records<E> = HashMap<EntityId, E>;

/// Local store for entity type `E`.
pub struct LocalStore<E: Entity> {
    path: PathBuf,
    // `None` until the first operation loads the file.
    records: Mutex<Option<Records<E>>>,
}

impl<E: Entity> LocalStore<E> {
    /// Creates a store backed by an explicit file path. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Mutex::new(None),
        }
    }

    /// Creates a store at `<dir>/<stem>.json` for the entity kind.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(
            dir.as_ref()
                .join(format!("{}.json", E::KIND.file_stem())),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn cache<'g>(&self, slot: &'g mut Option<Records<E>>) -> RepoResult<&'g mut Records<E>> {
        if slot.is_none() {
            let loaded = read_collection::<E>(&self.path).await?;
            *slot = Some(loaded);
        }
        Ok(slot.get_or_insert_with(HashMap::new))
    }

    async fn upsert(&self, mut entity: E, restamp: bool) -> RepoResult<E> {
        entity.validate()?;

        let mut guard = self.records.lock().await;
        let records = self.cache(&mut guard).await?;
        let id = entity.id();

        if restamp {
            let stored = records.get(&id).map(Entity::updated_at);
            entity.set_updated_at(stamp_updated_at(Utc::now(), entity.updated_at(), stored));
        }

        let previous = records.insert(id, entity.clone());
        if let Err(err) = write_collection(&self.path, records).await {
            match previous {
                Some(previous) => records.insert(id, previous),
                None => records.remove(&id),
            };
            error!(
                "event=local_save module=repo status=error kind={} id={} error={}",
                E::KIND,
                id,
                err
            );
            return Err(RepoError::SaveFailed(err));
        }

        debug!(
            "event=local_save module=repo status=ok kind={} id={} insert={}",
            E::KIND,
            id,
            previous.is_none()
        );
        Ok(entity)
    }
}

impl<E: DatedEntity> LocalStore<E> {
    /// Returns records whose date axis equals `date`, in display order.
    pub async fn fetch_by_date(&self, date: NaiveDate) -> RepoResult<Vec<E>> {
        let mut guard = self.records.lock().await;
        let records = self.cache(&mut guard).await?;
        let mut matching: Vec<E> = records
            .values()
            .filter(|record| record.date() == date)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.display_order(b));
        Ok(matching)
    }

    /// Removes every record dated strictly before `date` and persists once.
    ///
    /// Returns the number of removed records. Nothing is written when no
    /// record matches.
    pub async fn delete_older_than(&self, date: NaiveDate) -> RepoResult<usize> {
        let mut guard = self.records.lock().await;
        let records = self.cache(&mut guard).await?;

        let stale: Vec<EntityId> = records
            .values()
            .filter(|record| record.date() < date)
            .map(Entity::id)
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let removed: Vec<E> = stale.iter().filter_map(|id| records.remove(id)).collect();
        if let Err(err) = write_collection(&self.path, records).await {
            for record in removed {
                records.insert(record.id(), record);
            }
            error!(
                "event=local_prune module=repo status=error kind={} before={} error={}",
                E::KIND,
                date,
                err
            );
            return Err(RepoError::DeleteFailed(err));
        }

        info!(
            "event=local_prune module=repo status=ok kind={} before={} removed={}",
            E::KIND,
            date,
            removed.len()
        );
        Ok(removed.len())
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for LocalStore<E> {
    async fn fetch_all(&self) -> RepoResult<Vec<E>> {
        let mut guard = self.records.lock().await;
        let records = self.cache(&mut guard).await?;
        let mut all: Vec<E> = records.values().cloned().collect();
        all.sort_by(|a, b| a.display_order(b));
        Ok(all)
    }

    async fn fetch(&self, id: EntityId) -> RepoResult<E> {
        let mut guard = self.records.lock().await;
        let records = self.cache(&mut guard).await?;
        records.get(&id).cloned().ok_or(RepoError::NotFound(id))
    }

    async fn save(&self, entity: E) -> RepoResult<E> {
        self.upsert(entity, true).await
    }

    async fn save_replica(&self, entity: E) -> RepoResult<E> {
        self.upsert(entity, false).await
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        let mut guard = self.records.lock().await;
        let records = self.cache(&mut guard).await?;

        let Some(removed) = records.remove(&id) else {
            debug!(
                "event=local_delete module=repo status=ok kind={} id={} present=false",
                E::KIND,
                id
            );
            return Ok(());
        };

        if let Err(err) = write_collection(&self.path, records).await {
            records.insert(id, removed);
            error!(
                "event=local_delete module=repo status=error kind={} id={} error={}",
                E::KIND,
                id,
                err
            );
            return Err(RepoError::DeleteFailed(err));
        }

        debug!(
            "event=local_delete module=repo status=ok kind={} id={} present=true",
            E::KIND,
            id
        );
        Ok(())
    }
}

async fn read_collection<E: Entity>(path: &Path) -> RepoResult<Records<E>> {
    let started_at = Instant::now();
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(
                "event=local_load module=repo status=ok kind={} records=0 file=absent",
                E::KIND
            );
            return Ok(HashMap::new());
        }
        Err(err) => {
            error!(
                "event=local_load module=repo status=error kind={} error_code=read_failed error={}",
                E::KIND,
                err
            );
            return Err(RepoError::LoadFailed(Box::new(err)));
        }
    };

    let list: Vec<E> = serde_json::from_slice(&bytes).map_err(|err| {
        error!(
            "event=local_load module=repo status=error kind={} error_code=decode_failed error={}",
            E::KIND,
            err
        );
        RepoError::LoadFailed(Box::new(err))
    })?;

    let total = list.len();
    let mut records = HashMap::with_capacity(total);
    for record in list {
        records.insert(record.id(), record);
    }
    if records.len() != total {
        warn!(
            "event=local_load module=repo status=warn kind={} duplicate_ids={}",
            E::KIND,
            total - records.len()
        );
    }

    info!(
        "event=local_load module=repo status=ok kind={} records={} duration_ms={}",
        E::KIND,
        records.len(),
        started_at.elapsed().as_millis()
    );
    Ok(records)
}

async fn write_collection<E: Entity>(path: &Path, records: &Records<E>) -> Result<(), BoxError> {
    let mut list: Vec<&E> = records.values().collect();
    list.sort_by(|a, b| a.display_order(b));
    let bytes = serde_json::to_vec_pretty(&list)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = temp_path(path);
    if let Err(err) = write_and_sync(&tmp, &bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(Box::new(err));
    }
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(Box::new(err));
    }
    Ok(())
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::temp_path;
    use std::path::Path;

    #[test]
    fn temp_path_sits_next_to_target() {
        assert_eq!(
            temp_path(Path::new("/data/trips.json")),
            Path::new("/data/trips.json.tmp")
        );
    }
}
