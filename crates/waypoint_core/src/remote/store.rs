//! Network-backed repository for one entity type.
//!
//! # Responsibility
//! - Implement the repository contract over an injected `RemoteClient`.
//! - Drain paginated listings and normalize backend failures.
//!
//! # Invariants
//! - Every operation fails fast with `NotAuthenticated` when the client is
//!   unavailable, without issuing any request.
//! - `fetch_all` skips malformed records; `fetch` surfaces them as
//!   `ConversionFailed`.
//! - A successful write whose echoed record cannot be parsed is still an error.
//! - Deleting an id the backend does not know is success.
//! - `save` and `save_all` never lower the `updated_at` the backend already
//!   holds for a record.

use crate::config::DEFAULT_PAGE_SIZE;
use crate::model::entity::{Entity, EntityId};
use crate::remote::client::{BackendError, RemoteClient, RemoteRecord};
use crate::remote::record::{decode, encode};
use crate::repo::{stamp_updated_at, RepoError, RepoResult, Repository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Remote store for entity type `E`.
pub struct RemoteStore<E: Entity> {
    client: Arc<dyn RemoteClient>,
    page_size: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> RemoteStore<E> {
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self::with_page_size(client, DEFAULT_PAGE_SIZE)
    }

    /// Requests at most `page_size` records per listing page (at least 1).
    pub fn with_page_size(client: Arc<dyn RemoteClient>, page_size: usize) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
            _entity: PhantomData,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    async fn ensure_available(&self) -> RepoResult<()> {
        if self.client.is_available().await {
            return Ok(());
        }
        debug!(
            "event=remote_precondition module=remote status=error kind={} error_code=not_authenticated",
            E::KIND
        );
        Err(RepoError::NotAuthenticated)
    }

    /// `updated_at` of the copy the backend holds, `None` when it has none.
    /// A stored record that no longer parses is treated as absent.
    async fn stored_updated_at(&self, id: EntityId) -> RepoResult<Option<DateTime<Utc>>> {
        match self
            .client
            .fetch_record(E::KIND.record_type(), &id.to_string())
            .await
        {
            Ok(record) => match decode::<E>(&record) {
                Ok(stored) => Ok(Some(stored.updated_at())),
                Err(err) => {
                    warn!(
                        "event=remote_save module=remote status=skip kind={} id={} reason=stored_unreadable error={}",
                        E::KIND,
                        id,
                        err
                    );
                    Ok(None)
                }
            },
            Err(BackendError::UnknownItem) => Ok(None),
            Err(err) => Err(normalize(err, Some(id))),
        }
    }

    /// Upserts a batch in one request.
    ///
    /// An empty batch is a no-op. Any per-record failure fails the whole batch
    /// with `OperationFailed`; no partial result is reported.
    pub async fn save_all(&self, entities: Vec<E>) -> RepoResult<Vec<E>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_available().await?;
        let now = Utc::now();
        let mut stamped = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let stored = self.stored_updated_at(entity.id()).await?;
            entity.set_updated_at(stamp_updated_at(now, entity.updated_at(), stored));
            stamped.push(entity);
        }
        self.write_batch(stamped).await
    }

    async fn write_batch(&self, entities: Vec<E>) -> RepoResult<Vec<E>> {
        self.ensure_available().await?;
        let started_at = Instant::now();

        let mut records = Vec::with_capacity(entities.len());
        for entity in &entities {
            entity.validate()?;
            records.push(encode(entity)?);
        }
        let count = records.len();

        let results = self
            .client
            .save_records(records)
            .await
            .map_err(|err| normalize(err, None))?;
        if results.len() != count {
            return Err(RepoError::OperationFailed(format!(
                "backend acknowledged {} of {count} records",
                results.len()
            )));
        }

        let mut saved = Vec::with_capacity(count);
        for (entity, result) in entities.iter().zip(results) {
            let record = result.map_err(|err| {
                RepoError::OperationFailed(format!("record {}: {err}", entity.id()))
            })?;
            saved.push(decode::<E>(&record)?);
        }

        info!(
            "event=remote_save module=remote status=ok kind={} records={} duration_ms={}",
            E::KIND,
            count,
            started_at.elapsed().as_millis()
        );
        Ok(saved)
    }

    async fn write_one(&self, entity: E) -> RepoResult<E> {
        self.ensure_available().await?;
        entity.validate()?;
        let id = entity.id();
        let record = encode(&entity)?;

        let mut results = self
            .client
            .save_records(vec![record])
            .await
            .map_err(|err| normalize(err, None))?;
        let Some(result) = results.pop() else {
            return Err(RepoError::OperationFailed(format!(
                "backend returned no result for record {id}"
            )));
        };
        let record = result.map_err(|err| normalize(err, None))?;
        let saved = decode::<E>(&record)?;

        debug!(
            "event=remote_save module=remote status=ok kind={} id={}",
            E::KIND,
            id
        );
        Ok(saved)
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for RemoteStore<E> {
    async fn fetch_all(&self) -> RepoResult<Vec<E>> {
        self.ensure_available().await?;
        let started_at = Instant::now();
        let record_type = E::KIND.record_type();

        let mut entities = Vec::new();
        let mut skipped = 0_usize;
        let mut pages = 0_usize;
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let page = self
                .client
                .query_page(record_type, cursor.take(), self.page_size)
                .await
                .map_err(|err| normalize(err, None))?;
            pages += 1;

            for record in &page.records {
                match decode::<E>(record) {
                    Ok(entity) => entities.push(entity),
                    Err(err) => {
                        skipped += 1;
                        warn!(
                            "event=remote_fetch_all module=remote status=skip kind={} record={} error={}",
                            E::KIND,
                            record.record_name,
                            err
                        );
                    }
                }
            }

            match page.next_cursor {
                Some(next) => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(RepoError::OperationFailed(format!(
                            "backend repeated cursor `{next}`"
                        )));
                    }
                    cursor = Some(next);
                }
                None => break,
            }
        }

        info!(
            "event=remote_fetch_all module=remote status=ok kind={} records={} skipped={} pages={} duration_ms={}",
            E::KIND,
            entities.len(),
            skipped,
            pages,
            started_at.elapsed().as_millis()
        );
        Ok(entities)
    }

    async fn fetch(&self, id: EntityId) -> RepoResult<E> {
        self.ensure_available().await?;
        let record: RemoteRecord = self
            .client
            .fetch_record(E::KIND.record_type(), &id.to_string())
            .await
            .map_err(|err| normalize(err, Some(id)))?;
        decode(&record)
    }

    async fn save(&self, mut entity: E) -> RepoResult<E> {
        self.ensure_available().await?;
        let stored = self.stored_updated_at(entity.id()).await?;
        entity.set_updated_at(stamp_updated_at(Utc::now(), entity.updated_at(), stored));
        self.write_one(entity).await
    }

    async fn save_replica(&self, entity: E) -> RepoResult<E> {
        self.write_one(entity).await
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        self.ensure_available().await?;
        match self
            .client
            .delete_record(E::KIND.record_type(), &id.to_string())
            .await
        {
            Ok(()) => {
                debug!(
                    "event=remote_delete module=remote status=ok kind={} id={} present=true",
                    E::KIND,
                    id
                );
                Ok(())
            }
            Err(BackendError::UnknownItem) => {
                debug!(
                    "event=remote_delete module=remote status=ok kind={} id={} present=false",
                    E::KIND,
                    id
                );
                Ok(())
            }
            Err(err) => Err(normalize(err, Some(id))),
        }
    }
}

/// Maps backend codes onto the shared repository taxonomy.
fn normalize(err: BackendError, id: Option<EntityId>) -> RepoError {
    match err {
        BackendError::NotAuthenticated => RepoError::NotAuthenticated,
        BackendError::NetworkUnavailable => RepoError::NetworkUnavailable,
        BackendError::UnknownItem => match id {
            Some(id) => RepoError::NotFound(id),
            None => RepoError::OperationFailed(BackendError::UnknownItem.to_string()),
        },
        BackendError::Rejected(message) => {
            RepoError::OperationFailed(format!("rejected by server: {message}"))
        }
        BackendError::Other(message) => RepoError::OperationFailed(message),
    }
}
