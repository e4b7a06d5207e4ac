//! Daily plan use-cases: tasks per day and routine expansion.
//!
//! # Invariants
//! - All writes go through `Repository::save` / `delete`, so validation and
//!   timestamp stamping apply.
//! - `generate_from_routines` creates at most one task per routine per day.
//! - Deleting a routine keeps tasks dated before the cutoff as history.

use crate::model::daily_routine::DailyRoutine;
use crate::model::daily_task::DailyTask;
use crate::model::entity::{Entity, EntityId};
use crate::repo::{LocalStore, LocalStores, RepoResult, Repository};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

pub struct DailyPlanService {
    tasks: Arc<LocalStore<DailyTask>>,
    routines: Arc<LocalStore<DailyRoutine>>,
}

impl DailyPlanService {
    pub fn new(tasks: Arc<LocalStore<DailyTask>>, routines: Arc<LocalStore<DailyRoutine>>) -> Self {
        Self { tasks, routines }
    }

    pub fn from_stores(stores: &LocalStores) -> Self {
        Self::new(stores.daily_tasks.clone(), stores.daily_routines.clone())
    }

    /// Tasks dated `date`, ordered by creation.
    pub async fn tasks_for(&self, date: NaiveDate) -> RepoResult<Vec<DailyTask>> {
        self.tasks.fetch_by_date(date).await
    }

    /// Creates one task for every routine scheduled on `date` that has no
    /// task on that date yet. Returns only the tasks created by this call.
    pub async fn generate_from_routines(&self, date: NaiveDate) -> RepoResult<Vec<DailyTask>> {
        let mut routines: Vec<DailyRoutine> = self
            .routines
            .fetch_all()
            .await?
            .into_iter()
            .filter(|routine| routine.is_scheduled_on(date))
            .collect();
        routines.sort_by(|a, b| a.display_order(b));

        let covered: HashSet<EntityId> = self
            .tasks
            .fetch_by_date(date)
            .await?
            .into_iter()
            .filter_map(|task| task.routine_id)
            .collect();

        let mut created = Vec::new();
        for routine in routines.iter().filter(|routine| !covered.contains(&routine.id)) {
            let mut task = DailyTask::new(routine.title.clone(), date);
            task.routine_id = Some(routine.id);
            task.notes = routine.notes.clone();
            created.push(self.tasks.save(task).await?);
        }

        info!(
            "event=plan_generate module=service status=ok date={} scheduled={} created={}",
            date,
            routines.len(),
            created.len()
        );
        Ok(created)
    }

    /// Sets the completion flag. An unchanged flag does not write.
    pub async fn set_completed(&self, task_id: EntityId, completed: bool) -> RepoResult<DailyTask> {
        let mut task = self.tasks.fetch(task_id).await?;
        if task.is_completed == completed {
            return Ok(task);
        }
        task.is_completed = completed;
        self.tasks.save(task).await
    }

    /// Deletes a routine, then its tasks dated `from` or later.
    ///
    /// Task cleanup is best-effort: failures are logged and the routine
    /// deletion still counts as done. Returns how many tasks were removed.
    pub async fn delete_routine(&self, routine_id: EntityId, from: NaiveDate) -> RepoResult<usize> {
        self.routines.delete(routine_id).await?;

        let tasks = match self.tasks.fetch_all().await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(
                    "event=routine_delete module=service status=partial routine_id={} error_code={} error={}",
                    routine_id,
                    err.code(),
                    err
                );
                return Ok(0);
            }
        };

        let mut removed = 0;
        for task in tasks
            .iter()
            .filter(|task| task.routine_id == Some(routine_id) && task.date >= from)
        {
            match self.tasks.delete(task.id).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(
                    "event=routine_delete module=service status=partial routine_id={} task_id={} error_code={} error={}",
                    routine_id,
                    task.id,
                    err.code(),
                    err
                ),
            }
        }

        info!(
            "event=routine_delete module=service status=ok routine_id={} tasks_removed={}",
            routine_id, removed
        );
        Ok(removed)
    }

    /// Removes tasks dated strictly before `date`.
    pub async fn prune_before(&self, date: NaiveDate) -> RepoResult<usize> {
        self.tasks.delete_older_than(date).await
    }
}
