//! Goals, progress and first-completion detection.
//!
//! Progress is recomputed on demand ([`GoalComponent::goal_progress`]) and in
//! the background whenever a log for the goal's activity is created or
//! updated. The bus callback only enqueues a [`RecomputeJob`]; a single worker
//! task evaluates the user's active goals for that activity in order.
//!
//! The first evaluation that reaches 100% marks the goal completed through the
//! store's conditional update. Only the call that wins that update publishes
//! `goal:achieved`, so a goal is announced once no matter how many recomputes
//! race.

use super::worker::{JobQueue, JobSender};
use super::{ActivityComponent, DatabaseComponent, Slot, names};
use crate::error::DomainError;
use crate::model::{Goal, GoalUpdate, NewGoal};
use crate::period::{local_today, resolve_window};
use crate::progress::{GoalProgress, compute_progress};
use crate::store::TrackerStore;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::sync::Arc;
use tally_core::component::{Component, ComponentBase, ComponentError};
use tally_core::environment::Clock;
use tally_core::event::{AppEvent, EventKind, GoalAchieved, GoalEvent, LogEvent};
use tally_core::event_bus::EventBus;
use tally_core::types::{ActivityId, GoalId, UserId};
use tracing::{debug, info, warn};

/// Background request to re-evaluate a user's goals for one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeJob {
    /// Goal owner.
    pub user: UserId,
    /// Activity whose logs changed.
    pub activity: ActivityId,
}

/// Progress evaluation shared by the request path and the worker.
#[derive(Clone)]
struct GoalTracker {
    store: Arc<dyn TrackerStore>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl GoalTracker {
    async fn evaluate(&self, goal: &Goal) -> Result<GoalProgress, DomainError> {
        let now = self.clock.now();
        let window = resolve_window(goal, now, self.offset);
        let logs = self
            .store
            .logs_between(goal.owner_id, goal.activity_id, window.start, window.end)
            .await?;
        let progress = compute_progress(goal, &window, &logs)?;

        if progress.completed && goal.is_active && !goal.is_completed {
            self.complete(goal, now).await?;
        }
        Ok(progress)
    }

    async fn complete(&self, goal: &Goal, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.store.mark_goal_completed(goal.id, now).await? {
            debug!(goal_id = %goal.id, "Goal already completed");
            return Ok(());
        }

        let (goal_name, goal_unit) = match self.store.get_activity(goal.activity_id).await? {
            Some(activity) => (activity.name, activity.unit),
            None => (String::from("Goal"), String::new()),
        };
        info!(goal_id = %goal.id, user_id = %goal.owner_id, "Goal achieved");
        metrics::counter!("goal_achievements_total").increment(1);

        self.bus.publish(&AppEvent::Goal(GoalEvent::Achieved(GoalAchieved {
            user_id: goal.owner_id,
            goal_id: goal.id,
            goal_name,
            goal_target: goal.target_value,
            goal_unit,
            goal_period: goal.period_type,
            timestamp: now,
        })));
        Ok(())
    }

    async fn recompute(&self, job: RecomputeJob) -> Result<(), DomainError> {
        let goals = self
            .store
            .active_goals_for_activity(job.user, job.activity)
            .await?;
        let mut first_failure = None;
        for goal in goals.iter().filter(|goal| !goal.is_completed) {
            if let Err(err) = self.evaluate(goal).await {
                warn!(goal_id = %goal.id, error = %err, "Goal evaluation failed");
                first_failure.get_or_insert(err);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

/// Goal management and progress tracking.
///
/// Depends on [`names::DATABASE`] and [`names::ACTIVITY`].
pub struct GoalComponent {
    base: ComponentBase,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    store: Slot<dyn TrackerStore>,
    activities: Slot<ActivityComponent>,
    tracker: Slot<GoalTracker>,
    jobs: Slot<JobSender<RecomputeJob>>,
    queue: JobQueue<RecomputeJob>,
}

impl GoalComponent {
    /// Creates the component. Periods are resolved in UTC.
    pub fn new(bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: ComponentBase::new(names::GOAL, bus),
            clock,
            offset: Utc.fix(),
            store: Slot::new(names::GOAL),
            activities: Slot::new(names::GOAL),
            tracker: Slot::new(names::GOAL),
            jobs: Slot::new(names::GOAL),
            queue: JobQueue::new(names::GOAL),
        }
    }

    /// Resolves period boundaries in `offset` instead of UTC.
    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Creates a goal for one of `user`'s activities.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTarget`] unless the target is positive,
    /// [`DomainError::Validation`] when the end date precedes the start, and
    /// the activity lookup errors.
    pub async fn create_goal(&self, user: UserId, input: NewGoal) -> Result<Goal, DomainError> {
        let store = self.store.get()?;
        validate_target(input.target_value)?;
        self.activities
            .get()?
            .get_activity(user, input.activity_id)
            .await?;

        let now = self.clock.now();
        let start_date = input
            .start_date
            .unwrap_or_else(|| local_today(now, self.offset));
        validate_dates(start_date, input.end_date)?;

        let goal = Goal {
            id: GoalId::new(),
            owner_id: user,
            activity_id: input.activity_id,
            target_value: input.target_value,
            period_type: input.period_type,
            start_date,
            end_date: input.end_date,
            is_active: true,
            is_completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_goal(&goal).await?;
        info!(goal_id = %goal.id, period = %goal.period_type, target = goal.target_value, "Goal created");

        self.base.publish(&AppEvent::Goal(GoalEvent::Created {
            user_id: user,
            goal_id: goal.id,
            activity_id: goal.activity_id,
            timestamp: now,
        }));
        self.enqueue(user, goal.activity_id)?;
        Ok(goal)
    }

    /// Loads one of `user`'s goals.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when the goal does not exist or belongs to
    /// someone else.
    pub async fn get_goal(&self, user: UserId, id: GoalId) -> Result<Goal, DomainError> {
        self.store
            .get()?
            .get_goal(id)
            .await?
            .filter(|goal| goal.owner_id == user)
            .ok_or_else(|| DomainError::not_found("Goal", id))
    }

    /// `user`'s goals, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_goals(&self, user: UserId, active_only: bool) -> Result<Vec<Goal>, DomainError> {
        Ok(self.store.get()?.list_goals(user, active_only).await?)
    }

    /// Applies a partial update and schedules a recompute. Completion state
    /// is never changed here.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`], [`DomainError::InvalidTarget`] or
    /// [`DomainError::Validation`].
    pub async fn update_goal(
        &self,
        user: UserId,
        id: GoalId,
        update: GoalUpdate,
    ) -> Result<Goal, DomainError> {
        let store = self.store.get()?;
        let mut goal = self.get_goal(user, id).await?;

        if let Some(target) = update.target_value {
            validate_target(target)?;
            goal.target_value = target;
        }
        if let Some(period_type) = update.period_type {
            goal.period_type = period_type;
        }
        if let Some(start_date) = update.start_date {
            goal.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            goal.end_date = end_date;
        }
        if let Some(is_active) = update.is_active {
            goal.is_active = is_active;
        }
        validate_dates(goal.start_date, goal.end_date)?;
        goal.updated_at = self.clock.now();
        store.update_goal(&goal).await?;

        self.base.publish(&AppEvent::Goal(GoalEvent::Updated {
            user_id: user,
            goal_id: id,
            timestamp: goal.updated_at,
        }));
        self.enqueue(user, goal.activity_id)?;
        Ok(goal)
    }

    /// Deletes one of `user`'s goals.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`].
    pub async fn delete_goal(&self, user: UserId, id: GoalId) -> Result<(), DomainError> {
        let store = self.store.get()?;
        self.get_goal(user, id).await?;
        if !store.delete_goal(id).await? {
            return Err(DomainError::not_found("Goal", id));
        }
        self.base.publish(&AppEvent::Goal(GoalEvent::Deleted {
            user_id: user,
            goal_id: id,
            timestamp: self.clock.now(),
        }));
        Ok(())
    }

    /// Current progress of one of `user`'s goals.
    ///
    /// Reaching 100% for the first time completes the goal and publishes
    /// `goal:achieved`.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`], or [`DomainError::InvalidTarget`] for a
    /// corrupt target.
    pub async fn goal_progress(&self, user: UserId, id: GoalId) -> Result<GoalProgress, DomainError> {
        let goal = self.get_goal(user, id).await?;
        self.tracker.get()?.evaluate(&goal).await
    }

    /// Waits until every recompute queued so far has finished.
    pub async fn settle(&self) {
        self.queue.settle().await;
    }

    fn enqueue(&self, user: UserId, activity: ActivityId) -> Result<(), DomainError> {
        self.jobs
            .get()?
            .send(RecomputeJob { user, activity })
            .map_err(|_| DomainError::NotReady(names::GOAL))
    }
}

fn validate_target(target: f64) -> Result<(), DomainError> {
    if target.is_finite() && target > 0.0 {
        Ok(())
    } else {
        Err(DomainError::InvalidTarget(target))
    }
}

fn validate_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), DomainError> {
    match end {
        Some(end) if end < start => Err(DomainError::Validation(format!(
            "end_date {end} is before start_date {start}"
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl Component for GoalComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    async fn on_init(&self) -> Result<(), ComponentError> {
        let database = self.base.require::<DatabaseComponent>(names::DATABASE)?;
        let activities = self.base.require::<ActivityComponent>(names::ACTIVITY)?;

        let tracker = GoalTracker {
            store: database.store(),
            bus: self.base.bus().clone(),
            clock: Arc::clone(&self.clock),
            offset: self.offset,
        };
        let worker = tracker.clone();
        let jobs = self.queue.start(self.base.reporter(), move |job| {
            let worker = worker.clone();
            async move { worker.recompute(job).await }
        });

        for kind in [EventKind::LogCreated, EventKind::LogUpdated] {
            let jobs = jobs.clone();
            self.base.subscribe(kind, move |event| match event {
                AppEvent::Log(
                    LogEvent::Created {
                        user_id,
                        activity_id,
                        ..
                    }
                    | LogEvent::Updated {
                        user_id,
                        activity_id,
                        ..
                    },
                ) => jobs.send(RecomputeJob {
                    user: *user_id,
                    activity: *activity_id,
                }),
                _ => Ok(()),
            });
        }

        self.store.set(database.store());
        self.activities.set(activities);
        self.tracker.set(Arc::new(tracker));
        self.jobs.set(Arc::new(jobs));
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), ComponentError> {
        self.jobs.clear();
        self.queue.stop().await;
        self.tracker.clear();
        self.activities.clear();
        self.store.clear();
        Ok(())
    }
}
