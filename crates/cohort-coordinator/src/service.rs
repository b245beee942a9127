//! The coordinator: serialized write pipelines and cache-aside reads.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use cohort_bus::EventPublisher;
use cohort_cache::{RoundCache, populate, write_through};
use cohort_config::{CacheConfig, CoordinatorConfig};
use cohort_core::entities::{Member, Round, Study};
use cohort_core::enums::Stage;
use cohort_core::errors::RoundError;
use cohort_core::events::{
    EventEnvelope, TOPIC_ERROR, TOPIC_ROUND_CLOSED, TOPIC_ROUND_CREATED, TOPIC_ROUND_PROGRESS,
};
use cohort_db::{CohortDb, StoreTx};

use crate::error::CoordinatorError;
use crate::mutators::{RoundMutator, StudyMutator};
use crate::params::{UpdateParams, require};
use crate::validators::Validator;

/// Event produced by a committed round pipeline, published after the lock is
/// released.
#[derive(Debug, Clone)]
enum PendingEvent {
    Created(Round),
    Progress { from: Stage, round: Round },
    Closed(Round),
}

impl PendingEvent {
    fn detect(created: bool, stage_before: Stage, round: &Round) -> Vec<Self> {
        if created {
            return vec![Self::Created(round.clone())];
        }
        if round.stage == stage_before {
            return Vec::new();
        }
        let mut events = vec![Self::Progress {
            from: stage_before,
            round: round.clone(),
        }];
        if round.stage == Stage::Finished {
            events.push(Self::Closed(round.clone()));
        }
        events
    }
}

struct RoundChange {
    study: Study,
    round: Round,
    events: Vec<PendingEvent>,
}

/// Coordinates study and round state for every guild served by the process.
///
/// Writes go through a single process-wide lock, so commands commit in a
/// total order. Reads never take the lock.
pub struct Coordinator {
    db: CohortDb,
    cache: Arc<dyn RoundCache>,
    publisher: EventPublisher,
    cache_config: CacheConfig,
    config: CoordinatorConfig,
    write_lock: Mutex<()>,
    background: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(
        db: CohortDb,
        cache: Arc<dyn RoundCache>,
        publisher: EventPublisher,
        cache_config: CacheConfig,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            db,
            cache,
            publisher,
            cache_config,
            config,
            write_lock: Mutex::new(()),
            background: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub const fn db(&self) -> &CohortDb {
        &self.db
    }

    /// Wait up to `timeout` for detached cache writes and event publishes.
    ///
    /// Returns `false` if some were still running at the deadline; those keep
    /// running in the background.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let tasks = self
            .background
            .lock()
            .map(|mut tasks| std::mem::take(&mut *tasks))
            .unwrap_or_default();
        let deadline = Instant::now() + timeout;
        for task in tasks {
            if tokio::time::timeout_at(deadline, task).await.is_err() {
                tracing::warn!("background work still running at flush deadline");
                return false;
            }
        }
        true
    }

    fn track(&self, task: JoinHandle<()>) {
        if let Ok(mut tasks) = self.background.lock() {
            tasks.retain(|task| !task.is_finished());
            tasks.push(task);
        }
    }

    // -----------------------------------------------------------------------
    // Write pipelines
    // -----------------------------------------------------------------------

    /// Return the study for `guild_id`, creating it in `Wait` on first call.
    ///
    /// # Errors
    ///
    /// `InvalidUpdateParams` when either id is blank, or a store failure.
    pub async fn setup_study(
        &self,
        guild_id: &str,
        manager_id: &str,
    ) -> Result<Study, CoordinatorError> {
        require("guild_id", guild_id)?;
        require("manager_id", manager_id)?;

        let deadline = Instant::now() + self.config.command_timeout();
        let _guard = self.lock_until(deadline).await?;
        let result = self
            .db
            .exec_tx(
                self.commit_budget(deadline),
                async |tx: &StoreTx| -> Result<Study, CoordinatorError> {
                    if let Some(existing) = tx.find_study(guild_id).await? {
                        return Ok(existing);
                    }
                    let study = tx.create_study(Study::new(guild_id, manager_id)).await?;
                    tracing::info!(guild_id, study_id = %study.id, "study created");
                    Ok(study)
                },
            )
            .await;
        self.report_if_infrastructure("setup_study", guild_id, result)
    }

    /// Run a round command: validate, mutate, persist, then cache and publish.
    ///
    /// # Errors
    ///
    /// The first validator or mutator rejection, `StudyNotFound`, `Timeout`
    /// when the command deadline passes, or a store failure. Nothing is
    /// persisted on error.
    pub async fn update_round(
        &self,
        params: &UpdateParams,
        mutator: RoundMutator,
        validators: &[Validator],
    ) -> Result<(Study, Round), CoordinatorError> {
        let result = self.run_round_pipeline(params, mutator, validators).await;
        let change = self.report_if_infrastructure("update_round", &params.guild_id, result)?;
        self.after_commit(&change);
        Ok((change.study, change.round))
    }

    /// Run a study-level command. No events are published.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::update_round`].
    pub async fn update_study(
        &self,
        params: &UpdateParams,
        mutator: StudyMutator,
        validators: &[Validator],
    ) -> Result<Study, CoordinatorError> {
        let deadline = Instant::now() + self.config.command_timeout();
        let result = match self.lock_until(deadline).await {
            Ok(_guard) => {
                self.db
                    .exec_tx(
                        self.commit_budget(deadline),
                        async |tx: &StoreTx| -> Result<Study, CoordinatorError> {
                            let mut study = load_study(tx, &params.guild_id).await?;
                            for validate in validators {
                                validate(&study, None, params)?;
                            }
                            let before = study.clone();
                            mutator(&mut study, params)?;
                            if study == before {
                                return Ok(study);
                            }
                            Ok(tx.update_study(study).await?)
                        },
                    )
                    .await
            }
            Err(err) => Err(err),
        };
        self.report_if_infrastructure("update_study", &params.guild_id, result)
    }

    /// Open a new round for the guild.
    ///
    /// # Errors
    ///
    /// `NotManager`, `RoundAlreadySet`, or any pipeline error.
    pub async fn new_study_round(
        &self,
        params: &UpdateParams,
    ) -> Result<(Study, Round), CoordinatorError> {
        self.update_round(
            params,
            crate::mutators::new_study_round,
            &[
                crate::validators::validate_to_check_manager,
                crate::validators::validate_to_check_no_ongoing_round,
            ],
        )
        .await
    }

    async fn run_round_pipeline(
        &self,
        params: &UpdateParams,
        mutator: RoundMutator,
        validators: &[Validator],
    ) -> Result<RoundChange, CoordinatorError> {
        let deadline = Instant::now() + self.config.command_timeout();
        let _guard = self.lock_until(deadline).await?;

        self.db
            .exec_tx(
                self.commit_budget(deadline),
                async |tx: &StoreTx| -> Result<RoundChange, CoordinatorError> {
                    let mut study = load_study(tx, &params.guild_id).await?;
                    let mut round = if study.has_ongoing_round() {
                        tx.find_round(&study.ongoing_round_id).await?
                    } else {
                        None
                    };

                    for validate in validators {
                        validate(&study, round.as_ref(), params)?;
                    }

                    let study_before = study.clone();
                    let round_before = round.clone();
                    let stage_before = round.as_ref().map_or(study.current_stage, |r| r.stage);
                    mutator(&mut study, &mut round, params)?;

                    let mut round = round.ok_or(RoundError::RoundNotFound)?;
                    let created = round.id.is_empty();
                    if created {
                        round = tx.create_round(round).await?;
                        study.ongoing_round_id.clone_from(&round.id);
                        tracing::info!(
                            guild_id = %study.guild_id,
                            round_id = %round.id,
                            number = round.number,
                            "round created"
                        );
                    } else if round_before.as_ref() != Some(&round) {
                        round = tx.update_round(round).await?;
                    }
                    if study != study_before {
                        study = tx.update_study(study).await?;
                    }

                    let events = PendingEvent::detect(created, stage_before, &round);
                    Ok(RoundChange {
                        study,
                        round,
                        events,
                    })
                },
            )
            .await
    }

    async fn lock_until(
        &self,
        deadline: Instant,
    ) -> Result<tokio::sync::MutexGuard<'_, ()>, CoordinatorError> {
        tokio::time::timeout_at(deadline, self.write_lock.lock())
            .await
            .map_err(|_| {
                tracing::warn!("timed out waiting for the write lock");
                CoordinatorError::Round(RoundError::Timeout)
            })
    }

    /// Transaction time left before `deadline`, capped at the commit timeout.
    fn commit_budget(&self, deadline: Instant) -> std::time::Duration {
        self.config
            .commit_timeout()
            .min(deadline.saturating_duration_since(Instant::now()))
    }

    /// Pass `result` through, publishing a `study.error` envelope first when
    /// it is an infrastructure failure.
    fn report_if_infrastructure<T>(
        &self,
        operation: &str,
        guild_id: &str,
        result: Result<T, CoordinatorError>,
    ) -> Result<T, CoordinatorError> {
        if let Err(err) = &result {
            if err.is_infrastructure() {
                tracing::error!(error = %err, operation, guild_id, "command pipeline failed");
                let envelope = EventEnvelope::new(
                    TOPIC_ERROR,
                    format!("{operation} failed for guild {guild_id}: {err}"),
                );
                self.track(self.publisher.publish_detached(TOPIC_ERROR, envelope));
            } else {
                tracing::debug!(error = %err, operation, guild_id, "command rejected");
            }
        }
        result
    }

    /// Detached post-commit work: cache write-through and event publication.
    fn after_commit(&self, change: &RoundChange) {
        let cache = Arc::clone(&self.cache);
        let key = change.round.guild_id.clone();
        let round = change.round.clone();
        let ttl = self.cache_config.ttl();
        let deadline = self.cache_config.write_timeout();
        self.track(tokio::spawn(async move {
            write_through(cache.as_ref(), &key, &round, ttl, deadline).await;
        }));

        if change.events.is_empty() {
            return;
        }
        let publisher = self.publisher.clone();
        let events = change.events.clone();
        self.track(tokio::spawn(async move {
            for event in events {
                // Failures are logged and reported by the publisher.
                let _ = match event {
                    PendingEvent::Created(round) => match serde_json::to_vec(&round) {
                        Ok(data) => {
                            let description = format!("{} 라운드: {}", round.number, round.title);
                            let envelope = EventEnvelope::new(TOPIC_ROUND_CREATED, description)
                                .with_data(data);
                            publisher.publish(TOPIC_ROUND_CREATED, &envelope).await
                        }
                        Err(error) => {
                            tracing::error!(%error, "failed to encode created round");
                            continue;
                        }
                    },
                    PendingEvent::Progress { from, round } => {
                        let description = format!(
                            "{} 라운드: {} -> {}",
                            round.number,
                            from.label(),
                            round.stage.label()
                        );
                        let envelope = EventEnvelope::new(TOPIC_ROUND_PROGRESS, description);
                        publisher.publish(TOPIC_ROUND_PROGRESS, &envelope).await
                    }
                    PendingEvent::Closed(round) => {
                        publisher.publish(TOPIC_ROUND_CLOSED, &round).await
                    }
                };
            }
        }));
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// `StudyNotFound` when the guild has no study.
    pub async fn get_study(&self, guild_id: &str) -> Result<Study, CoordinatorError> {
        self.db
            .find_study(guild_id)
            .await?
            .ok_or_else(|| study_not_found(guild_id))
    }

    /// The ongoing round of a guild, served from the cache when possible.
    ///
    /// On a miss the round is read from the store and written to the cache
    /// within the populate deadline, unless a commit has cached a newer
    /// round in the meantime.
    ///
    /// # Errors
    ///
    /// `StudyNotFound`, or `RoundNotFound` when no round is in progress.
    pub async fn get_ongoing_round(&self, guild_id: &str) -> Result<Round, CoordinatorError> {
        let study = self.get_study(guild_id).await?;
        if !study.has_ongoing_round() {
            return Err(RoundError::RoundNotFound.into());
        }

        if let Some(cached) = self.cached_round(guild_id).await {
            if cached.id == study.ongoing_round_id {
                return Ok(cached);
            }
        }

        let round = self
            .db
            .find_round(&study.ongoing_round_id)
            .await?
            .filter(|round| round.guild_id == study.guild_id)
            .ok_or(RoundError::RoundNotFound)?;
        populate(
            self.cache.as_ref(),
            guild_id,
            &round,
            self.cache_config.ttl(),
            self.cache_config.populate_timeout(),
        )
        .await;
        Ok(round)
    }

    async fn cached_round(&self, guild_id: &str) -> Option<Round> {
        match self.cache.exists(guild_id).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(error) => {
                tracing::warn!(%error, guild_id, "cache lookup failed");
                return None;
            }
        }
        match self.cache.get(guild_id).await {
            Ok(round) => round,
            Err(error) => {
                tracing::warn!(%error, guild_id, "cache read failed");
                None
            }
        }
    }

    /// # Errors
    ///
    /// `RoundNotFound` when no round has `round_id`.
    pub async fn get_round(&self, round_id: &str) -> Result<Round, CoordinatorError> {
        self.db
            .find_round(round_id)
            .await?
            .ok_or_else(|| RoundError::RoundNotFound.into())
    }

    /// All rounds of a guild, newest first.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn get_rounds(&self, guild_id: &str) -> Result<Vec<Round>, CoordinatorError> {
        Ok(self.db.find_rounds(guild_id).await?)
    }

    /// Registered members of the ongoing round, by member id.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::get_ongoing_round`].
    pub async fn get_speakers(
        &self,
        guild_id: &str,
    ) -> Result<Vec<(String, Member)>, CoordinatorError> {
        let round = self.get_ongoing_round(guild_id).await?;
        Ok(round
            .speakers()
            .map(|(id, member)| (id.clone(), member.clone()))
            .collect())
    }

    /// # Errors
    ///
    /// `MemberNotFound` when the member is not part of the ongoing round, or
    /// any error of [`Coordinator::get_ongoing_round`].
    pub async fn get_member(
        &self,
        guild_id: &str,
        member_id: &str,
    ) -> Result<Member, CoordinatorError> {
        let round = self.get_ongoing_round(guild_id).await?;
        round.get_member(member_id).cloned().ok_or_else(|| {
            RoundError::MemberNotFound {
                member_id: member_id.to_string(),
            }
            .into()
        })
    }
}

async fn load_study(tx: &StoreTx, guild_id: &str) -> Result<Study, CoordinatorError> {
    tx.find_study(guild_id)
        .await?
        .ok_or_else(|| study_not_found(guild_id))
}

fn study_not_found(guild_id: &str) -> CoordinatorError {
    RoundError::StudyNotFound {
        guild_id: guild_id.to_string(),
    }
    .into()
}
