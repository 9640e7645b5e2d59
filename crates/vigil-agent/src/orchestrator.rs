// SPDX-License-Identifier: Apache-2.0

//! The audit cycle: `Idle → Balancing → Verifying → Pruning → Recording → Idle`.
//!
//! A stage error skips the remaining stages and goes straight to Recording
//! with the error attached. Every cycle is recorded, persisted and alerted,
//! and no cycle outcome stops the loop.

use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};
use vigil_core::{human_readable_size, throughput_mbps, AuditError, ErrorCode};
use vigil_model::{CycleResult, IntegrityState};

use crate::deletion::wipe_namespace;
use crate::state_store::StateStore;
use crate::{alerts, balancer, pruner, verifier, ServiceContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Balancing,
    Verifying,
    Pruning,
    Recording,
}

impl CyclePhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Balancing => "balancing",
            Self::Verifying => "verifying",
            Self::Pruning => "pruning",
            Self::Recording => "recording",
        }
    }
}

/// Counters accumulated across the stages of one cycle.
#[derive(Debug, Default)]
struct Tally {
    uploaded: u64,
    upload_elapsed: Duration,
    downloaded: u64,
    download_elapsed: Duration,
    removed: u64,
    pruned: u64,
    prune_elapsed: Duration,
}

impl Tally {
    fn apply(&self, result: &mut CycleResult) {
        result.uploaded = human_readable_size(self.uploaded);
        result.downloaded = human_readable_size(self.downloaded);
        result.removed = human_readable_size(self.removed);
        result.pruned = human_readable_size(self.pruned);
        result.upload_speed_mbps = throughput_mbps(self.uploaded, self.upload_elapsed);
        result.download_speed_mbps = throughput_mbps(self.downloaded, self.download_elapsed);
        result.set_prune_elapsed(self.prune_elapsed);
    }
}

const MAX_POLL_PERIOD: Duration = Duration::from_secs(60);

/// A late tick must not push the next cycle back by a whole interval.
fn poll_period(check_interval: Duration) -> Duration {
    check_interval.min(MAX_POLL_PERIOD)
}

/// Tags a stage error. A non-critical error after some progress becomes a
/// `partial_failure` whose message keeps the original tag.
fn stage_error(err: AuditError, progressed: bool, what: &str) -> AuditError {
    if progressed && !err.code.is_critical() {
        AuditError::new(ErrorCode::PartialFailure, format!("{what}; {err}"))
    } else {
        err.context(what)
    }
}

pub struct CycleOrchestrator {
    ctx: ServiceContext,
    state_store: StateStore,
    state: IntegrityState,
    phase: CyclePhase,
}

impl CycleOrchestrator {
    /// Loads the persisted state once.
    pub async fn new(ctx: ServiceContext, state_store: StateStore) -> Result<Self, AuditError> {
        let state = state_store.load().await?;
        Ok(Self {
            ctx,
            state_store,
            state,
            phase: CyclePhase::Idle,
        })
    }

    #[must_use]
    pub fn state(&self) -> &IntegrityState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    #[must_use]
    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Wipes the remote namespace and resets the persisted state.
    pub async fn clean_start(&mut self) -> Result<(), AuditError> {
        info!(namespace = %self.ctx.namespace(), "clean start, wiping dataset");
        wipe_namespace(&self.ctx).await?;
        self.state = self.state_store.reset().await?;
        Ok(())
    }

    #[must_use]
    pub fn is_due(&self) -> bool {
        self.state
            .is_due(Utc::now(), self.ctx.config.check_interval())
    }

    /// Runs one full cycle and returns its recorded result.
    pub async fn run_cycle(&mut self) -> CycleResult {
        let mut result = CycleResult::started(Utc::now());
        let mut tally = Tally::default();
        info!("starting integrity cycle");

        let outcome = self.execute(&mut result, &mut tally).await;

        self.phase = CyclePhase::Recording;
        tally.apply(&mut result);
        result.ended_at = Utc::now();
        match outcome {
            Ok(()) => info!(
                uploaded = %result.uploaded,
                downloaded = %result.downloaded,
                removed = %result.removed,
                pruned = %result.pruned,
                prune_ms = result.prune_elapsed().as_millis() as u64,
                "integrity cycle succeeded"
            ),
            Err(e) => {
                error!(code = %e.code, error = %e, "integrity cycle failed");
                result.error = Some(e.into());
            }
        }

        self.state.record(result.clone());
        if let Err(e) = self.state_store.save(&self.state).await {
            error!(error = %e, "failed to persist state");
        }
        if let Err(e) = alerts::raise(&self.ctx, &result).await {
            error!(error = %e, "failed to register alert");
        }
        self.phase = CyclePhase::Idle;
        result
    }

    async fn execute(
        &mut self,
        result: &mut CycleResult,
        tally: &mut Tally,
    ) -> Result<(), AuditError> {
        let cfg = &self.ctx.config;

        self.phase = CyclePhase::Balancing;
        let started = Instant::now();
        let balanced = balancer::ensure(&self.ctx, cfg.dataset_size).await;
        tally.upload_elapsed = started.elapsed();
        match balanced {
            Ok(report) => {
                tally.uploaded = report.added;
                tally.removed = report.removed;
            }
            Err(failure) => {
                tally.uploaded = failure.completed.added;
                tally.removed = failure.completed.removed;
                return Err(stage_error(
                    failure.error,
                    failure.completed.made_progress(),
                    "failed to ensure dataset",
                ));
            }
        }
        result.dataset_complete = true;

        self.phase = CyclePhase::Verifying;
        let sample_size = cfg.download_sample_size();
        let started = Instant::now();
        let verified = verifier::verify(&self.ctx, sample_size).await;
        tally.download_elapsed = started.elapsed();
        match verified {
            Ok(report) => tally.downloaded = report.downloaded,
            Err(failure) => {
                tally.downloaded = failure.completed.downloaded;
                return Err(stage_error(
                    failure.error,
                    failure.completed.verified > 0,
                    "failed to check integrity of the dataset",
                ));
            }
        }

        self.phase = CyclePhase::Pruning;
        match pruner::prune(&self.ctx, cfg.delete_sample_size()).await {
            Ok(report) => {
                tally.removed += report.removed;
                tally.pruned = report.reclaimed;
                tally.prune_elapsed = report.elapsed;
                if let Some(e) = report.reclaim_error {
                    warn!(error = %e, "space reclamation incomplete");
                }
            }
            Err(failure) => {
                tally.removed += failure.completed.removed;
                tally.prune_elapsed = failure.completed.elapsed;
                return Err(stage_error(
                    failure.error,
                    failure.completed.removed_files > 0,
                    "failed to prune the dataset",
                ));
            }
        }
        Ok(())
    }

    /// Polls every `min(check interval, 60s)` and runs a cycle whenever one is
    /// due, until `shutdown` flips to true. The signal is only observed
    /// between cycles.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(poll_period(self.ctx.config.check_interval()));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }
            if self.is_due() {
                let result = self.run_cycle().await;
                if result.error.as_ref().is_some_and(|e| e.is_critical()) {
                    error!("integrity violation recorded");
                }
            }
        }
        info!(phase = self.phase.as_str(), "stopping agent loop");
    }
}
