//! Health monitor
//!
//! Runs healing cycles on a schedule and on request, and serves the control
//! operations behind the HTTP surface.
//!
//! A cycle scans the source tree and introspects the database concurrently,
//! then infers, detects, reconciles and plans fixes. Its outputs (snapshot,
//! issues, fixes) are published together under one lock at the end; a failed
//! or cancelled cycle publishes nothing. Safe fixes are applied afterwards
//! when auto-apply is enabled.

use crate::applier::{ApplyError, FixApplier};
use crate::drift_detector::DriftDetector;
use crate::reconcile::reconcile;
use crate::store::{IssueStore, StoreError};
use crate::synthesizer::{FixSynthesizer, SynthesisError};
use crate::validator::{Approval, FixValidator, ValidatedFix, ValidationError};
use chrono::{DateTime, Utc};
use schemaheal_catalog::{Backoff, CatalogAdapter, IntrospectionError, SchemaIntrospector};
use schemaheal_core::{Config, CycleOutcome, CycleReport, Fix, FixExecution, Issue, IssueStatus, SchemaSnapshot};
use schemaheal_sql::{ScanError, SourceScanner, TypeInferencer};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Where the monitor is in its cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorState {
    #[default]
    Idle,
    Scanning,
    Analyzing,
    Healthy,
    IssuesFound,
}

impl From<CycleOutcome> for MonitorState {
    fn from(outcome: CycleOutcome) -> Self {
        match outcome {
            CycleOutcome::Healthy => Self::Healthy,
            CycleOutcome::IssuesFound => Self::IssuesFound,
        }
    }
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Scanning => "SCANNING",
            Self::Analyzing => "ANALYZING",
            Self::Healthy => "HEALTHY",
            Self::IssuesFound => "ISSUES_FOUND",
        };
        write!(f, "{}", name)
    }
}

/// Point-in-time view of the monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,

    /// Result of the last published cycle, kept current as issues change
    pub last_outcome: Option<CycleOutcome>,

    /// A fix is being applied
    pub applying: bool,

    /// Scheduled cycles stopped after repeated failures
    pub paused: bool,

    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_cycle_id: Option<String>,
    pub last_error: Option<String>,
    pub issue_count: usize,
    pub auto_apply_enabled: bool,
    pub consecutive_failures: u32,
}

/// An issue as shown to operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,

    pub evidence_count: usize,
    pub justification: String,
    pub suggested_fix_preview: Option<String>,
}

/// Answer to a scan request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanTicket {
    pub cycle_id: String,

    /// The request joined a cycle that was already running
    pub already_running: bool,
}

/// Errors that fail a cycle
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("introspection failed: {0}")]
    Introspection(#[from] IntrospectionError),

    #[error("failed to persist issues: {0}")]
    Store(#[from] StoreError),

    #[error("cycle {0} is already running")]
    AlreadyRunning(String),

    #[error("cycle cancelled")]
    Cancelled,

    #[error("cycle task failed: {0}")]
    Task(String),
}

/// Errors from control operations
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("issue {0} not found")]
    IssueNotFound(String),

    #[error("issue {id} is {state}")]
    IssueClosed { id: String, state: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("monitor paused after {0} consecutive failed cycles")]
    Paused(u32),
}

/// Outcome of planning a fix for one issue
enum Plan {
    Ready(ValidatedFix),
    NeedsApproval(Fix),
    Rejected(MonitorError),
}

#[derive(Default)]
struct Published {
    state: MonitorState,
    outcome: Option<CycleOutcome>,

    issues: BTreeMap<String, Issue>,
    fixes: HashMap<String, Fix>,
    last_cycle_at: Option<DateTime<Utc>>,
    last_cycle_id: Option<String>,
    last_error: Option<String>,
    last_report: Option<CycleReport>,
}

impl Published {
    fn open_issues(&self) -> usize {
        self.issues.values().filter(|i| i.is_open()).count()
    }

    fn current_outcome(&self) -> CycleOutcome {
        if self.open_issues() == 0 {
            CycleOutcome::Healthy
        } else {
            CycleOutcome::IssuesFound
        }
    }

    /// Enter HEALTHY or ISSUES_FOUND for the cycle just published
    fn conclude(&mut self) {
        let outcome = self.current_outcome();
        self.outcome = Some(outcome);
        self.state = outcome.into();
    }

    /// Back to IDLE, keeping the outcome for status queries
    fn settle(&mut self) {
        if self.outcome.is_some() {
            self.outcome = Some(self.current_outcome());
        }
        self.state = MonitorState::Idle;
    }

    /// Refresh the outcome after an issue changed outside a cycle's publish step
    fn refresh_outcome(&mut self) {
        if self.outcome.is_none() {
            return;
        }
        let outcome = self.current_outcome();
        self.outcome = Some(outcome);
        if matches!(self.state, MonitorState::Healthy | MonitorState::IssuesFound) {
            self.state = outcome.into();
        }
    }
}

struct Inner {
    source_root: PathBuf,
    scanner: Arc<SourceScanner>,
    inferencer: TypeInferencer,
    introspector: SchemaIntrospector,
    detector: DriftDetector,
    synthesizer: FixSynthesizer,
    validator: FixValidator,
    applier: FixApplier,
    store: Arc<dyn IssueStore>,
    backoff: Backoff,
    interval: Duration,
    retry_ceiling: u32,

    auto_apply: AtomicBool,
    paused: AtomicBool,
    applying: AtomicUsize,
    consecutive_failures: AtomicU32,

    /// Id of the cycle in flight
    running: Mutex<Option<String>>,
    published: Mutex<Published>,
    wake: Notify,
    shutdown: CancellationToken,
}

/// Clears the running slot when the cycle ends, however it ends
struct RunningCycle {
    inner: Arc<Inner>,
    id: String,
}

impl Drop for RunningCycle {
    fn drop(&mut self) {
        *lock(&self.inner.running) = None;
    }
}

struct ApplyingGuard<'a>(&'a AtomicUsize);

impl<'a> ApplyingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ApplyingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Orchestrates healing cycles
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

impl HealthMonitor {
    /// Build a monitor and load persisted issues from `store`
    pub fn new(
        config: &Config,
        adapter: Arc<dyn CatalogAdapter>,
        store: Arc<dyn IssueStore>,
    ) -> Result<Self, MonitorError> {
        let persisted = store.load_issues()?;
        let timeout = Duration::from_secs(config.database.timeout_secs);

        let published = Published {
            issues: persisted.into_iter().map(|issue| (issue.id.clone(), issue)).collect(),
            ..Default::default()
        };
        tracing::info!(issues = published.issues.len(), "loaded persisted issues");

        let inner = Inner {
            source_root: config.source_path(),
            scanner: Arc::new(SourceScanner::from_config(config)),
            inferencer: TypeInferencer::from_config(&config.inference),
            introspector: SchemaIntrospector::from_config(Arc::clone(&adapter), &config.database),
            detector: DriftDetector::from_config(&config.inference, &config.scanner),
            synthesizer: FixSynthesizer::new(),
            validator: FixValidator::from_config(&config.inference),
            applier: FixApplier::new(adapter, Arc::clone(&store), timeout),
            store,
            backoff: Backoff::from_config(&config.monitor),
            interval: Duration::from_secs(config.monitor.interval_secs),
            retry_ceiling: config.monitor.retry_ceiling.max(1),
            auto_apply: AtomicBool::new(config.monitor.auto_apply),
            paused: AtomicBool::new(false),
            applying: AtomicUsize::new(0),
            consecutive_failures: AtomicU32::new(0),
            running: Mutex::new(None),
            published: Mutex::new(published),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
        };

        Ok(Self { inner: Arc::new(inner) })
    }

    pub fn status(&self) -> MonitorStatus {
        let published = lock(&self.inner.published);
        MonitorStatus {
            state: published.state,
            last_outcome: published.outcome,
            applying: self.inner.applying.load(Ordering::SeqCst) > 0,
            paused: self.is_paused(),
            last_cycle_at: published.last_cycle_at,
            last_cycle_id: published.last_cycle_id.clone(),
            last_error: published.last_error.clone(),
            issue_count: published.open_issues(),
            auto_apply_enabled: self.auto_apply_enabled(),
            consecutive_failures: self.consecutive_failures(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn auto_apply_enabled(&self) -> bool {
        self.inner.auto_apply.load(Ordering::SeqCst)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Enable or disable auto-apply, returning the new setting
    pub fn set_auto_apply(&self, enabled: bool) -> bool {
        self.inner.auto_apply.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "auto-apply changed");
        enabled
    }

    /// Clear a pause and schedule a cycle right away
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.consecutive_failures.store(0, Ordering::SeqCst);
        self.inner.wake.notify_one();
        tracing::info!("monitor resumed");
    }

    /// Cancel the run loop and any cycle in flight
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> Option<Arc<SchemaSnapshot>> {
        self.inner.introspector.current()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        lock(&self.inner.published).last_report.clone()
    }

    /// Issues with their suggested fixes; open issues only unless `all`
    pub fn issues(&self, all: bool) -> Vec<IssueView> {
        let published = lock(&self.inner.published);
        let now = Utc::now();

        published
            .issues
            .values()
            .filter(|issue| all || issue.is_open())
            .map(|issue| {
                let suggested_fix_preview = if issue.is_open() && issue.status != IssueStatus::Rejected {
                    published
                        .fixes
                        .get(&issue.id)
                        .map(|fix| fix.preview.clone())
                        .or_else(|| self.preview(issue, now).ok().map(|fix| fix.preview))
                } else {
                    None
                };

                IssueView {
                    evidence_count: issue.evidence.count,
                    justification: issue.justification(),
                    suggested_fix_preview,
                    issue: issue.clone(),
                }
            })
            .collect()
    }

    /// Audit log, oldest first
    pub fn executions(&self) -> Result<Vec<FixExecution>, MonitorError> {
        Ok(self.inner.store.load_executions()?)
    }

    /// Dry-run DDL for an open issue; executes nothing
    pub fn preview_fix(&self, issue_id: &str) -> Result<Fix, MonitorError> {
        let issue = self.open_issue(issue_id)?;
        self.preview(&issue, Utc::now())
    }

    /// Validate and apply the fix for one issue.
    ///
    /// A failed execution is still returned as `Ok` with `success == false`;
    /// the issue goes back to pending with the error recorded.
    #[tracing::instrument(skip(self))]
    pub async fn apply_fix(&self, issue_id: &str, approved: bool) -> Result<FixExecution, MonitorError> {
        let issue = self.open_issue(issue_id)?;
        let approval = if approved { Approval::Manual } else { Approval::Automatic };

        let validated = match self.plan(&issue, approval, Utc::now()) {
            Plan::Ready(validated) => validated,
            Plan::NeedsApproval(_) => return Err(ValidationError::ApprovalRequired.into()),
            Plan::Rejected(error) => {
                let reason = error.to_string();
                tracing::warn!(issue_id, %reason, "fix rejected");
                self.update_issue(issue_id, |issue| issue.mark_rejected(reason))?;
                return Err(error);
            }
        };

        if approved {
            self.update_issue(issue_id, |issue| issue.status = IssueStatus::Approved)?;
        }

        self.execute_fix(validated).await
    }

    /// Request a cycle in the background.
    ///
    /// While a cycle runs, the request joins it and gets its id back.
    pub fn trigger_scan(&self) -> Result<ScanTicket, MonitorError> {
        if self.is_paused() {
            return Err(MonitorError::Paused(self.consecutive_failures()));
        }

        match self.begin_cycle() {
            Err(cycle_id) => Ok(ScanTicket {
                cycle_id,
                already_running: true,
            }),
            Ok(running) => {
                let cycle_id = running.id.clone();
                let monitor = self.clone();
                tokio::spawn(async move {
                    if let Err(error) = monitor.execute(running).await {
                        tracing::debug!(%error, "requested cycle ended without a report");
                    }
                });
                Ok(ScanTicket {
                    cycle_id,
                    already_running: false,
                })
            }
        }
    }

    /// Run one cycle to completion
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        match self.begin_cycle() {
            Ok(running) => self.execute(running).await,
            Err(cycle_id) => Err(CycleError::AlreadyRunning(cycle_id)),
        }
    }

    /// Scheduling loop.
    ///
    /// Runs a cycle immediately, then every interval. After a failure the
    /// next attempt waits for the backoff delay instead; at the retry ceiling
    /// the loop pauses until [`resume`](Self::resume) or shutdown.
    pub async fn run(&self) {
        let mut delay = Duration::ZERO;

        loop {
            if self.is_paused() {
                tokio::select! {
                    _ = self.inner.shutdown.cancelled() => break,
                    _ = self.inner.wake.notified() => {
                        delay = Duration::ZERO;
                        continue;
                    }
                }
            }

            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                _ = self.inner.wake.notified() => {}
                _ = tokio::time::sleep(delay) => {}
            }

            if self.is_paused() {
                continue;
            }

            delay = match self.run_cycle().await {
                Ok(_) | Err(CycleError::AlreadyRunning(_)) => self.inner.interval,
                Err(CycleError::Cancelled) => break,
                Err(_) => self.inner.backoff.delay(self.consecutive_failures()),
            };
        }

        tracing::info!("monitor stopped");
    }

    fn begin_cycle(&self) -> Result<RunningCycle, String> {
        let mut running = lock(&self.inner.running);
        if let Some(id) = running.as_ref() {
            return Err(id.clone());
        }

        let id = uuid::Uuid::new_v4().to_string();
        *running = Some(id.clone());
        Ok(RunningCycle {
            inner: Arc::clone(&self.inner),
            id,
        })
    }

    async fn execute(&self, running: RunningCycle) -> Result<CycleReport, CycleError> {
        let cancel = self.inner.shutdown.child_token();
        let result = self.cycle(&running.id, &cancel).await;

        match &result {
            Ok(report) => {
                self.inner.consecutive_failures.store(0, Ordering::SeqCst);
                tracing::info!(
                    cycle_id = %running.id,
                    issues = report.summary.total,
                    applied = report.executions.iter().filter(|e| e.success).count(),
                    "cycle finished"
                );
            }
            Err(error) => self.record_failure(&running.id, error),
        }

        result
    }

    fn record_failure(&self, cycle_id: &str, error: &CycleError) {
        let mut published = lock(&self.inner.published);
        published.settle();

        if matches!(error, CycleError::Cancelled) {
            tracing::info!(cycle_id, "cycle cancelled");
            return;
        }

        published.last_error = Some(error.to_string());
        let failures = self.inner.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;

        if failures >= self.inner.retry_ceiling {
            self.inner.paused.store(true, Ordering::SeqCst);
            tracing::error!(cycle_id, failures, %error, "cycle failed, monitor paused");
        } else {
            tracing::warn!(
                cycle_id,
                failures,
                %error,
                retry_in = ?self.inner.backoff.delay(failures),
                "cycle failed"
            );
        }
    }

    #[tracing::instrument(skip(self, cancel))]
    async fn cycle(&self, cycle_id: &str, cancel: &CancellationToken) -> Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        self.set_state(MonitorState::Scanning);

        let scanner = Arc::clone(&self.inner.scanner);
        let root = self.inner.source_root.clone();
        let scan_cancel = cancel.clone();
        let scan = tokio::task::spawn_blocking(move || scanner.scan(&root, &scan_cancel));

        let (scanned, captured) = tokio::join!(scan, self.inner.introspector.capture(cancel));
        let scanned = scanned.map_err(|e| CycleError::Task(e.to_string()))?;
        let scanned = match scanned {
            Err(ScanError::Cancelled) => return Err(CycleError::Cancelled),
            other => other?,
        };
        let snapshot = match captured {
            Err(IntrospectionError::Cancelled) => return Err(CycleError::Cancelled),
            other => Arc::new(other?),
        };

        self.set_state(MonitorState::Analyzing);
        let inferred = self.inner.inferencer.infer(&scanned.statements);
        let now = Utc::now();
        let detected = self.inner.detector.detect(&inferred, &snapshot, now);

        if cancel.is_cancelled() {
            return Err(CycleError::Cancelled);
        }

        let to_apply = self.publish(cycle_id, detected, snapshot, now)?;
        let executions = self.apply_all(to_apply).await;

        let mut published = lock(&self.inner.published);
        let issues: Vec<Issue> = published.issues.values().cloned().collect();
        let report = CycleReport::new(cycle_id, started_at, issues)
            .with_conflicts(inferred.conflicts())
            .with_scan_stats(
                scanned.files_scanned,
                scanned.statements.len(),
                scanned.errors.iter().map(|e| e.to_string()).collect(),
            )
            .with_executions(executions);

        published.settle();
        published.last_report = Some(report.clone());
        Ok(report)
    }

    /// Reconcile, plan fixes and publish everything in one step.
    ///
    /// Returns the fixes to apply automatically.
    fn publish(
        &self,
        cycle_id: &str,
        detected: Vec<Issue>,
        snapshot: Arc<SchemaSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ValidatedFix>, CycleError> {
        let auto_apply = self.auto_apply_enabled();
        let mut published = lock(&self.inner.published);

        let mut issues = reconcile(&published.issues, detected, now);
        let mut fixes = HashMap::new();
        let mut to_apply = Vec::new();

        for issue in issues.values_mut() {
            if !issue.is_open() || issue.status == IssueStatus::Rejected {
                continue;
            }

            match self.plan(issue, Approval::Automatic, now) {
                Plan::Ready(validated) => {
                    fixes.insert(issue.id.clone(), validated.fix().clone());
                    if auto_apply && validated.is_safe_to_auto_apply() {
                        to_apply.push(validated);
                    }
                }
                Plan::NeedsApproval(fix) => {
                    fixes.insert(issue.id.clone(), fix);
                }
                Plan::Rejected(error) => {
                    tracing::warn!(issue_id = %issue.id, target = %issue.target(), %error, "issue rejected");
                    issue.mark_rejected(error.to_string());
                }
            }
        }

        let records: Vec<Issue> = issues.values().cloned().collect();
        self.inner.store.save_issues(&records)?;

        published.issues = issues;
        published.fixes = fixes;
        published.last_cycle_at = Some(now);
        published.last_cycle_id = Some(cycle_id.to_string());
        published.last_error = None;
        published.conclude();
        self.inner.introspector.publish(snapshot);

        Ok(to_apply)
    }

    async fn apply_all(&self, fixes: Vec<ValidatedFix>) -> Vec<FixExecution> {
        let mut tasks = JoinSet::new();
        for validated in fixes {
            let monitor = self.clone();
            tasks.spawn(async move { monitor.execute_fix(validated).await });
        }

        let mut executions = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(execution)) => executions.push(execution),
                Ok(Err(error)) => tracing::error!(%error, "auto-apply failed"),
                Err(error) => tracing::error!(%error, "auto-apply task failed"),
            }
        }
        executions.sort_by(|a, b| a.applied_at.cmp(&b.applied_at));
        executions
    }

    async fn execute_fix(&self, validated: ValidatedFix) -> Result<FixExecution, MonitorError> {
        let issue_id = validated.fix().issue_id.clone();
        let _applying = ApplyingGuard::new(&self.inner.applying);

        match self.inner.applier.apply(validated).await {
            Ok(execution) => {
                self.update_issue(&issue_id, Issue::mark_applied)?;
                Ok(execution)
            }
            Err(ApplyError::Execution { execution, .. }) => {
                let message = execution.error_message.clone().unwrap_or_default();
                self.update_issue(&issue_id, |issue| issue.mark_failed(message))?;
                Ok(*execution)
            }
            Err(ApplyError::Audit(error)) => Err(error.into()),
        }
    }

    fn plan(&self, issue: &Issue, approval: Approval, now: DateTime<Utc>) -> Plan {
        if let Err(error) = self.inner.validator.screen(issue) {
            return Plan::Rejected(error.into());
        }

        let fix = match self.inner.synthesizer.synthesize(issue, now) {
            Ok(fix) => fix,
            Err(error) => return Plan::Rejected(error.into()),
        };

        match self.inner.validator.validate(issue, fix.clone(), approval) {
            Ok(validated) => Plan::Ready(validated),
            Err(ValidationError::ApprovalRequired) => Plan::NeedsApproval(fix),
            Err(error) => Plan::Rejected(error.into()),
        }
    }

    fn preview(&self, issue: &Issue, now: DateTime<Utc>) -> Result<Fix, MonitorError> {
        self.inner.validator.screen(issue)?;
        Ok(self.inner.synthesizer.synthesize(issue, now)?)
    }

    fn open_issue(&self, issue_id: &str) -> Result<Issue, MonitorError> {
        let published = lock(&self.inner.published);
        let issue = published
            .issues
            .get(issue_id)
            .ok_or_else(|| MonitorError::IssueNotFound(issue_id.to_string()))?;

        if !issue.is_open() {
            let state = if issue.resolved_at.is_some() {
                "resolved".to_string()
            } else {
                issue.status.to_string()
            };
            return Err(MonitorError::IssueClosed {
                id: issue.id.clone(),
                state,
            });
        }
        Ok(issue.clone())
    }

    /// Mutate one issue and persist the whole record set
    fn update_issue(&self, issue_id: &str, update: impl FnOnce(&mut Issue)) -> Result<(), StoreError> {
        let mut published = lock(&self.inner.published);
        if let Some(issue) = published.issues.get_mut(issue_id) {
            update(issue);
        }

        let records: Vec<Issue> = published.issues.values().cloned().collect();
        self.inner.store.save_issues(&records)?;

        published.refresh_outcome();
        Ok(())
    }

    fn set_state(&self, state: MonitorState) {
        lock(&self.inner.published).state = state;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
