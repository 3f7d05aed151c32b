// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::settings::SchedulerConfig;
use crate::domain::models::check_outcome::CheckOutcome;
use crate::domain::models::lifecycle::Lifecycle;
use crate::domain::models::source::Source;
use crate::domain::services::result_applier::ResultApplier;
use crate::domain::services::source_registry::SourceRegistry;
use crate::queue::in_flight::{InFlightGuard, InFlightSet};
use crate::utils::clock::Clock;
use crate::utils::errors::DomainError;
use crate::workers::check_executor::CheckExecutor;

/// 调度器状态：`Stopped → Running → Draining → Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Draining,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchedulerState::Stopped => write!(f, "stopped"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Draining => write!(f, "draining"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    /// 基础设施错误导致轮询停止，需要运维介入，调度器不会自行重启
    #[error("Scheduler halted: {0}")]
    Fatal(#[source] Arc<DomainError>),

    /// 当前状态不允许该操作
    #[error("Operation not allowed while scheduler is {0}")]
    InvalidState(SchedulerState),

    /// 手动检查时的领域错误
    #[error(transparent)]
    Domain(Arc<DomainError>),
}

impl From<DomainError> for SchedulerError {
    fn from(err: DomainError) -> Self {
        SchedulerError::Domain(Arc::new(err))
    }
}

/// 调度器依赖的组件
pub struct SchedulerComponents {
    pub registry: Arc<SourceRegistry>,
    pub executor: Arc<CheckExecutor>,
    pub applier: Arc<ResultApplier>,
    pub clock: Arc<dyn Clock>,
}

struct SchedulerInner {
    config: SchedulerConfig,
    registry: Arc<SourceRegistry>,
    executor: Arc<CheckExecutor>,
    applier: Arc<ResultApplier>,
    clock: Arc<dyn Clock>,
    in_flight: InFlightSet,
    permits: Arc<Semaphore>,
    state: watch::Sender<SchedulerState>,
    fatal: Mutex<Option<SchedulerError>>,
    /// 当前（或下一次）运行的检查取消令牌，排空结束后替换为新令牌
    cancel_checks: Mutex<CancellationToken>,
    /// 正在进行的手动检查数
    manual_checks: watch::Sender<usize>,
}

/// 手动检查计数凭证
struct ManualCheckGuard<'a> {
    count: &'a watch::Sender<usize>,
}

impl<'a> ManualCheckGuard<'a> {
    fn new(count: &'a watch::Sender<usize>) -> Self {
        count.send_modify(|n| *n += 1);
        Self { count }
    }
}

impl Drop for ManualCheckGuard<'_> {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}

struct RunHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// 来源监视调度器
///
/// 以固定轮询间隔扫描到期来源，并在至多 K 个并发检查的约束下分派检查任务。
/// 每个来源同一时间至多一个在途检查；每个完成的检查恰好调用一次 `mark_checked`。
pub struct WatchScheduler {
    inner: Arc<SchedulerInner>,
    run: Mutex<Option<RunHandle>>,
}

impl WatchScheduler {
    pub fn new(config: SchedulerConfig, components: SchedulerComponents) -> Self {
        let (state, _) = watch::channel(SchedulerState::Stopped);
        let (manual_checks, _) = watch::channel(0);
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                registry: components.registry,
                executor: components.executor,
                applier: components.applier,
                clock: components.clock,
                in_flight: InFlightSet::new(),
                permits,
                state,
                fatal: Mutex::new(None),
                cancel_checks: Mutex::new(CancellationToken::new()),
                manual_checks,
            }),
            run: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.inner.state.borrow()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.inner.state.subscribe()
    }

    /// 当前在途的来源ID
    pub fn in_flight(&self) -> Vec<Uuid> {
        self.inner.in_flight.snapshot()
    }

    /// 启动轮询循环，只允许从 `Stopped` 启动
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut run = self.run.lock();
        let current = self.state();
        if current != SchedulerState::Stopped {
            return Err(SchedulerError::InvalidState(current));
        }

        *self.inner.fatal.lock() = None;
        self.inner.state.send_replace(SchedulerState::Running);

        let shutdown = CancellationToken::new();
        let inner = self.inner.clone();
        let token = shutdown.clone();
        let task = tokio::spawn(async move { inner.run(token).await });

        *run = Some(RunHandle { shutdown, task });
        Ok(())
    }

    /// 请求停机并等待排空完成
    ///
    /// 停止分派新检查，在宽限期内等待在途检查，超时后取消剩余检查
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let handle = self.run.lock().take();
        if let Some(handle) = handle {
            handle.shutdown.cancel();
            if let Err(e) = handle.task.await {
                error!("Scheduler task failed: {}", e);
            }
        }
        self.outcome()
    }

    /// 等待调度器回到 `Stopped`
    ///
    /// 因基础设施错误停止时返回 `SchedulerError::Fatal`
    pub async fn wait(&self) -> Result<(), SchedulerError> {
        let mut state = self.inner.state.subscribe();
        if state
            .wait_for(|state| *state == SchedulerState::Stopped)
            .await
            .is_err()
        {
            warn!("Scheduler state channel closed");
        }
        self.outcome()
    }

    /// 立即检查一个来源，不经过轮询
    ///
    /// 来源正在检查时返回 `Ok(None)`；占用一个并发名额。
    /// 停机排空期间拒绝新的手动检查，已开始的手动检查与轮询检查一同排空。
    pub async fn check_now(&self, id: Uuid) -> Result<Option<CheckOutcome>, SchedulerError> {
        // 先计数再检查状态，排空阶段总能看到已开始的手动检查
        let _manual = ManualCheckGuard::new(&self.inner.manual_checks);
        let current = self.state();
        if current == SchedulerState::Draining {
            return Err(SchedulerError::InvalidState(current));
        }
        let cancel = self.inner.cancel_checks.lock().child_token();

        let source = self
            .inner
            .registry
            .get(id)
            .await?
            .ok_or(DomainError::NotFound(id))?;

        let Some(guard) = self.inner.in_flight.try_acquire(id) else {
            debug!(source_id = %id, "Source already in flight, skipping manual check");
            return Ok(None);
        };
        let _permit = tokio::select! {
            permit = self.inner.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return Ok(None),
            },
            _ = cancel.cancelled() => return Ok(None),
        };

        let outcome = self.inner.run_check(source, guard, cancel).await;
        Ok(Some(outcome))
    }

    fn outcome(&self) -> Result<(), SchedulerError> {
        match self.inner.fatal.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl SchedulerInner {
    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let cancel_checks = self.cancel_checks.lock().clone();
        let mut checks = JoinSet::new();
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            poll_interval = ?self.config.poll_interval,
            max_concurrency = self.config.max_concurrency,
            "Watch scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no further checks will be dispatched");
                    break;
                }
                Some(joined) = checks.join_next(), if !checks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Check task failed: {}", e);
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(&mut checks, &cancel_checks).await {
                        error!(error = %e, "Failed to query due sources, halting scheduler");
                        *self.fatal.lock() = Some(SchedulerError::Fatal(Arc::new(e)));
                        break;
                    }
                }
            }
        }

        self.state.send_replace(SchedulerState::Draining);
        self.drain(&mut checks, &cancel_checks).await;
        *self.cancel_checks.lock() = CancellationToken::new();
        self.state.send_replace(SchedulerState::Stopped);
        info!("Watch scheduler stopped");
    }

    /// 一次轮询：取出到期来源并在空闲名额内分派
    async fn tick(
        self: &Arc<Self>,
        checks: &mut JoinSet<()>,
        cancel_checks: &CancellationToken,
    ) -> Result<(), DomainError> {
        let available = self.permits.available_permits();
        if available == 0 {
            debug!("All check slots busy, skipping tick");
            return Ok(());
        }

        let limit = u64::try_from(available)
            .unwrap_or(u64::MAX)
            .min(self.config.batch_limit);
        let exclude = self.in_flight.snapshot();
        let due = self
            .registry
            .due_sources(self.clock.now(), limit, &exclude)
            .await?;

        if !due.is_empty() {
            debug!(due = due.len(), in_flight = exclude.len(), "Dispatching due sources");
        }

        for source in due {
            let Some(guard) = self.in_flight.try_acquire(source.id()) else {
                continue;
            };
            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                break;
            };

            let inner = self.clone();
            let cancel = cancel_checks.clone();
            checks.spawn(async move {
                let _permit = permit;
                inner.run_check(source, guard, cancel).await;
            });
        }

        Ok(())
    }

    /// 完整的检查周期：检查、协调结果、记录调度字段
    ///
    /// 取消只中断检查本身，结果总会被记录
    #[instrument(skip_all, fields(source_id = %source.id()))]
    async fn run_check(
        &self,
        source: Source,
        _guard: InFlightGuard,
        cancel: CancellationToken,
    ) -> CheckOutcome {
        let outcome = tokio::select! {
            outcome = self.check_cycle(&source) => outcome,
            _ = cancel.cancelled() => {
                warn!("Check cancelled during shutdown");
                CheckOutcome::TransientFailure {
                    reason: "check cancelled during shutdown".to_string(),
                }
            }
        };

        let outcome = match self.applier.apply(&source, &outcome).await {
            Ok(_) => outcome,
            Err(e) => {
                warn!(error = %e, "Failed to apply check result");
                CheckOutcome::TransientFailure {
                    reason: format!("failed to apply check result: {}", e),
                }
            }
        };

        if let Err(e) = self.registry.mark_checked(&source, &outcome).await {
            warn!(error = %e, "Failed to record check outcome");
        }
        outcome
    }

    async fn check_cycle(&self, source: &Source) -> CheckOutcome {
        let previous_state = match self.applier.previous_state(source.id()).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Failed to load previous check state");
                None
            }
        };
        self.executor.check(source, previous_state).await
    }

    async fn drain(&self, checks: &mut JoinSet<()>, cancel_checks: &CancellationToken) {
        let manual = *self.manual_checks.borrow();
        if checks.is_empty() && manual == 0 {
            return;
        }

        let grace = self.config.drain_grace;
        info!(in_flight = checks.len(), manual, ?grace, "Draining in-flight checks");
        if timeout(grace, self.settle(checks)).await.is_ok() {
            return;
        }

        warn!(remaining = checks.len(), "Drain grace period elapsed, cancelling in-flight checks");
        cancel_checks.cancel();
        if timeout(grace, self.settle(checks)).await.is_ok() {
            return;
        }

        error!(remaining = checks.len(), "Aborting checks that did not finish after cancellation");
        checks.abort_all();
        self.settle(checks).await;
    }

    /// 等待轮询检查与手动检查全部结束
    async fn settle(&self, checks: &mut JoinSet<()>) {
        join_all(checks).await;
        let mut manual = self.manual_checks.subscribe();
        if manual.wait_for(|count| *count == 0).await.is_err() {
            warn!("Manual check counter closed");
        }
    }
}

async fn join_all(checks: &mut JoinSet<()>) {
    while let Some(joined) = checks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("Check task panicked: {}", e);
            }
        }
    }
}
