//! Mock workload for testing

use async_trait::async_trait;
use curfew_util::RunId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::{Workload, WorkloadContext, WorkloadError, WorkloadFactory, WorkloadResult};

/// How a mock run-loop behaves
#[derive(Debug, Clone, Default)]
pub enum MockRun {
    /// Run until the period is cancelled
    #[default]
    UntilCancelled,
    /// Return `Ok` after the delay
    CompleteAfter(Duration),
    /// Return an error after the delay
    FailAfter(Duration),
    /// Panic after the delay
    PanicAfter(Duration),
    /// Keep running after cancellation; only an abort stops it
    IgnoreCancel,
}

/// Lifecycle counters shared by a factory and every workload it creates
#[derive(Debug, Default)]
pub struct MockCounters {
    pub created: AtomicUsize,
    pub initialized: AtomicUsize,
    pub runs: AtomicUsize,
    pub cancellations: AtomicUsize,
    pub background_stopped: AtomicUsize,
}

impl MockCounters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Run-loops that returned because they observed cancellation
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Background tasks that observed cancellation
    pub fn background_stopped(&self) -> usize {
        self.background_stopped.load(Ordering::SeqCst)
    }
}

/// Mock workload driven by a [`MockRun`]
pub struct MockWorkload {
    run_id: RunId,
    behavior: MockRun,
    fail_initialize: bool,
    background_task: bool,
    counters: Arc<MockCounters>,
}

impl MockWorkload {
    pub fn new(run_id: RunId, behavior: MockRun) -> Self {
        Self {
            run_id,
            behavior,
            fail_initialize: false,
            background_task: false,
            counters: Arc::new(MockCounters::default()),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn counters(&self) -> Arc<MockCounters> {
        self.counters.clone()
    }
}

#[async_trait]
impl Workload for MockWorkload {
    fn name(&self) -> &str {
        "mock"
    }

    async fn initialize(&mut self, ctx: &WorkloadContext) -> WorkloadResult<()> {
        if self.fail_initialize {
            return Err(WorkloadError::InitFailed("mock initialize failure".into()));
        }

        if self.background_task {
            let token = ctx.token().clone();
            let counters = self.counters.clone();
            ctx.group().spawn("mock-background", async move {
                token.cancelled().await;
                counters.background_stopped.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })?;
        }

        self.counters.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run(&mut self, ctx: &WorkloadContext) -> WorkloadResult<()> {
        self.counters.runs.fetch_add(1, Ordering::SeqCst);

        let finish = match self.behavior {
            MockRun::UntilCancelled => None,
            MockRun::IgnoreCancel => {
                std::future::pending::<()>().await;
                return Ok(());
            }
            MockRun::CompleteAfter(d) | MockRun::FailAfter(d) | MockRun::PanicAfter(d) => Some(d),
        };

        let Some(delay) = finish else {
            ctx.cancelled().await;
            self.counters.cancellations.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        };

        tokio::select! {
            _ = ctx.cancelled() => {
                self.counters.cancellations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ = tokio::time::sleep(delay) => match self.behavior {
                MockRun::FailAfter(_) => Err(WorkloadError::Internal("mock run failure".into())),
                MockRun::PanicAfter(_) => panic!("mock run panic"),
                _ => Ok(()),
            },
        }
    }
}

/// Factory producing [`MockWorkload`]s that share one set of counters
#[derive(Default)]
pub struct MockWorkloadFactory {
    behavior: Mutex<MockRun>,
    /// Number of upcoming initializations that fail
    pub fail_initialize: AtomicUsize,
    /// Make `create` itself fail
    pub fail_create: AtomicBool,
    /// Each workload spawns one background task into its group
    pub background_task: AtomicBool,
    counters: Arc<MockCounters>,
}

impl MockWorkloadFactory {
    pub fn new(behavior: MockRun) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            ..Default::default()
        }
    }

    pub fn set_behavior(&self, behavior: MockRun) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    pub fn fail_next_initializations(&self, count: usize) {
        self.fail_initialize.store(count, Ordering::SeqCst);
    }

    pub fn with_background_task(self) -> Self {
        self.background_task.store(true, Ordering::SeqCst);
        self
    }

    pub fn counters(&self) -> Arc<MockCounters> {
        self.counters.clone()
    }
}

impl WorkloadFactory for MockWorkloadFactory {
    fn create(&self, run_id: RunId) -> WorkloadResult<Box<dyn Workload>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(WorkloadError::Internal("mock create failure".into()));
        }

        self.counters.created.fetch_add(1, Ordering::SeqCst);

        let fail_initialize = self
            .fail_initialize
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let behavior = self
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Ok(Box::new(MockWorkload {
            run_id,
            behavior,
            fail_initialize,
            background_task: self.background_task.load(Ordering::SeqCst),
            counters: self.counters.clone(),
        }))
    }
}
