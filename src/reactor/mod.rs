//! IO reactor: a dedicated multi-threaded runtime whose event loop is driven
//! by one owned background thread.
//!
//! The loop ticks every `select-interval`, letting the wired dispatch do its
//! housekeeping, and exits on an explicit shutdown signal. The runtime then
//! gets `shutdown-grace-period` to wind down before the thread is joined.

mod config;

pub use config::{
    IoReactorConfig, ReactorSettings, DEFAULT_SELECT_INTERVAL, DEFAULT_SHUTDOWN_GRACE_PERIOD,
};

use crate::base::neterror::NetError;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

/// Receives the reactor's periodic events.
pub trait IoEventDispatch: Send + Sync {
    /// Called once per `select-interval`.
    fn on_tick(&self);

    /// Called once after the shutdown signal, before the runtime winds down.
    fn on_shutdown(&self) {}
}

/// Reactor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReactorStatus {
    Inactive = 0,
    Active = 1,
    ShuttingDown = 2,
    ShutDown = 3,
}

impl ReactorStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ReactorStatus::Active,
            2 => ReactorStatus::ShuttingDown,
            3 => ReactorStatus::ShutDown,
            _ => ReactorStatus::Inactive,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct IoReactor {
    settings: ReactorSettings,
    handle: Handle,
    status: Arc<AtomicU8>,
    failure: Arc<Mutex<Option<String>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl IoReactor {
    /// Start the reactor thread, which builds the runtime and drives the
    /// event loop. Returns once the runtime is up.
    pub fn start(
        config: &IoReactorConfig,
        dispatch: Arc<dyn IoEventDispatch>,
    ) -> Result<Self, NetError> {
        let settings = config.settings();
        let threads = settings.io_thread_count.max(1);
        let status = Arc::new(AtomicU8::new(ReactorStatus::Active as u8));
        let failure = Arc::new(Mutex::new(None));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<Handle, String>>(1);

        let thread = {
            let status = status.clone();
            let failure = failure.clone();
            let interval = settings.select_interval;
            let grace = settings.shutdown_grace_period;
            std::thread::Builder::new().name("connmgr-reactor".to_string()).spawn(move || {
                let runtime = match Builder::new_multi_thread()
                    .worker_threads(threads)
                    .thread_name("connmgr-io")
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let event_loop = runtime.spawn(run_loop(interval, dispatch, shutdown_rx));
                let _ = ready_tx.send(Ok(runtime.handle().clone()));

                if let Err(e) = runtime.block_on(event_loop) {
                    tracing::warn!(error = %e, "reactor event loop terminated abnormally");
                    *lock(&failure) = Some(e.to_string());
                }
                status.store(ReactorStatus::ShuttingDown as u8, Ordering::Release);
                runtime.shutdown_timeout(grace);
                status.store(ReactorStatus::ShutDown as u8, Ordering::Release);
                tracing::info!("IO reactor stopped");
            })
        };
        let thread = thread.map_err(|e| {
            NetError::IoReactorStartup(format!("cannot spawn reactor thread: {}", e))
        })?;

        let handle = match ready_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(reason)) => {
                let _ = thread.join();
                return Err(NetError::IoReactorStartup(format!("cannot build runtime: {}", reason)));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(NetError::IoReactorStartup(
                    "reactor thread exited during startup".to_string(),
                ));
            }
        };

        tracing::info!(
            threads,
            select_interval = ?settings.select_interval,
            "IO reactor started"
        );
        Ok(Self {
            settings,
            handle,
            status,
            failure,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn settings(&self) -> &ReactorSettings {
        &self.settings
    }

    /// Handle of the reactor's runtime. Sockets opened on it are driven by
    /// the reactor's worker threads.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn status(&self) -> ReactorStatus {
        ReactorStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.status() == ReactorStatus::Active && lock(&self.failure).is_none()
    }

    /// Fails if the loop died on its own or the reactor was shut down.
    pub fn ensure_running(&self) -> Result<(), NetError> {
        if let Some(reason) = lock(&self.failure).clone() {
            return Err(NetError::IoReactorStartup(reason));
        }
        match self.status() {
            ReactorStatus::Active => Ok(()),
            _ => Err(NetError::ManagerShutdown),
        }
    }

    /// Queue a task on the reactor's runtime.
    pub fn spawn<F>(&self, task: F) -> Result<tokio::task::JoinHandle<F::Output>, NetError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.ensure_running()?;
        Ok(self.handle.spawn(task))
    }

    /// Run a fallible task on the reactor and wait for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T, NetError>
    where
        F: Future<Output = Result<T, NetError>> + Send + 'static,
        T: Send + 'static,
    {
        match self.spawn(task)?.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(NetError::ManagerShutdown),
            Err(e) => {
                tracing::warn!(error = %e, "reactor task panicked");
                Err(NetError::ConnectionAborted)
            }
        }
    }

    /// Ask the event loop to stop without waiting for it.
    pub fn signal_shutdown(&self) {
        if let Some(tx) = lock(&self.shutdown_tx).take() {
            tracing::debug!("signalling IO reactor shutdown");
            let _ = tx.send(());
        }
    }

    /// Signal the event loop and wait for the reactor thread. Later calls do
    /// nothing.
    ///
    /// Inside a multi-threaded runtime the wait is moved off the worker with
    /// `block_in_place`; async callers should prefer
    /// [`shutdown_async`](Self::shutdown_async).
    pub fn shutdown(&self) {
        self.signal_shutdown();
        let Some(thread) = lock(&self.thread).take() else {
            return;
        };
        let joined = match Handle::try_current() {
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| thread.join())
            }
            _ => thread.join(),
        };
        if joined.is_err() {
            tracing::warn!("reactor thread panicked during shutdown");
        }
    }

    /// Like [`shutdown`](Self::shutdown), but waits for the reactor thread on
    /// tokio's blocking pool instead of the calling task.
    pub async fn shutdown_async(&self) {
        self.signal_shutdown();
        let Some(thread) = lock(&self.thread).take() else {
            return;
        };
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => {}
            _ => tracing::warn!("reactor thread panicked during shutdown"),
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.settings.shutdown_grace_period
    }
}

impl fmt::Debug for IoReactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoReactor")
            .field("status", &self.status())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Drop for IoReactor {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

async fn run_loop(
    interval: Duration,
    dispatch: Arc<dyn IoEventDispatch>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => dispatch.on_tick(),
        }
    }
    dispatch.on_shutdown();
}
