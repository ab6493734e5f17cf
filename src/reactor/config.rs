use crate::socket::options::SocketConfig;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Event-loop tick when `select-interval` is absent.
pub const DEFAULT_SELECT_INTERVAL: Duration = Duration::from_millis(1000);
/// Time allowed for in-flight tasks after a shutdown signal.
pub const DEFAULT_SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Reactor tuning. Every field is optional and independent; an absent field
/// keeps its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IoReactorConfig {
    /// Milliseconds; 0 means no timeout.
    pub connect_timeout: Option<u64>,
    pub interest_op_queued: Option<bool>,
    pub io_thread_count: Option<usize>,
    pub rcv_buf_size: Option<u32>,
    /// Milliseconds.
    pub select_interval: Option<u64>,
    /// Milliseconds.
    pub shutdown_grace_period: Option<u64>,
    pub snd_buf_size: Option<u32>,
    pub so_keep_alive: Option<bool>,
    /// Seconds; negative disables lingering.
    pub so_linger: Option<i64>,
    /// Milliseconds; 0 means no timeout.
    pub so_timeout: Option<u64>,
    pub tcp_no_delay: Option<bool>,
}

impl IoReactorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, millis: u64) -> Self {
        self.connect_timeout = Some(millis);
        self
    }

    /// Route connection requests through the reactor's task queue.
    pub fn interest_op_queued(mut self, queued: bool) -> Self {
        self.interest_op_queued = Some(queued);
        self
    }

    pub fn io_thread_count(mut self, count: usize) -> Self {
        self.io_thread_count = Some(count);
        self
    }

    pub fn rcv_buf_size(mut self, size: u32) -> Self {
        self.rcv_buf_size = Some(size);
        self
    }

    pub fn select_interval(mut self, millis: u64) -> Self {
        self.select_interval = Some(millis);
        self
    }

    pub fn shutdown_grace_period(mut self, millis: u64) -> Self {
        self.shutdown_grace_period = Some(millis);
        self
    }

    pub fn snd_buf_size(mut self, size: u32) -> Self {
        self.snd_buf_size = Some(size);
        self
    }

    pub fn so_keep_alive(mut self, enable: bool) -> Self {
        self.so_keep_alive = Some(enable);
        self
    }

    pub fn so_linger(mut self, secs: i64) -> Self {
        self.so_linger = Some(secs);
        self
    }

    pub fn so_timeout(mut self, millis: u64) -> Self {
        self.so_timeout = Some(millis);
        self
    }

    pub fn tcp_no_delay(mut self, enable: bool) -> Self {
        self.tcp_no_delay = Some(enable);
        self
    }

    /// Overlay the present fields on the defaults.
    pub fn settings(&self) -> ReactorSettings {
        let defaults = ReactorSettings::default();
        ReactorSettings {
            connect_timeout: self
                .connect_timeout
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            interest_op_queued: self.interest_op_queued.unwrap_or(defaults.interest_op_queued),
            io_thread_count: self.io_thread_count.unwrap_or(defaults.io_thread_count),
            rcv_buf_size: self.rcv_buf_size.unwrap_or(defaults.rcv_buf_size),
            select_interval: self
                .select_interval
                .map(Duration::from_millis)
                .unwrap_or(defaults.select_interval),
            shutdown_grace_period: self
                .shutdown_grace_period
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace_period),
            snd_buf_size: self.snd_buf_size.unwrap_or(defaults.snd_buf_size),
            so_keep_alive: self.so_keep_alive.unwrap_or(defaults.so_keep_alive),
            so_linger: self.so_linger.unwrap_or(defaults.so_linger),
            so_timeout: self.so_timeout.map(Duration::from_millis).unwrap_or(defaults.so_timeout),
            tcp_no_delay: self.tcp_no_delay.unwrap_or(defaults.tcp_no_delay),
        }
    }
}

/// Fully resolved reactor knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactorSettings {
    pub connect_timeout: Duration,
    pub interest_op_queued: bool,
    pub io_thread_count: usize,
    pub rcv_buf_size: u32,
    pub select_interval: Duration,
    pub shutdown_grace_period: Duration,
    pub snd_buf_size: u32,
    pub so_keep_alive: bool,
    pub so_linger: i64,
    pub so_timeout: Duration,
    pub tcp_no_delay: bool,
}

impl Default for ReactorSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::ZERO,
            interest_op_queued: false,
            io_thread_count: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            rcv_buf_size: 0,
            select_interval: DEFAULT_SELECT_INTERVAL,
            shutdown_grace_period: DEFAULT_SHUTDOWN_GRACE_PERIOD,
            snd_buf_size: 0,
            so_keep_alive: false,
            so_linger: -1,
            so_timeout: Duration::ZERO,
            tcp_no_delay: true,
        }
    }
}

impl ReactorSettings {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (!self.connect_timeout.is_zero()).then_some(self.connect_timeout)
    }

    /// Options for every socket opened under this reactor. Zero sizes and
    /// timeouts keep the system defaults.
    pub fn socket_config(&self) -> SocketConfig {
        SocketConfig {
            so_timeout: (!self.so_timeout.is_zero()).then_some(self.so_timeout),
            tcp_no_delay: self.tcp_no_delay,
            so_keep_alive: self.so_keep_alive,
            so_linger: u64::try_from(self.so_linger).ok().map(Duration::from_secs),
            snd_buf_size: (self.snd_buf_size > 0).then_some(self.snd_buf_size),
            rcv_buf_size: (self.rcv_buf_size > 0).then_some(self.rcv_buf_size),
        }
    }
}
