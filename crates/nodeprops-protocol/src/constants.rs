/// Default upper bound on threads running observer callbacks.
pub const DEFAULT_NOTIFY_MAX_CALLBACK_THREADS: usize = 64;

/// Default grace period when stopping the notification pool, in milliseconds.
pub const DEFAULT_NOTIFY_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Thread name prefix for notification workers.
pub const DEFAULT_NOTIFY_THREAD_NAME: &str = "nodeprops-notify";

/// Prefix of environment variables overriding the service configuration.
pub const ENV_PREFIX: &str = "NODEPROPS_";
