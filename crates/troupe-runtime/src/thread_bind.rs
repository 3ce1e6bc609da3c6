//! Worker thread binding
//!
//! Applies CPU affinity through the platform CPU-set API and real-time
//! priority through the platform scheduler API. An empty affinity set
//! leaves OS default scheduling intact; priority 0 means the default
//! policy; priority > 0 requires the privilege to use the requested
//! real-time policy (CAP_SYS_NICE on Linux).

use std::collections::BTreeSet;

use troupe_core::constants::SCHED_PRIORITY_MAX;
use troupe_core::error::{Error, Result};

/// Scheduler policy for a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedPolicy {
    /// Default time-sharing scheduler
    #[default]
    Other,
    /// Real-time FIFO
    Fifo,
    /// Real-time round-robin
    RoundRobin,
}

/// Binding hints for one actor's worker thread
#[derive(Debug, Clone, Default)]
pub struct ThreadConfig {
    /// CPU indices to pin the worker to; empty means no pinning
    pub affinity: BTreeSet<usize>,
    /// Scheduler priority, 0 for the default policy, 1–99 for real-time
    pub priority: i32,
    /// Scheduler policy applied when `priority > 0`
    pub policy: SchedPolicy,
}

impl ThreadConfig {
    /// Pin the worker to the given CPU set, default scheduling otherwise
    pub fn pinned(cores: impl IntoIterator<Item = usize>) -> Self {
        Self {
            affinity: cores.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Add a real-time priority under the given policy
    pub fn with_priority(mut self, priority: i32, policy: SchedPolicy) -> Self {
        self.priority = priority;
        self.policy = policy;
        self
    }

    /// Validate the binding hints against this machine
    pub fn validate(&self) -> Result<()> {
        let cores = available_cores();
        for &core in &self.affinity {
            if core >= cores {
                return Err(Error::invalid_configuration(
                    "affinity",
                    format!("core id {} out of range (machine has {})", core, cores),
                ));
            }
        }

        if self.priority < 0 || self.priority > SCHED_PRIORITY_MAX {
            return Err(Error::invalid_configuration(
                "priority",
                format!("{} outside 0..={}", self.priority, SCHED_PRIORITY_MAX),
            ));
        }

        if self.priority > 0 && self.policy == SchedPolicy::Other {
            return Err(Error::invalid_configuration(
                "priority",
                "a positive priority requires a real-time policy (Fifo or RoundRobin)",
            ));
        }

        if self.priority == 0 && self.policy != SchedPolicy::Other {
            return Err(Error::invalid_configuration(
                "policy",
                "real-time policies require a priority in 1..=99",
            ));
        }

        Ok(())
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Apply the binding to the calling thread. Failures are logged, not fatal:
/// an unpinned or default-priority worker still makes progress.
#[cfg(target_os = "linux")]
pub(crate) fn bind_current_thread(name: &str, config: &ThreadConfig) {
    use tracing::{debug, warn};

    if !config.affinity.is_empty() {
        let rc = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            for &core in &config.affinity {
                libc::CPU_SET(core, &mut set);
            }
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc != 0 {
            warn!(
                actor = name,
                error = %std::io::Error::last_os_error(),
                "could not assign affinity"
            );
        } else {
            debug!(actor = name, cores = ?config.affinity, "worker pinned");
        }
    }

    if config.priority > 0 {
        let policy = match config.policy {
            SchedPolicy::Fifo => libc::SCHED_FIFO,
            SchedPolicy::RoundRobin => libc::SCHED_RR,
            SchedPolicy::Other => libc::SCHED_OTHER,
        };
        let param = libc::sched_param {
            sched_priority: config.priority,
        };
        let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), policy, &param) };
        if rc != 0 {
            warn!(
                actor = name,
                priority = config.priority,
                "could not set real-time priority (missing CAP_SYS_NICE?)"
            );
        } else {
            debug!(actor = name, priority = config.priority, policy = ?config.policy, "priority set");
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn bind_current_thread(name: &str, config: &ThreadConfig) {
    if !config.affinity.is_empty() || config.priority > 0 {
        tracing::warn!(
            actor = name,
            "thread affinity and priority are only applied on Linux"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ThreadConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pinned_to_core_zero_is_valid() {
        // Every machine has core 0.
        assert!(ThreadConfig::pinned([0]).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_core_rejected() {
        let config = ThreadConfig::pinned([usize::MAX]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_priority_requires_realtime_policy() {
        let config = ThreadConfig {
            priority: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ThreadConfig::default().with_priority(50, SchedPolicy::Fifo);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_realtime_policy_requires_priority() {
        let config = ThreadConfig {
            policy: SchedPolicy::Fifo,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_priority_bounds() {
        let config = ThreadConfig::default().with_priority(100, SchedPolicy::Fifo);
        assert!(config.validate().is_err());

        let config = ThreadConfig::default().with_priority(99, SchedPolicy::RoundRobin);
        assert!(config.validate().is_ok());
    }
}
