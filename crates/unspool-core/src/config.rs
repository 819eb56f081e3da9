//! Extraction configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of concurrently admitted extraction tasks.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default interval between directory reaper sweeps.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(1);

/// What happens to an input once dispatch has finished with it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourcePolicy {
    /// Remove the input regardless of outcome. Failed extractions cannot be
    /// retried afterwards.
    #[default]
    Remove,
    /// Remove inputs that were processed successfully; move failed and
    /// rejected inputs into the given directory.
    Quarantine(PathBuf),
}

/// Configuration shared by the dispatcher, unpackers and reaper.
///
/// # Examples
///
/// ```
/// use unspool_core::UnpackConfig;
///
/// let config = UnpackConfig::default()
///     .with_concurrency(4)
///     .with_max_nesting_depth(2);
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Debug, Clone)]
pub struct UnpackConfig {
    /// Admission capacity of each limiter (minimum 1).
    pub concurrency: usize,

    /// How many levels of nested tar containers are unpacked automatically.
    /// `0` disables recursion; `1` unpacks members of the top-level archive
    /// but not their own nested members.
    pub max_nesting_depth: usize,

    /// Apply entry mode bits to extracted files (Unix only).
    pub preserve_permissions: bool,

    /// Disposal of the input after dispatch.
    pub source_policy: SourcePolicy,

    /// Interval between reaper sweeps.
    pub reap_interval: Duration,
}

impl Default for UnpackConfig {
    /// Default values:
    /// - `concurrency`: 10
    /// - `max_nesting_depth`: 1
    /// - `preserve_permissions`: true
    /// - `source_policy`: `SourcePolicy::Remove`
    /// - `reap_interval`: 1 second
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_nesting_depth: 1,
            preserve_permissions: true,
            source_policy: SourcePolicy::Remove,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

impl UnpackConfig {
    /// Sets the admission capacity. Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the nested container depth budget.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Enables or disables mode bit preservation.
    pub fn with_preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// Sets the source disposal policy.
    pub fn with_source_policy(mut self, policy: SourcePolicy) -> Self {
        self.source_policy = policy;
        self
    }

    /// Sets the reaper interval.
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }
}
