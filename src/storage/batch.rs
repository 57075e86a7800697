use std::time::Duration;

use anyhow::{Result, bail};
use rand::Rng;

use super::{Item, KeyValueStore, StoreError};

pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Tuning for [`BatchPersistence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum number of keys/items sent in one store request
    pub batch_size: usize,
    /// Attempts per group before it is abandoned (first try included)
    pub max_retries: u32,
    /// Pause between attempts on the same group; zero means retry immediately
    pub retry_delay: Duration,
    /// Randomize each pause in `0..=retry_delay`
    pub jitter: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::ZERO,
            jitter: false,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        if self.max_retries == 0 {
            bail!("max retries must be at least 1");
        }
        Ok(())
    }

    fn pause(&self) -> Duration {
        if self.retry_delay.is_zero() || !self.jitter {
            return self.retry_delay;
        }
        let max = self.retry_delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Put,
    Delete,
}

impl WriteOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOperation::Put => "put",
            WriteOperation::Delete => "delete",
        }
    }
}

/// Terminal state of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupState {
    Done,
    /// Gave up after the last error
    Abandoned(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    /// Position of the group within the call, starting at 0
    pub index: usize,
    /// Number of keys/items in the group
    pub len: usize,
    pub attempts: u32,
    pub state: GroupState,
}

impl GroupReport {
    pub fn is_done(&self) -> bool {
        self.state == GroupState::Done
    }
}

/// What a batch call produced, plus how each group fared.
///
/// Abandoned groups are not errors: their data is simply missing from `value`.
/// Callers that cannot tolerate partial results must inspect [`abandoned`].
///
/// [`abandoned`]: BatchOutcome::abandoned
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub value: T,
    pub groups: Vec<GroupReport>,
}

impl<T> BatchOutcome<T> {
    pub fn abandoned(&self) -> impl Iterator<Item = &GroupReport> {
        self.groups.iter().filter(|group| !group.is_done())
    }

    pub fn is_complete(&self) -> bool {
        self.groups.iter().all(GroupReport::is_done)
    }
}

/// Bulk reads and writes against a [`KeyValueStore`], in bounded-size groups.
///
/// Each group is retried on its own budget; a group that keeps failing is
/// dropped from the result and never aborts the rest of the call.
#[derive(Debug, Clone, Default)]
pub struct BatchPersistence {
    config: BatchConfig,
}

impl BatchPersistence {
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Fetch `keys` in groups. Keys missing from the store are skipped; items
    /// come back in key order within each group, groups in call order.
    pub async fn batch_get<S>(&self, store: &S, keys: &[String]) -> BatchOutcome<Vec<Item>>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut items = Vec::with_capacity(keys.len());
        let mut groups = Vec::new();

        for (index, group) in keys.chunks(self.config.batch_size).enumerate() {
            let (report, found) = self
                .run_group(index, group.len(), "get", move || store.multi_get(group))
                .await;

            if let Some(mut found) = found {
                items.extend(group.iter().filter_map(|key| found.remove(key)));
            }
            groups.push(report);
        }

        BatchOutcome {
            value: items,
            groups,
        }
    }

    /// Apply `operation` to every item, in groups. For deletes only the item keys
    /// are used.
    pub async fn batch_write<S>(
        &self,
        store: &S,
        items: Vec<Item>,
        operation: WriteOperation,
    ) -> BatchOutcome<()>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut groups = Vec::new();

        for (index, group) in items.chunks(self.config.batch_size).enumerate() {
            let (report, _) = match operation {
                WriteOperation::Put => {
                    self.run_group(index, group.len(), operation.as_str(), move || {
                        store.multi_put(group.to_vec())
                    })
                    .await
                }
                WriteOperation::Delete => {
                    let keys: Vec<String> = group.iter().map(|item| item.key.clone()).collect();
                    let keys = keys.as_slice();
                    self.run_group(index, group.len(), operation.as_str(), move || {
                        store.multi_delete(keys)
                    })
                    .await
                }
            };
            groups.push(report);
        }

        BatchOutcome { value: (), groups }
    }

    /// Drive one group to `Done` or `Abandoned`.
    async fn run_group<T, F, Fut>(
        &self,
        index: usize,
        len: usize,
        action: &str,
        mut request: F,
    ) -> (GroupReport, Option<T>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match request().await {
                Ok(value) => {
                    let report = GroupReport {
                        index,
                        len,
                        attempts,
                        state: GroupState::Done,
                    };
                    return (report, Some(value));
                }
                Err(err) => err,
            };

            if !err.is_transient() || attempts >= self.config.max_retries {
                tracing::warn!(
                    group = index,
                    size = len,
                    attempts,
                    error = %err,
                    "Abandoning batch {} group",
                    action
                );
                let report = GroupReport {
                    index,
                    len,
                    attempts,
                    state: GroupState::Abandoned(err),
                };
                return (report, None);
            }

            let pause = self.config.pause();
            tracing::debug!(
                group = index,
                attempt = attempts,
                error = %err,
                "Batch {} failed, retrying in {:?}",
                action,
                pause
            );
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
    }
}
