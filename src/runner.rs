//! Combine driver: runs erased combiners over the batches of each slice.
//!
//! Batches are split into contiguous partitions. Every (slice, generator)
//! pair gets one fresh accumulator per partition, fed sequentially; the
//! partials are then merged in order, in rounds of at most `fanout`, and the
//! single survivor is extracted. Nothing is shared between slices or
//! generators, so in parallel mode all of them fan out over rayon.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use crate::error::StatsError;
use crate::generators::{ErasedCombiner, Partition};
use crate::statistics::DatasetFeatureStatistics;
use crate::types::RecordBatch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    /// `threads: None` uses rayon's global pool; `partitions: None` uses
    /// [`Runner::default_partitions`].
    Parallel {
        threads: Option<usize>,
        partitions: Option<usize>,
    },
}

#[derive(Clone, Debug)]
pub struct Runner {
    pub mode: ExecMode,
    pub default_partitions: usize,
    /// Merge at most this many accumulators at a time. `None` merges all
    /// partials in one step.
    pub fanout: Option<usize>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::Parallel {
                threads: None,
                partitions: None,
            },
            default_partitions: 2 * num_cpus::get().max(2),
            fanout: None,
        }
    }
}

impl From<ExecMode> for Runner {
    fn from(mode: ExecMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

impl Runner {
    #[must_use]
    pub fn sequential() -> Self {
        ExecMode::Sequential.into()
    }

    #[must_use]
    pub fn parallel(threads: Option<usize>, partitions: Option<usize>) -> Self {
        ExecMode::Parallel {
            threads,
            partitions,
        }
        .into()
    }

    #[must_use]
    pub const fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = Some(fanout);
        self
    }

    /// # Errors
    /// Zero threads, zero partitions, or a fanout below 2.
    pub fn check(&self) -> Result<(), StatsError> {
        if let ExecMode::Parallel {
            threads,
            partitions,
        } = self.mode
        {
            if threads == Some(0) {
                return Err(StatsError::options("runner threads must be positive"));
            }
            if partitions == Some(0) {
                return Err(StatsError::options("runner partitions must be positive"));
            }
        }
        if self.default_partitions == 0 {
            return Err(StatsError::options("runner default_partitions must be positive"));
        }
        if let Some(f) = self.fanout.filter(|f| *f < 2) {
            return Err(StatsError::options(format!(
                "runner fanout must be at least 2, got {f}"
            )));
        }
        Ok(())
    }

    /// Run every combiner over every slice.
    ///
    /// Returns, per slice and in input order, one extracted output per
    /// combiner in combiner order.
    pub(crate) fn run_slices<K>(
        &self,
        combiners: &[Arc<dyn ErasedCombiner>],
        slices: Vec<(K, Vec<RecordBatch>)>,
    ) -> Result<Vec<(K, Vec<DatasetFeatureStatistics>)>>
    where
        K: Send + Sync + std::fmt::Debug,
    {
        match self.mode {
            ExecMode::Sequential => slices
                .into_iter()
                .map(|(key, batches)| {
                    let outputs = combiners
                        .iter()
                        .map(|c| self.run_one(c.as_ref(), &batches, 1))
                        .collect::<Result<Vec<_>>>()?;
                    debug!(slice = ?key, generators = outputs.len(), "extracted slice");
                    Ok((key, outputs))
                })
                .collect(),
            ExecMode::Parallel {
                threads,
                partitions,
            } => {
                let parts = partitions.unwrap_or(self.default_partitions);
                debug!(partitions = parts, fanout = ?self.fanout, threads = ?threads, "parallel combine");
                let work = || {
                    slices
                        .into_par_iter()
                        .map(|(key, batches)| {
                            let outputs = combiners
                                .par_iter()
                                .map(|c| self.run_one(c.as_ref(), &batches, parts))
                                .collect::<Result<Vec<_>>>()?;
                            debug!(slice = ?key, generators = outputs.len(), "extracted slice");
                            Ok((key, outputs))
                        })
                        .collect::<Result<Vec<_>>>()
                };
                match threads {
                    Some(t) => rayon::ThreadPoolBuilder::new()
                        .num_threads(t)
                        .build()
                        .context("build statistics thread pool")?
                        .install(work),
                    None => work(),
                }
            }
        }
    }

    fn run_one(
        &self,
        combiner: &dyn ErasedCombiner,
        batches: &[RecordBatch],
        partitions: usize,
    ) -> Result<DatasetFeatureStatistics> {
        let groups = split_contiguous(batches, partitions);
        let accumulate = |group: &[RecordBatch]| -> Result<Partition> {
            let mut acc = combiner.create();
            for batch in group {
                combiner.add_input(&mut acc, batch)?;
            }
            Ok(acc)
        };
        let mut partials: Vec<Partition> = if groups.len() > 1 {
            groups
                .par_iter()
                .map(|g| accumulate(g))
                .collect::<Result<_>>()?
        } else {
            groups
                .iter()
                .map(|g| accumulate(g))
                .collect::<Result<_>>()?
        };
        let fanout = self.fanout.unwrap_or(usize::MAX).max(2);
        while partials.len() > 1 {
            partials = partials
                .par_chunks(fanout)
                .map(|chunk| combiner.merge(chunk))
                .collect::<Result<_>>()?;
        }
        let merged = match partials.pop() {
            Some(acc) => acc,
            None => combiner.create(),
        };
        combiner.extract(&merged)
    }
}

/// Split into at most `n` contiguous, non-empty groups (always at least one).
fn split_contiguous<T>(items: &[T], n: usize) -> Vec<&[T]> {
    if n <= 1 || items.len() <= 1 {
        return vec![items];
    }
    items.chunks(items.len().div_ceil(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_split_keeps_order_and_bounds() {
        let items: Vec<u32> = (0..10).collect();
        let groups = split_contiguous(&items, 3);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.concat(), items);
        assert_eq!(split_contiguous(&items[..0], 4).len(), 1);
        assert_eq!(split_contiguous(&items, 50).len(), 10);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        assert!(Runner::parallel(Some(0), None).check().is_err());
        assert!(Runner::parallel(None, Some(0)).check().is_err());
        assert!(Runner::sequential().with_fanout(1).check().is_err());
        assert!(Runner::default().with_fanout(2).check().is_ok());
    }
}
