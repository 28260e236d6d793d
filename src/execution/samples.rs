//! Sources of training samples for the upload stage

use crate::api::SampleSource;
use async_trait::async_trait;
use std::collections::VecDeque;

/// Supplies more samples when a batch uploads nothing
///
/// `attempt` counts the rounds that produced zero uploads so far.
/// Returning `None` gives up, which halts the pipeline.
#[async_trait]
pub trait SampleProvider: Send {
    async fn next_batch(&mut self, attempt: u32) -> Option<Vec<SampleSource>>;
}

/// Never supplies anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMoreSamples;

#[async_trait]
impl SampleProvider for NoMoreSamples {
    async fn next_batch(&mut self, _attempt: u32) -> Option<Vec<SampleSource>> {
        None
    }
}

/// Hands out prepared batches in order
#[derive(Debug, Clone, Default)]
pub struct QueuedSamples {
    batches: VecDeque<Vec<SampleSource>>,
}

impl QueuedSamples {
    pub fn new(batches: Vec<Vec<SampleSource>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }
}

#[async_trait]
impl SampleProvider for QueuedSamples {
    async fn next_batch(&mut self, _attempt: u32) -> Option<Vec<SampleSource>> {
        self.batches.pop_front()
    }
}
