//! Supervised L1 log subscriptions. A [LogWatcher] polls `eth_getLogs` for one contract and hands decoded events to
//! its consumer over a channel. Failed polls are retried after a backoff; the consumer never sees the resubscription.

use crate::{
    error::with_timeout,
    traits::{ChainReader, Log, LogFilter},
};
use alloy_primitives::{Address, B256};
use alloy_sol_types::SolEvent;
use anyhow::Result;
use std::{marker::PhantomData, sync::Arc, time::Duration};
use tokio::{select, sync::mpsc, time::sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

/// Delay before polling again after a failed poll.
pub const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(10);

/// Capacity of the channel between a watch task and its consumer.
const EVENT_BUFFER: usize = 64;

/// The [LogWatcher] reads the logs of a single contract.
#[derive(Clone)]
pub struct LogWatcher {
    chain: Arc<dyn ChainReader>,
    address: Address,
    poll_interval: Duration,
    network_timeout: Duration,
}

/// Selects the logs of event `E`, optionally narrowed by its indexed arguments.
#[derive(Debug, Clone)]
pub struct EventQuery<E> {
    indexed: Vec<Vec<B256>>,
    _event: PhantomData<fn() -> E>,
}

impl<E: SolEvent> Default for EventQuery<E> {
    fn default() -> Self {
        Self {
            indexed: Vec::new(),
            _event: PhantomData,
        }
    }
}

impl<E: SolEvent> EventQuery<E> {
    /// Accepts only logs whose `position`th indexed argument (0-based, after the signature) is `value`.
    pub fn with_indexed(mut self, position: usize, value: B256) -> Self {
        if self.indexed.len() <= position {
            self.indexed.resize(position + 1, Vec::new());
        }
        self.indexed[position] = vec![value];
        self
    }

    fn topics(&self) -> Vec<Vec<B256>> {
        let mut topics = vec![vec![E::SIGNATURE_HASH]];
        topics.extend(self.indexed.iter().cloned());
        topics
    }
}

impl LogWatcher {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        address: Address,
        poll_interval: Duration,
        network_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            address,
            poll_interval,
            network_timeout,
        }
    }

    /// Returns the current L1 head.
    pub async fn head(&self) -> Result<u64> {
        with_timeout(self.network_timeout, self.chain.block_number()).await
    }

    /// Returns the events matching `query` in `[from_block, to_block]`, oldest first.
    pub async fn history<E: SolEvent>(
        &self,
        query: &EventQuery<E>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<E>> {
        let filter = LogFilter {
            from_block,
            to_block,
            addresses: vec![self.address],
            topics: query.topics(),
        };
        let logs = with_timeout(self.network_timeout, self.chain.filter_logs(filter)).await?;
        Ok(logs.iter().filter_map(decode::<E>).collect())
    }

    /// Streams the events matching `query` from `start_block` on. The poll task is spawned on `tracker` and ends when
    /// `cancel` fires or the receiver is dropped.
    pub fn watch<E>(
        &self,
        query: EventQuery<E>,
        start_block: u64,
        tracker: &TaskTracker,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<E>
    where
        E: SolEvent + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let watcher = self.clone();
        tracker.spawn(async move {
            let mut next_block = start_block;
            loop {
                let delay = match watcher.poll(&query, next_block, &tx).await {
                    Ok(Some(head)) => {
                        next_block = head + 1;
                        watcher.poll_interval
                    }
                    Ok(None) => watcher.poll_interval,
                    Err(PollError::Closed) => return,
                    Err(PollError::Failed(err)) => {
                        warn!(
                            target: "subscription",
                            address = %watcher.address,
                            from_block = next_block,
                            "resubscribing after failed log poll: {err:?}"
                        );
                        RESUBSCRIBE_BACKOFF
                    }
                };
                select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep(delay) => {}
                }
            }
        });
        rx
    }

    /// Forwards the events from `next_block` up to the current head. Returns the head if any block was covered.
    async fn poll<E: SolEvent>(
        &self,
        query: &EventQuery<E>,
        next_block: u64,
        tx: &mpsc::Sender<E>,
    ) -> Result<Option<u64>, PollError> {
        let head = self.head().await?;
        if head < next_block {
            return Ok(None);
        }
        let events = self.history(query, next_block, head).await?;
        debug!(target: "subscription", from_block = next_block, to_block = head, count = events.len(), "polled logs");
        for event in events {
            tx.send(event).await.map_err(|_| PollError::Closed)?;
        }
        Ok(Some(head))
    }
}

enum PollError {
    /// The consumer went away.
    Closed,
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for PollError {
    fn from(err: anyhow::Error) -> Self {
        PollError::Failed(err)
    }
}

fn decode<E: SolEvent>(log: &Log) -> Option<E> {
    match E::decode_raw_log(log.topics.iter().copied(), &log.data, true) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(
                target: "subscription",
                address = %log.address,
                block_number = ?log.block_number,
                "skipping undecodable log: {err}"
            );
            None
        }
    }
}
