//! Helpers shared by the per-output and per-challenge tasks of every role.

use crate::{
    error::is_critical,
    traits::{TxCandidate, TxManager, TxReceipt},
    DisputeError,
};
use alloy_primitives::U256;
use anyhow::{anyhow, Result};
use std::{future::Future, time::Duration};
use tokio::{
    select,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// How long a failed startup step waits before it is attempted again.
pub(crate) const STARTUP_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// The outcome of one iteration of a polling task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// The task has nothing left to do.
    Done,
    /// Run again on the next tick.
    Again,
}

/// Runs `step` every `period`, starting immediately, until it reports [Step::Done] or `cancel` fires. Errors are
/// logged and retried on the next tick; errors classified as critical are logged at error level.
pub(crate) async fn poll_until_done<F, Fut>(cancel: &CancellationToken, period: Duration, mut step: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Step>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let result = select! {
            biased;
            _ = cancel.cancelled() => return,
            result = step() => result,
        };
        match result {
            Ok(Step::Done) => return,
            Ok(Step::Again) => {}
            Err(err) if is_critical(&err) => error!("{err:?}"),
            Err(err) => warn!("{err:?}"),
        }
    }
}

/// Runs `attempt` every `period`, starting immediately, until it succeeds. Critical errors are returned at once and
/// cancellation turns into an error naming `what`.
pub(crate) async fn retry_until_ok<T, F, Fut>(
    cancel: &CancellationToken,
    period: Duration,
    what: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            biased;
            _ = cancel.cancelled() => return Err(anyhow!("cancelled before {what} succeeded")),
            _ = ticker.tick() => {}
        }
        let result = select! {
            biased;
            _ = cancel.cancelled() => return Err(anyhow!("cancelled before {what} succeeded")),
            result = attempt() => result,
        };
        match result {
            Ok(value) => return Ok(value),
            Err(err) if is_critical(&err) => return Err(err),
            Err(err) => warn!(retry_in = ?period, "{what} failed: {err:?}"),
        }
    }
}

/// Sends `candidate` and turns a reverted receipt into [DisputeError::Submission].
pub(crate) async fn send_checked(
    txmgr: &dyn TxManager,
    candidate: TxCandidate,
    what: &str,
) -> Result<TxReceipt> {
    let receipt = txmgr.send_transaction(candidate).await?;
    if !receipt.success {
        return Err(DisputeError::Submission {
            tx_hash: Some(receipt.tx_hash),
            reason: format!("{what} reverted"),
        }
        .into());
    }
    Ok(receipt)
}

/// Narrows an event argument to `u64`.
pub(crate) fn event_u64(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        DisputeError::ProtocolInvariant(format!("{what} {value} in event overflows u64")).into()
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    #[tokio::test(start_paused = true)]
    async fn polls_until_done_and_survives_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let counter = calls.clone();
        poll_until_done(&cancel, Duration::from_secs(10), || {
            let counter = counter.clone();
            async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(DisputeError::Rpc("connection reset".into()).into()),
                    1 => Ok(Step::Again),
                    _ => Ok(Step::Done),
                }
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let counter = calls.clone();
        poll_until_done(&cancel, Duration::from_secs(10), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Step::Done) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn startup_steps_are_retried_until_they_succeed() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let counter = calls.clone();
        let value = retry_until_ok(&cancel, STARTUP_RETRY_INTERVAL, "reading the head", || {
            let counter = counter.clone();
            async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(DisputeError::Timeout(Duration::from_secs(10)).into()),
                    _ => Ok(42u64),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn critical_startup_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let counter = calls.clone();
        let err = retry_until_ok(&cancel, STARTUP_RETRY_INTERVAL, "reading the head", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u64, _>(DisputeError::Config("no colosseum".into()).into()) }
        })
        .await
        .unwrap_err();
        assert!(is_critical(&err));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cancel.cancel();
        let err = retry_until_ok(&cancel, STARTUP_RETRY_INTERVAL, "reading the head", || async {
            Ok(1u64)
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("reading the head"));
    }

    #[test]
    fn event_values_must_fit() {
        assert_eq!(event_u64(U256::from(7), "output index").unwrap(), 7);
        assert!(event_u64(U256::MAX, "output index").is_err());
    }
}
