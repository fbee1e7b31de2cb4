//! Background consumer feeding deliveries to a [`MessageHandler`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::MessageStream;
use crate::error::{Result, SagaError};
use crate::handler::MessageHandler;

/// How long a stop waits for the message in flight to finish.
pub const DEFAULT_IN_FLIGHT_GRACE: Duration = Duration::from_secs(30);

/// Running consumer task.
pub struct ConsumerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<u64>,
}

impl ConsumerHandle {
    /// Stops the consumer and returns how many deliveries it handled.
    ///
    /// A message in flight when the stop arrives is allowed to finish its
    /// decrement, cache invalidation and publish. Only a message still
    /// running after the grace period is abandoned.
    pub async fn stop(self) -> Result<u64> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| SagaError::Worker(e.to_string()))
    }

    /// True once the stream ended or the consumer was stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a task that handles deliveries one at a time, in arrival order.
pub fn start<H: MessageHandler>(messages: MessageStream, handler: Arc<H>) -> ConsumerHandle {
    start_with_grace(messages, handler, DEFAULT_IN_FLIGHT_GRACE)
}

/// Like [`start`], with an explicit grace period for the message in flight at stop.
pub fn start_with_grace<H: MessageHandler>(
    mut messages: MessageStream,
    handler: Arc<H>,
    grace: Duration,
) -> ConsumerHandle {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();

    let task = tokio::spawn(async move {
        let mut handled: u64 = 0;

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => break,
                next = messages.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "failed to receive message");
                    continue;
                }
                None => {
                    tracing::info!("message stream closed");
                    break;
                }
            };

            let handling = handler.handle(message);
            tokio::pin!(handling);
            let (outcome, stopping) = tokio::select! {
                outcome = &mut handling => (Some(outcome), false),
                _ = token.cancelled() => {
                    tracing::info!("stop requested, finishing message in flight");
                    (tokio::time::timeout(grace, &mut handling).await.ok(), true)
                }
            };

            match outcome {
                Some(outcome) => {
                    handled += 1;
                    tracing::debug!(stage = %outcome.stage(), "message handled");
                }
                None => tracing::error!(
                    ?grace,
                    "consumer stopped while a message was in flight"
                ),
            }
            if stopping {
                break;
            }
        }

        tracing::info!(handled, "consumer stopped");
        handled
    });

    ConsumerHandle { shutdown, task }
}
