//! Background task owning the quiz store connection.
//!
//! The application starts degraded; the supervisor installs the store once it connects,
//! polls its health and flips the degraded flag while reconnecting.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{quiz_store::QuizStore, storage::StorageError},
    state::SharedState,
};

/// Delays and retry budget of the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorTiming {
    /// First retry delay after a failed connection.
    pub initial_delay: Duration,
    /// Upper bound of the exponential backoff.
    pub max_delay: Duration,
    /// Interval between health checks of an installed store.
    pub health_poll: Duration,
    /// In-place reconnect attempts before the store is rebuilt from scratch.
    pub reconnect_attempts: u32,
}

impl Default for SupervisorTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            health_poll: Duration::from_secs(5),
            reconnect_attempts: 3,
        }
    }
}

/// Exponential backoff capped at a maximum delay.
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following one doubles.
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Connect with `connect` until it succeeds, then keep the store healthy forever.
pub async fn run<F, Fut>(state: SharedState, connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn QuizStore>, StorageError>> + Send,
{
    run_with_timing(state, connect, SupervisorTiming::default()).await
}

/// [`run`] with explicit timing.
pub async fn run_with_timing<F, Fut>(state: SharedState, mut connect: F, timing: SupervisorTiming)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn QuizStore>, StorageError>> + Send,
{
    let mut backoff = Backoff::new(timing.initial_delay, timing.max_delay);

    loop {
        match connect().await {
            Ok(store) => {
                state.set_quiz_store(store.clone()).await;
                info!("quiz store connected; leaving degraded mode");
                backoff.reset();

                watch(&state, store.as_ref(), &timing).await;
                warn!("quiz store did not recover; rebuilding the connection");
            }
            Err(err) => warn!(error = %err, "quiz store connection attempt failed"),
        }
        sleep(backoff.next_delay()).await;
    }
}

/// Poll `store` until it fails and cannot be recovered in place.
async fn watch(state: &SharedState, store: &dyn QuizStore, timing: &SupervisorTiming) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("quiz store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "quiz store health check failed");
                if !recover(state, store, timing).await {
                    return;
                }
            }
        }
        sleep(timing.health_poll).await;
    }
}

/// Retry `try_reconnect`, entering degraded mode after the first failure.
async fn recover(state: &SharedState, store: &dyn QuizStore, timing: &SupervisorTiming) -> bool {
    let mut backoff = Backoff::new(timing.initial_delay, timing.max_delay);

    for attempt in 0..timing.reconnect_attempts {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "quiz store reconnected");
                state.update_degraded(false).await;
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "quiz store reconnect failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "quiz store reconnect failed");
                }
                sleep(backoff.next_delay()).await;
            }
        }
    }

    warn!(
        attempts = timing.reconnect_attempts,
        "exhausted quiz store reconnect attempts; staying in degraded mode"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 5, 5]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
