use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::error::Cancelled;

const DEFAULT_STEPS: usize = 100;
const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(1000);

/// Where a [`CancellableLoop`] run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Still stepping; carries the number of steps already finished.
    Running(usize),
    Cancelled(usize),
    Completed(usize),
}

/// A long-running, stepwise job that honours a [`CancellationToken`].
///
/// The token is checked before every step. A step that has started always
/// runs to the end, so cancellation takes effect at the next boundary.
#[derive(Debug, Clone)]
pub struct CancellableLoop {
    steps: usize,
    step_delay: Duration,
}

impl Default for CancellableLoop {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS, DEFAULT_STEP_DELAY)
    }
}

impl CancellableLoop {
    pub fn new(steps: usize, step_delay: Duration) -> Self {
        CancellableLoop { steps, step_delay }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Runs every step unless `token` is cancelled first.
    ///
    /// Returns the number of completed steps, or [`Cancelled`] carrying how
    /// far the loop got.
    pub async fn run(&self, token: &CancellationToken) -> Result<usize, Cancelled> {
        self.run_with_progress(token, |_| {}).await
    }

    /// Same as [`run`](Self::run) but calls `on_step` after each finished step.
    pub async fn run_with_progress<P>(
        &self,
        token: &CancellationToken,
        mut on_step: P,
    ) -> Result<usize, Cancelled>
    where
        P: FnMut(usize) + Send,
    {
        let mut state = LoopState::Running(0);

        loop {
            state = match state {
                LoopState::Running(done) if done == self.steps => LoopState::Completed(done),
                LoopState::Running(done) if token.is_cancelled() => LoopState::Cancelled(done),
                LoopState::Running(done) => {
                    // Simulated I/O, then give the scheduler a turn.
                    tokio::time::sleep(self.step_delay).await;
                    tokio::task::yield_now().await;
                    on_step(done + 1);
                    LoopState::Running(done + 1)
                }
                LoopState::Cancelled(done) => {
                    log::debug!("loop cancelled after {}/{} steps", done, self.steps);
                    return Err(Cancelled {
                        completed_steps: done,
                    });
                }
                LoopState::Completed(done) => {
                    log::debug!("loop completed all {} steps", done);
                    return Ok(done);
                }
            };
        }
    }
}
