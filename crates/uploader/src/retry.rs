//! Bounded retry of a single chunk.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::transport::{AttemptOutcome, ChunkRequest, ChunkTransport, ProgressFn, TransportFailure};

/// Result of driving one chunk through the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The chunk was acknowledged.
    Success { stored: Vec<String>, attempts: u32 },
    /// Every attempt failed; carries the last failure.
    Exhausted {
        failure: TransportFailure,
        attempts: u32,
    },
    /// Cancelled before the chunk was acknowledged.
    Aborted,
}

/// Repeats a chunk upload up to `max_attempts` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::types::DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// `max_attempts` of 0 is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    /// Waits `delay` before each retry.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sends `request` until it succeeds, is aborted, or runs out of attempts.
    ///
    /// Attempts run one after another. Before every retry the chunk's
    /// progress is reset to 0 through `progress`, and `on_retry` is told
    /// which attempt failed and why.
    pub async fn run(
        &self,
        transport: &dyn ChunkTransport,
        request: &ChunkRequest<'_>,
        progress: &ProgressFn<'_>,
        cancel: &CancellationToken,
        on_retry: &(dyn Fn(u32, &TransportFailure) + Send + Sync),
    ) -> ChunkOutcome {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return ChunkOutcome::Aborted;
            }

            let failure = match transport.send_chunk(request, progress, cancel).await {
                AttemptOutcome::Success(stored) => {
                    debug!(
                        file = %request.source.name(),
                        chunk = request.chunk.index,
                        attempt,
                        "chunk acknowledged"
                    );
                    return ChunkOutcome::Success {
                        stored,
                        attempts: attempt,
                    };
                }
                AttemptOutcome::Aborted => return ChunkOutcome::Aborted,
                AttemptOutcome::Failed(failure) => failure,
            };

            warn!(
                file = %request.source.name(),
                chunk = request.chunk.index,
                attempt,
                max_attempts = self.max_attempts,
                error = %failure,
                "chunk attempt failed"
            );

            if attempt >= self.max_attempts {
                return ChunkOutcome::Exhausted {
                    failure,
                    attempts: attempt,
                };
            }

            progress(0);
            on_retry(attempt, &failure);

            if !self.delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ChunkOutcome::Aborted,
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use simpleupload_transfer::{Chunk, SourceFile};

    /// One scripted response of [`ScriptedTransport`].
    #[derive(Debug, Clone)]
    pub(crate) enum Step {
        Ok,
        Fail(TransportFailure),
        /// Reports progress, then waits for cancellation.
        Hang,
    }

    /// Transport that replays a script of outcomes, one per call. Every
    /// call reports half and then all of the chunk as sent. Once the
    /// script runs out, every further call succeeds.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        pub(crate) requests: Mutex<Vec<(String, Chunk, String)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                script: Mutex::new(steps.into_iter().collect()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn always_failing(failure: TransportFailure) -> Self {
            Self::new(std::iter::repeat_n(Step::Fail(failure), 64))
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChunkTransport for ScriptedTransport {
        fn send_chunk<'a>(
            &'a self,
            request: &'a ChunkRequest<'a>,
            progress: &'a ProgressFn<'a>,
            cancel: &'a CancellationToken,
        ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.requests.lock().unwrap().push((
                    request.source.name().to_string(),
                    request.chunk,
                    request.upload_id.to_string(),
                ));
                let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Ok);

                progress(request.chunk.length / 2);
                match step {
                    Step::Ok => {
                        progress(request.chunk.length);
                        AttemptOutcome::Success(vec![format!(
                            "{}-part{}",
                            request.source.name(),
                            request.chunk.index
                        )])
                    }
                    Step::Fail(failure) => AttemptOutcome::Failed(failure),
                    Step::Hang => {
                        cancel.cancelled().await;
                        AttemptOutcome::Aborted
                    }
                }
            })
        }
    }

    fn server_error() -> TransportFailure {
        TransportFailure::Status {
            code: 500,
            reason: "Internal Server Error".into(),
        }
    }

    async fn run_policy(
        policy: RetryPolicy,
        transport: &ScriptedTransport,
        cancel: &CancellationToken,
    ) -> (ChunkOutcome, Vec<u64>, Vec<u32>) {
        let source = SourceFile::from_bytes("a.bin", vec![7u8; 100]).unwrap();
        let request = ChunkRequest {
            source: &source,
            chunk: Chunk {
                index: 0,
                offset: 0,
                length: 100,
            },
            chunk_count: 1,
            upload_id: "u",
        };
        let progress_log = Mutex::new(Vec::new());
        let retries = Mutex::new(Vec::new());
        let progress = |n: u64| progress_log.lock().unwrap().push(n);
        let on_retry = |attempt: u32, _: &TransportFailure| retries.lock().unwrap().push(attempt);

        let outcome = policy
            .run(transport, &request, &progress, cancel, &on_retry)
            .await;
        (
            outcome,
            progress_log.into_inner().unwrap(),
            retries.into_inner().unwrap(),
        )
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let transport = ScriptedTransport::new([Step::Ok]);
        let (outcome, progress, retries) =
            run_policy(RetryPolicy::new(3), &transport, &CancellationToken::new()).await;

        assert_eq!(
            outcome,
            ChunkOutcome::Success {
                stored: vec!["a.bin-part0".into()],
                attempts: 1
            }
        );
        assert_eq!(progress, vec![50, 100]);
        assert!(retries.is_empty());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn fail_fail_succeed() {
        let transport = ScriptedTransport::new([
            Step::Fail(TransportFailure::Network("reset".into())),
            Step::Fail(TransportFailure::Timeout),
            Step::Ok,
        ]);
        let (outcome, progress, retries) =
            run_policy(RetryPolicy::new(3), &transport, &CancellationToken::new()).await;

        assert!(matches!(outcome, ChunkOutcome::Success { attempts: 3, .. }));
        assert_eq!(transport.calls(), 3);
        assert_eq!(retries, vec![1, 2]);
        // Partial progress is reset to 0 before each retry.
        assert_eq!(progress, vec![50, 0, 50, 0, 50, 100]);
    }

    #[tokio::test]
    async fn exhausted_reports_last_failure() {
        let transport = ScriptedTransport::new([
            Step::Fail(TransportFailure::Timeout),
            Step::Fail(TransportFailure::Network("reset".into())),
            Step::Fail(server_error()),
        ]);
        let (outcome, _, retries) =
            run_policy(RetryPolicy::new(3), &transport, &CancellationToken::new()).await;

        assert_eq!(
            outcome,
            ChunkOutcome::Exhausted {
                failure: server_error(),
                attempts: 3
            }
        );
        assert_eq!(transport.calls(), 3);
        assert_eq!(retries, vec![1, 2]);
    }

    #[tokio::test]
    async fn single_attempt_policy_never_retries() {
        let transport = ScriptedTransport::always_failing(TransportFailure::Timeout);
        let (outcome, _, retries) =
            run_policy(RetryPolicy::new(0), &transport, &CancellationToken::new()).await;

        assert!(matches!(outcome, ChunkOutcome::Exhausted { attempts: 1, .. }));
        assert_eq!(transport.calls(), 1);
        assert!(retries.is_empty());
    }

    #[tokio::test]
    async fn aborted_attempt_is_not_retried() {
        let transport = ScriptedTransport::new([Step::Hang]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        let (outcome, _, retries) = run_policy(RetryPolicy::new(3), &transport, &cancel).await;
        assert_eq!(outcome, ChunkOutcome::Aborted);
        assert_eq!(transport.calls(), 1);
        assert!(retries.is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let transport = ScriptedTransport::new([Step::Ok]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (outcome, _, _) = run_policy(RetryPolicy::new(3), &transport, &cancel).await;
        assert_eq!(outcome, ChunkOutcome::Aborted);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delay_is_interruptible() {
        let transport = ScriptedTransport::always_failing(TransportFailure::Timeout);
        let policy = RetryPolicy::new(5).with_delay(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            trigger.cancel();
        });

        let (outcome, _, retries) = run_policy(policy, &transport, &cancel).await;
        assert_eq!(outcome, ChunkOutcome::Aborted);
        // Attempts at t=0 and t=30; abort lands during the second delay.
        assert_eq!(transport.calls(), 2);
        assert_eq!(retries, vec![1, 2]);
    }
}
