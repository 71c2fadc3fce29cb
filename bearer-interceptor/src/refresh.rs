/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Coordinates token refresh across concurrent requests.
//!
//! All state transitions happen under a single mutex that is never held
//! across an await point. Provider calls run outside the critical section:
//! the initial load on the caller's task behind an async init lock, and each
//! refresh on a spawned task so that it keeps running for the other waiters
//! even if the request that started it is cancelled.

use crate::error::InterceptError;
use bearer_credentials::provider::ProvideToken;
use bearer_credentials::{SharedTokenProvider, Token, TokenError};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const POISONED: &str = "token state lock cannot be poisoned";

/// Counts successful refreshes. Once a generation is observed, the store
/// never moves to a lower one.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub(crate) struct Generation(u64);

impl Generation {
    fn next(self) -> Generation {
        Generation(self.0 + 1)
    }
}

/// A token together with the generation that produced it.
#[derive(Clone, Debug)]
pub(crate) struct Refreshed {
    pub(crate) token: Token,
    pub(crate) generation: Generation,
}

type RefreshResult = Result<Refreshed, TokenError>;

/// The single in-flight refresh.
///
/// While a slot exists, the current generation equals the generation the slot
/// was created for: only the refresh task advances the generation, and it
/// clears the slot in the same critical section.
#[derive(Debug)]
struct RefreshSlot {
    /// Distinguishes this slot from earlier slots for the same generation
    /// (possible after a failed refresh), so a cancelled waiter never
    /// decrements a slot it did not join.
    seq: u64,
    /// Requests attached to the slot beyond the one that created it.
    followers: usize,
    sender: broadcast::Sender<RefreshResult>,
}

#[derive(Debug, Default)]
struct State {
    token: Option<Token>,
    generation: Generation,
    initialized: bool,
    refresh: Option<RefreshSlot>,
    next_slot_seq: u64,
}

/// Owns the current token, its generation, and the in-flight refresh.
#[derive(Debug)]
pub(crate) struct TokenStore {
    state: Arc<Mutex<State>>,
    /// Serializes the initial load without blocking the state mutex.
    init_lock: tokio::sync::Mutex<()>,
    provider: SharedTokenProvider,
    queue_size: usize,
}

impl TokenStore {
    pub(crate) fn new(provider: SharedTokenProvider, queue_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            init_lock: tokio::sync::Mutex::new(()),
            provider,
            queue_size,
        }
    }

    /// Runs the initial token load if it has not succeeded yet.
    ///
    /// Concurrent first requests serialize on the init lock; the load itself
    /// runs at most once per successful initialization. A failed load leaves
    /// the store uninitialized so a later request retries it.
    pub(crate) async fn ensure_initialized(&self) -> Result<(), InterceptError> {
        if self.state.lock().expect(POISONED).initialized {
            return Ok(());
        }
        let _init = self.init_lock.lock().await;
        if self.state.lock().expect(POISONED).initialized {
            return Ok(());
        }
        let token = self
            .provider
            .provide_initial_token()
            .await
            .map_err(InterceptError::InitialLoad)?;
        tracing::debug!(present = token.is_some(), "loaded initial bearer token");
        let mut state = self.state.lock().expect(POISONED);
        state.token = token;
        state.initialized = true;
        Ok(())
    }

    /// Returns the current token and generation, read atomically.
    pub(crate) fn snapshot(&self) -> (Option<Token>, Generation) {
        let state = self.state.lock().expect(POISONED);
        (state.token.clone(), state.generation)
    }

    /// Produces a token newer than `stale_generation`.
    ///
    /// If a newer generation already exists, it is returned without touching
    /// the provider. Otherwise the caller either starts the refresh (leader)
    /// or attaches to the one in flight (follower), and both observe the same
    /// published outcome. At most `queue_size` followers may attach; surplus
    /// callers fail with [`InterceptError::QueueFull`] without waiting.
    pub(crate) async fn refresh(
        &self,
        stale_generation: Generation,
    ) -> Result<Refreshed, InterceptError> {
        let (mut receiver, _follower) = {
            let mut state = self.state.lock().expect(POISONED);
            if state.generation > stale_generation {
                let token = state
                    .token
                    .clone()
                    .expect("an advanced generation always carries a token");
                tracing::trace!(
                    stale = stale_generation.0,
                    current = state.generation.0,
                    "refresh already superseded"
                );
                return Ok(Refreshed {
                    token,
                    generation: state.generation,
                });
            }
            match state.refresh.as_mut() {
                Some(slot) => {
                    if slot.followers >= self.queue_size {
                        return Err(InterceptError::QueueFull);
                    }
                    slot.followers += 1;
                    let receiver = slot.sender.subscribe();
                    let follower = FollowerGuard {
                        state: Arc::clone(&self.state),
                        slot_seq: slot.seq,
                    };
                    (receiver, Some(follower))
                }
                None => {
                    let (sender, receiver) = broadcast::channel(1);
                    let seq = state.next_slot_seq;
                    state.next_slot_seq += 1;
                    state.refresh = Some(RefreshSlot {
                        seq,
                        followers: 0,
                        sender: sender.clone(),
                    });
                    let previous = state.token.as_ref().map(|token| token.token().to_owned());
                    tracing::debug!(generation = stale_generation.0, "starting bearer token refresh");
                    self.spawn_refresh(previous, sender);
                    (receiver, None)
                }
            }
        };

        match receiver.recv().await {
            Ok(Ok(refreshed)) => Ok(refreshed),
            Ok(Err(err)) => Err(InterceptError::Refresh(err)),
            Err(_) => Err(InterceptError::Refresh(TokenError::new(
                "the token refresh was abandoned before it produced a result",
            ))),
        }
    }

    /// Runs the provider refresh on its own task so that it completes on
    /// behalf of the waiters even if the request that started it goes away.
    fn spawn_refresh(&self, previous: Option<String>, sender: broadcast::Sender<RefreshResult>) {
        let state = Arc::clone(&self.state);
        let provider = self.provider.clone();
        tokio::spawn(async move {
            let result = provider.refresh_token(previous.as_deref()).await;
            let mut state = state.lock().expect(POISONED);
            state.refresh = None;
            let outcome = match result {
                Ok(token) => {
                    state.generation = state.generation.next();
                    state.token = Some(token.clone());
                    tracing::debug!(generation = state.generation.0, "bearer token refresh complete");
                    Ok(Refreshed {
                        token,
                        generation: state.generation,
                    })
                }
                Err(err) => Err(err),
            };
            // Publish while still holding the lock so that every waiter
            // admitted under the same lock observes this outcome.
            let _ = sender.send(outcome);
        });
    }
}

/// Frees a follower's admission slot when its wait ends, including when the
/// waiting request is cancelled mid-refresh.
#[derive(Debug)]
struct FollowerGuard {
    state: Arc<Mutex<State>>,
    slot_seq: u64,
}

impl Drop for FollowerGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(slot) = state.refresh.as_mut() {
                if slot.seq == self.slot_seq {
                    slot.followers -= 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearer_credentials::provider::future;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Produces tokens "0", "1", "2", … and records each `previous` argument.
    #[derive(Debug)]
    struct CountingProvider {
        initial: Option<Token>,
        next_value: AtomicU64,
        previous_args: Mutex<Vec<Option<String>>>,
        refresh_delay: Option<Duration>,
        refresh_error: Option<TokenError>,
    }

    impl CountingProvider {
        fn new(initial: Option<Token>, first_refresh_value: u64) -> Self {
            Self {
                initial,
                next_value: AtomicU64::new(first_refresh_value),
                previous_args: Mutex::new(Vec::new()),
                refresh_delay: None,
                refresh_error: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.refresh_delay = Some(delay);
            self
        }

        fn with_error(mut self, error: TokenError) -> Self {
            self.refresh_error = Some(error);
            self
        }

        fn refresh_calls(&self) -> usize {
            self.previous_args.lock().unwrap().len()
        }
    }

    impl ProvideToken for CountingProvider {
        fn provide_initial_token<'a>(&'a self) -> future::ProvideInitialToken<'a>
        where
            Self: 'a,
        {
            future::ProvideInitialToken::ready(Ok(self.initial.clone()))
        }

        fn refresh_token<'a>(&'a self, previous: Option<&'a str>) -> future::RefreshToken<'a>
        where
            Self: 'a,
        {
            self.previous_args
                .lock()
                .unwrap()
                .push(previous.map(str::to_owned));
            if let Some(err) = self.refresh_error.clone() {
                return future::RefreshToken::ready(Err(err));
            }
            let value = self.next_value.fetch_add(1, Ordering::SeqCst).to_string();
            match self.refresh_delay {
                Some(delay) => future::RefreshToken::new(async move {
                    tokio::time::sleep(delay).await;
                    Ok(Token::from(value))
                }),
                None => future::RefreshToken::ready(Ok(Token::from(value))),
            }
        }
    }

    fn store_with(provider: Arc<CountingProvider>, queue_size: usize) -> TokenStore {
        TokenStore::new(
            SharedTokenProvider::from(provider as Arc<dyn ProvideToken>),
            queue_size,
        )
    }

    #[tokio::test]
    async fn generation_gating_skips_superseded_refresh() {
        let provider = Arc::new(CountingProvider::new(Some(Token::from("0")), 1));
        let store = store_with(provider.clone(), 1);
        store.ensure_initialized().await.unwrap();

        let first = store.refresh(Generation(0)).await.unwrap();
        assert_eq!("1", first.token.token());
        assert_eq!(Generation(1), first.generation);

        // A second request still holding generation 0 observes the newer
        // token without a provider call.
        let gated = store.refresh(Generation(0)).await.unwrap();
        assert_eq!("1", gated.token.token());
        assert_eq!(Generation(1), gated.generation);
        assert_eq!(1, provider.refresh_calls());
    }

    #[tokio::test]
    async fn generations_are_monotonic() {
        let provider = Arc::new(CountingProvider::new(Some(Token::from("0")), 1));
        let store = store_with(provider.clone(), 1);
        store.ensure_initialized().await.unwrap();

        let mut last = Generation(0);
        for expected in ["1", "2", "3"] {
            let refreshed = store.refresh(last).await.unwrap();
            assert_eq!(expected, refreshed.token.token());
            assert!(refreshed.generation > last);
            assert_eq!(last.next(), refreshed.generation);
            last = refreshed.generation;
        }
        assert_eq!(
            vec![Some("0".to_owned()), Some("1".to_owned()), Some("2".to_owned())],
            provider.previous_args.lock().unwrap().clone()
        );
    }

    #[tokio::test]
    async fn failed_refresh_leaves_state_unchanged() {
        let provider = Arc::new(
            CountingProvider::new(Some(Token::from("0")), 1)
                .with_error(TokenError::new("rejected")),
        );
        let store = store_with(provider.clone(), 1);
        store.ensure_initialized().await.unwrap();

        let err = store.refresh(Generation(0)).await.unwrap_err();
        assert!(matches!(err, InterceptError::Refresh(_)));
        let (token, generation) = store.snapshot();
        assert_eq!("0", token.unwrap().token());
        assert_eq!(Generation(0), generation);

        // The slot is cleared, so the next caller starts a fresh refresh.
        let err = store.refresh(Generation(0)).await.unwrap_err();
        assert!(matches!(err, InterceptError::Refresh(_)));
        assert_eq!(2, provider.refresh_calls());
    }

    #[tokio::test(start_paused = true)]
    async fn surplus_waiters_fail_fast() {
        let provider = Arc::new(
            CountingProvider::new(Some(Token::from("0")), 1)
                .with_delay(Duration::from_millis(100)),
        );
        let store = Arc::new(store_with(provider.clone(), 1));
        store.ensure_initialized().await.unwrap();

        let leader = tokio::spawn({
            let store = store.clone();
            async move { store.refresh(Generation(0)).await }
        });
        let follower = tokio::spawn({
            let store = store.clone();
            async move { store.refresh(Generation(0)).await }
        });
        // Let the leader create the slot and the follower attach.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = store.refresh(Generation(0)).await.unwrap_err();
        assert!(matches!(err, InterceptError::QueueFull));

        assert_eq!("1", leader.await.unwrap().unwrap().token.token());
        assert_eq!("1", follower.await.unwrap().unwrap().token.token());
        assert_eq!(1, provider.refresh_calls());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_follower_frees_its_admission_slot() {
        let provider = Arc::new(
            CountingProvider::new(Some(Token::from("0")), 1)
                .with_delay(Duration::from_millis(100)),
        );
        let store = Arc::new(store_with(provider.clone(), 1));
        store.ensure_initialized().await.unwrap();

        let leader = tokio::spawn({
            let store = store.clone();
            async move { store.refresh(Generation(0)).await }
        });
        let follower = tokio::spawn({
            let store = store.clone();
            async move { store.refresh(Generation(0)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        follower.abort();
        assert!(follower.await.unwrap_err().is_cancelled());
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The cancelled follower's slot is free again.
        let late = tokio::spawn({
            let store = store.clone();
            async move { store.refresh(Generation(0)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!("1", leader.await.unwrap().unwrap().token.token());
        assert_eq!("1", late.await.unwrap().unwrap().token.token());
        assert_eq!(1, provider.refresh_calls());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_leader_does_not_cancel_the_refresh() {
        let provider = Arc::new(
            CountingProvider::new(Some(Token::from("0")), 1)
                .with_delay(Duration::from_millis(100)),
        );
        let store = Arc::new(store_with(provider.clone(), 1));
        store.ensure_initialized().await.unwrap();

        let leader = tokio::spawn({
            let store = store.clone();
            async move { store.refresh(Generation(0)).await }
        });
        let follower = tokio::spawn({
            let store = store.clone();
            async move { store.refresh(Generation(0)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        let refreshed = follower.await.unwrap().unwrap();
        assert_eq!("1", refreshed.token.token());
        assert_eq!(Generation(1), refreshed.generation);
        assert_eq!(1, provider.refresh_calls());
    }

    #[tokio::test]
    async fn initial_load_failure_is_retried_by_the_next_caller() {
        #[derive(Debug)]
        struct FlakyInit {
            attempts: AtomicU64,
        }

        impl ProvideToken for FlakyInit {
            fn provide_initial_token<'a>(&'a self) -> future::ProvideInitialToken<'a>
            where
                Self: 'a,
            {
                if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    future::ProvideInitialToken::ready(Err(TokenError::new("store offline")))
                } else {
                    future::ProvideInitialToken::ready(Ok(Some(Token::from("recovered"))))
                }
            }

            fn refresh_token<'a>(&'a self, _previous: Option<&'a str>) -> future::RefreshToken<'a>
            where
                Self: 'a,
            {
                future::RefreshToken::ready(Err(TokenError::new("unused")))
            }
        }

        let store = TokenStore::new(
            SharedTokenProvider::new(FlakyInit {
                attempts: AtomicU64::new(0),
            }),
            1,
        );

        let err = store.ensure_initialized().await.unwrap_err();
        assert!(matches!(err, InterceptError::InitialLoad(_)));

        store.ensure_initialized().await.unwrap();
        let (token, generation) = store.snapshot();
        assert_eq!("recovered", token.unwrap().token());
        assert_eq!(Generation(0), generation);
    }
}
