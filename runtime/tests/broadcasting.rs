//! Integration tests for Store action broadcasting
//!
//! Observers see every action after it was reduced, including the ones that
//! effects feed back into the store.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use std::time::Duration;
use todosync_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use todosync_runtime::store::BROADCAST_CAPACITY;
use todosync_runtime::{Store, StoreError};
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Clone, PartialEq)]
enum SyncAction {
    /// Start a multi-step exchange
    Begin { steps: u32 },
    /// One step came back
    Step { step: u32, of: u32 },
    /// Exchange finished
    Done,
    /// Retry after a pause
    RetryLater,
    /// Plain counter bump
    Bump,
}

#[derive(Debug, Clone, Default)]
struct SyncState {
    steps: Vec<u32>,
    done: bool,
    bumps: u32,
}

#[derive(Clone)]
struct SyncEnv;

#[derive(Clone)]
struct SyncReducer;

impl Reducer for SyncReducer {
    type State = SyncState;
    type Action = SyncAction;
    type Environment = SyncEnv;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            SyncAction::Begin { steps } => {
                state.steps.clear();
                state.done = false;
                smallvec![Effect::future(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Some(SyncAction::Step { step: 1, of: steps })
                })]
            },
            SyncAction::Step { step, of } => {
                state.steps.push(step);
                let next = if step < of {
                    SyncAction::Step { step: step + 1, of }
                } else {
                    SyncAction::Done
                };
                smallvec![Effect::future(async move { Some(next) })]
            },
            SyncAction::Done => {
                state.done = true;
                smallvec![Effect::None]
            },
            SyncAction::RetryLater => smallvec![Effect::future(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some(SyncAction::Bump)
            })],
            SyncAction::Bump => {
                state.bumps += 1;
                smallvec![Effect::None]
            },
        }
    }
}

fn store() -> Store<SyncState, SyncAction, SyncEnv, SyncReducer> {
    Store::new(SyncState::default(), SyncReducer, SyncEnv)
}

#[tokio::test]
async fn feedback_chain_is_observed_in_order() {
    let store = store();
    let mut rx = store.subscribe_actions();

    store.send(SyncAction::Begin { steps: 3 }).await.unwrap();

    // Each handle only covers its own effects, so follow the chain by observation.
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(1), async {
        while let Ok(action) = rx.recv().await {
            let done = action == SyncAction::Done;
            seen.push(action);
            if done {
                break;
            }
        }
    })
    .await
    .expect("chain never finished");

    assert_eq!(
        seen,
        vec![
            SyncAction::Begin { steps: 3 },
            SyncAction::Step { step: 1, of: 3 },
            SyncAction::Step { step: 2, of: 3 },
            SyncAction::Step { step: 3, of: 3 },
            SyncAction::Done,
        ]
    );

    let (steps, done) = store.state(|s| (s.steps.clone(), s.done)).await;
    assert_eq!(steps, vec![1, 2, 3]);
    assert!(done);
}

#[tokio::test]
async fn delayed_actions_arrive_later() {
    let store = store();
    let mut handle = store.send(SyncAction::RetryLater).await.unwrap();

    assert_eq!(store.state(|s| s.bumps).await, 0);
    assert_eq!(handle.pending(), 1);

    handle
        .wait_with_timeout(Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(store.state(|s| s.bumps).await, 1);
    assert_eq!(handle.pending(), 0);
}

#[tokio::test]
async fn concurrent_senders_are_serialized() {
    let store = store();
    let senders: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.send(SyncAction::Bump).await.map(|_| ()) })
        })
        .collect();

    for sender in senders {
        sender.await.unwrap().unwrap();
    }

    assert_eq!(store.state(|s| s.bumps).await, 20);
}

#[tokio::test]
async fn slow_observers_skip_ahead() {
    let store = store();
    let mut rx = store.subscribe_actions();

    for _ in 0..BROADCAST_CAPACITY + 3 {
        store.send(SyncAction::Bump).await.unwrap();
    }

    assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
    assert_eq!(rx.recv().await.unwrap(), SyncAction::Bump);
    assert_eq!(store.state(|s| s.bumps).await, 67);
}

#[tokio::test]
async fn shutdown_waits_for_running_effects() {
    let store = store();
    store.send(SyncAction::RetryLater).await.unwrap();

    store.shutdown(Duration::from_secs(1)).await.unwrap();

    // The effect ran to completion; its feedback came after shutdown started.
    assert_eq!(store.state(|s| s.bumps).await, 0);
    assert!(matches!(
        store.send(SyncAction::Bump).await,
        Err(StoreError::ShutdownInProgress)
    ));
}
