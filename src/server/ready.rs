//! Ready Queue
//!
//! Each connection polls its socket readiness with a waker of its own. When
//! the reactor fires that waker, the connection's token lands in this queue
//! and the dispatcher task is woken. A wakeup then polls only the queued
//! connections, not every live one.

use crate::server::dispatcher::Token;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Wake, Waker};

#[derive(Debug, Default)]
struct State {
    tokens: Vec<Token>,
    dispatcher: Option<Waker>,
}

/// Tokens of connections that need their readiness polled.
#[derive(Debug, Default, Clone)]
pub struct ReadyQueue {
    state: Arc<Mutex<State>>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves only a token list behind.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remembers the waker of the task that drains the queue.
    pub fn register(&self, waker: &Waker) {
        let mut state = self.lock();
        match &state.dispatcher {
            Some(current) if current.will_wake(waker) => {}
            _ => state.dispatcher = Some(waker.clone()),
        }
    }

    /// Queues `token` without waking anyone.
    pub fn schedule(&self, token: Token) {
        self.lock().tokens.push(token);
    }

    /// Takes every queued token, deduplicated and in token order.
    pub fn drain(&self) -> Vec<Token> {
        let mut tokens = mem::take(&mut self.lock().tokens);
        tokens.sort_unstable();
        tokens.dedup();
        tokens
    }

    /// A waker that queues `token` and wakes the dispatcher.
    pub fn waker(&self, token: Token) -> Waker {
        Waker::from(Arc::new(TokenWaker {
            token,
            queue: self.clone(),
        }))
    }
}

struct TokenWaker {
    token: Token,
    queue: ReadyQueue,
}

impl Wake for TokenWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let dispatcher = {
            let mut state = self.queue.lock();
            state.tokens.push(self.token);
            state.dispatcher.take()
        };
        if let Some(waker) = dispatcher {
            waker.wake();
        }
    }
}
