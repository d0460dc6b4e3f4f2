//! Build-once cache with a shared in-flight build.
//!
//! A [`Cache`] owns a loader and produces its value at most once. The first
//! caller of [`Cache::get`] starts the loader; callers that arrive while it
//! runs await the same shared future instead of starting their own. A
//! successful build is kept for the cache's lifetime. A failed build is not:
//! every caller waiting on it sees the same error, the slot returns to empty,
//! and the next call starts a fresh build.
//!
//! ```text
//!   Empty ──get──▶ Building(gen) ──ok──▶ Ready(Arc<T>)
//!     ▲                 │
//!     └──────err────────┘
//! ```
//!
//! The mutex is only held to inspect or swap the slot, never across an await.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::error::Result;

type BuildFuture<T> = BoxFuture<'static, Result<Arc<T>>>;
type Loader<T> = Arc<dyn Fn() -> BuildFuture<T> + Send + Sync>;

enum Slot<T> {
    Empty,
    Building {
        generation: u64,
        build: Shared<BuildFuture<T>>,
    },
    Ready(Arc<T>),
}

struct State<T> {
    slot: Slot<T>,
    next_generation: u64,
}

pub struct Cache<T> {
    name: &'static str,
    loader: Loader<T>,
    state: Mutex<State<T>>,
}

impl<T: Send + Sync + 'static> Cache<T> {
    /// Create an empty cache. Nothing runs until the first [`Cache::get`].
    pub fn new<F, Fut>(name: &'static str, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let loader: Loader<T> = Arc::new(move || {
            let build = loader();
            async move { build.await.map(Arc::new) }.boxed()
        });
        Self {
            name,
            loader,
            state: Mutex::new(State {
                slot: Slot::Empty,
                next_generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached value, building it first if needed.
    pub async fn get(&self) -> Result<Arc<T>> {
        let (generation, build) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match &state.slot {
                Slot::Ready(value) => return Ok(Arc::clone(value)),
                Slot::Building { generation, build } => (*generation, build.clone()),
                Slot::Empty => {
                    let generation = state.next_generation;
                    state.next_generation += 1;
                    debug!(cache = self.name, generation, "starting build");
                    let build = (self.loader)().shared();
                    state.slot = Slot::Building {
                        generation,
                        build: build.clone(),
                    };
                    (generation, build)
                }
            }
        };

        let result = build.await;

        let mut state = self.lock();
        let current = matches!(
            &state.slot,
            Slot::Building { generation: g, .. } if *g == generation
        );
        if current {
            state.slot = match &result {
                Ok(value) => Slot::Ready(Arc::clone(value)),
                Err(err) => {
                    warn!(cache = self.name, generation, error = %err, "build failed");
                    Slot::Empty
                }
            };
        }
        result
    }

    /// The value if a build has already succeeded. Never starts a build.
    pub fn peek(&self) -> Option<Arc<T>> {
        match &self.lock().slot {
            Slot::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.peek().is_some()
    }

    /// Drop the cached value so the next [`Cache::get`] rebuilds.
    ///
    /// Takes `&mut self`: no build can be in flight while the caller holds
    /// exclusive access.
    pub fn reset(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.slot = Slot::Empty;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
