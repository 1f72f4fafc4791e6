use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Expect, MatchResult};

type Implementation<A, R> = Arc<dyn Fn(&A) -> R + Send + Sync>;

struct MockState<A, R> {
    calls: Vec<A>,
    implementation: Option<Implementation<A, R>>,
    return_value: Option<R>,
}

/// A call-recording stand-in function. Clones share the same record, so a
/// clone can be moved into the code under test while the original is
/// asserted on.
pub struct Mock<A, R = ()> {
    state: Arc<Mutex<MockState<A, R>>>,
}

impl<A, R> Clone for Mock<A, R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A, R> Default for Mock<A, R> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                implementation: None,
                return_value: None,
            })),
        }
    }
}

impl<A, R> Mock<A, R> {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState<A, R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn mock_implementation<F>(&self, f: F) -> &Self
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.state().implementation = Some(Arc::new(f));
        self
    }

    pub fn mock_return_value(&self, value: R) -> &Self {
        self.state().return_value = Some(value);
        self
    }

    /// Forget recorded calls; configured behavior is kept.
    pub fn reset(&self) {
        self.state().calls.clear();
    }
}

impl<A: Clone, R: Clone + Default> Mock<A, R> {
    /// Record a call and produce its return value: the implementation if one
    /// is set, else the configured return value, else `R::default()`.
    ///
    /// The implementation runs without the lock held, so it may call back
    /// into this mock or its clones.
    pub fn call(&self, args: A) -> R {
        let implementation = {
            let mut state = self.state();
            state.calls.push(args.clone());
            match state.implementation {
                Some(ref implementation) => Arc::clone(implementation),
                None => return state.return_value.clone().unwrap_or_default(),
            }
        };
        implementation(&args)
    }
}

impl<A: Clone, R> Mock<A, R> {
    pub fn calls(&self) -> Vec<A> {
        self.state().calls.clone()
    }

    pub fn last_call(&self) -> Option<A> {
        self.state().calls.last().cloned()
    }
}

impl<A, R> Debug for Mock<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl<A: Clone + PartialEq + Debug, R> Expect<&Mock<A, R>> {
    pub fn to_have_been_called(&self) -> MatchResult {
        let count = self.value.call_count();
        self.check(
            count > 0,
            "to_have_been_called",
            "to have been called",
            None,
            Some(format!("{count} calls")),
        )
    }

    pub fn to_have_been_called_times(&self, times: usize) -> MatchResult {
        let count = self.value.call_count();
        self.check(
            count == times,
            "to_have_been_called_times",
            &format!("to have been called {times} times"),
            Some(times.to_string()),
            Some(count.to_string()),
        )
    }

    /// Passes when any recorded call used `args`.
    pub fn to_have_been_called_with(&self, args: &A) -> MatchResult {
        let calls = self.value.calls();
        self.check(
            calls.contains(args),
            "to_have_been_called_with",
            &format!("to have been called with {args:?}"),
            Some(format!("{args:?}")),
            Some(format!("{calls:?}")),
        )
    }

    pub fn to_have_been_last_called_with(&self, args: &A) -> MatchResult {
        let last = self.value.last_call();
        self.check(
            last.as_ref() == Some(args),
            "to_have_been_last_called_with",
            &format!("to have been last called with {args:?}"),
            Some(format!("{args:?}")),
            Some(format!("{last:?}")),
        )
    }
}
