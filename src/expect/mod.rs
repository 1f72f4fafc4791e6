//! The matcher capability test bodies use.
//!
//! A matcher returns `Ok(())` when its condition holds and a
//! [`MatcherFailure`] otherwise. `?` lifts the failure into the body's
//! `anyhow::Error`, and the runner reads `expected`/`received` back out.

pub mod mock;

use std::fmt::Debug;

use regex::Regex;
use thiserror::Error;

pub use mock::Mock;

/// Structured failure raised by a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MatcherFailure {
    pub message: String,
    pub matcher_name: String,
    pub expected: Option<String>,
    pub received: Option<String>,
}

pub type MatchResult = Result<(), MatcherFailure>;

pub fn expect<T>(value: T) -> Expect<T> {
    Expect {
        value,
        negated: false,
    }
}

#[derive(Debug)]
pub struct Expect<T> {
    value: T,
    negated: bool,
}

impl<T> Expect<T> {
    /// Invert the next matcher.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn check(
        &self,
        pass: bool,
        matcher: &str,
        description: &str,
        expected: Option<String>,
        received: Option<String>,
    ) -> MatchResult {
        if pass != self.negated {
            return Ok(());
        }
        let not = if self.negated { "not " } else { "" };
        let message = match &received {
            Some(received) => format!("expected {received} {not}{description}"),
            None => format!("expected value {not}{description}"),
        };
        Err(MatcherFailure {
            message,
            matcher_name: matcher.to_string(),
            expected,
            received,
        })
    }
}

impl<T: Debug> Expect<T> {
    fn received(&self) -> Option<String> {
        Some(format!("{:?}", self.value))
    }

    pub fn to_be<U>(&self, expected: U) -> MatchResult
    where
        T: PartialEq<U>,
        U: Debug,
    {
        self.check(
            self.value == expected,
            "to_be",
            &format!("to be {expected:?}"),
            Some(format!("{expected:?}")),
            self.received(),
        )
    }

    pub fn to_be_greater_than<U>(&self, bound: U) -> MatchResult
    where
        T: PartialOrd<U>,
        U: Debug,
    {
        self.check(
            self.value > bound,
            "to_be_greater_than",
            &format!("to be greater than {bound:?}"),
            Some(format!("> {bound:?}")),
            self.received(),
        )
    }

    pub fn to_be_less_than<U>(&self, bound: U) -> MatchResult
    where
        T: PartialOrd<U>,
        U: Debug,
    {
        self.check(
            self.value < bound,
            "to_be_less_than",
            &format!("to be less than {bound:?}"),
            Some(format!("< {bound:?}")),
            self.received(),
        )
    }
}

impl Expect<bool> {
    pub fn to_be_truthy(&self) -> MatchResult {
        self.check(self.value, "to_be_truthy", "to be truthy", None, Some(self.value.to_string()))
    }

    pub fn to_be_falsy(&self) -> MatchResult {
        self.check(!self.value, "to_be_falsy", "to be falsy", None, Some(self.value.to_string()))
    }
}

impl<V: Debug> Expect<Option<V>> {
    pub fn to_be_some(&self) -> MatchResult {
        self.check(self.value.is_some(), "to_be_some", "to be Some(..)", None, self.received())
    }

    pub fn to_be_none(&self) -> MatchResult {
        self.check(self.value.is_none(), "to_be_none", "to be None", None, self.received())
    }
}

impl<V: Debug, E: Debug> Expect<Result<V, E>> {
    pub fn to_be_ok(&self) -> MatchResult {
        self.check(self.value.is_ok(), "to_be_ok", "to be Ok(..)", None, self.received())
    }

    pub fn to_be_err(&self) -> MatchResult {
        self.check(self.value.is_err(), "to_be_err", "to be Err(..)", None, self.received())
    }
}

impl<T: AsRef<str>> Expect<T> {
    pub fn to_contain(&self, needle: &str) -> MatchResult {
        let haystack = self.value.as_ref();
        self.check(
            haystack.contains(needle),
            "to_contain",
            &format!("to contain {needle:?}"),
            Some(needle.to_string()),
            Some(format!("{haystack:?}")),
        )
    }

    /// Match against a regular expression. An invalid pattern fails the
    /// matcher regardless of negation.
    pub fn to_match(&self, pattern: &str) -> MatchResult {
        let haystack = self.value.as_ref();
        let regex = Regex::new(pattern).map_err(|e| MatcherFailure {
            message: format!("invalid pattern {pattern:?}: {e}"),
            matcher_name: "to_match".to_string(),
            expected: Some(pattern.to_string()),
            received: None,
        })?;
        self.check(
            regex.is_match(haystack),
            "to_match",
            &format!("to match /{pattern}/"),
            Some(pattern.to_string()),
            Some(format!("{haystack:?}")),
        )
    }
}

impl<V: PartialEq + Debug> Expect<Vec<V>> {
    pub fn to_contain_item(&self, item: &V) -> MatchResult {
        self.check(
            self.value.contains(item),
            "to_contain_item",
            &format!("to contain {item:?}"),
            Some(format!("{item:?}")),
            Some(format!("{:?}", self.value)),
        )
    }

    pub fn to_have_length(&self, length: usize) -> MatchResult {
        self.check(
            self.value.len() == length,
            "to_have_length",
            &format!("to have length {length}"),
            Some(length.to_string()),
            Some(self.value.len().to_string()),
        )
    }
}
