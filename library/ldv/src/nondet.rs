// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The nondeterminism oracle the models draw their unconstrained choices from.
//!
//! A [`NondetSource`] only has to supply three primitive draws. The `undef_*` helpers map those
//! draws onto the ranges the kernel models ask for, so the range contract holds for every
//! source: a model checker's symbolic values, a property test's random values, the explorer's
//! enumerated values, or a replayed trace.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Supplies values the models treat as "anything the environment could have chosen".
pub trait NondetSource {
    fn any_bool(&mut self) -> bool;
    fn any_i32(&mut self) -> i32;
    fn any_usize(&mut self) -> usize;

    /// An arbitrary `int`.
    fn undef_int(&mut self) -> i32 {
        self.any_i32()
    }

    /// An arbitrary `int` strictly below zero.
    fn undef_int_negative(&mut self) -> i32 {
        let value = self.any_i32();
        if value < 0 { value } else { -1 - value }
    }

    /// An arbitrary `int` no greater than zero.
    fn undef_int_nonpositive(&mut self) -> i32 {
        let value = self.any_i32();
        if value <= 0 { value } else { -value }
    }

    /// An arbitrary `int` strictly above zero.
    fn undef_int_positive(&mut self) -> i32 {
        let value = self.any_i32();
        if value > 0 { value } else { value.wrapping_neg().max(1) }
    }

    /// An arbitrary pointer value, null included.
    fn undef_ptr(&mut self) -> usize {
        self.any_usize()
    }

    fn undef_ptr_non_null(&mut self) -> usize {
        self.any_usize().max(1)
    }
}

impl<S: NondetSource + ?Sized> NondetSource for &mut S {
    fn any_bool(&mut self) -> bool {
        (**self).any_bool()
    }

    fn any_i32(&mut self) -> i32 {
        (**self).any_i32()
    }

    fn any_usize(&mut self) -> usize {
        (**self).any_usize()
    }
}

/// One recorded draw from a [`NondetSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Choice {
    Bool(bool),
    Int(i32),
    Ptr(usize),
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Choice::Bool(value) => write!(f, "bool={value}"),
            Choice::Int(value) => write!(f, "int={value}"),
            Choice::Ptr(value) => write!(f, "ptr={value:#x}"),
        }
    }
}

/// Plays back a fixed sequence of choices, e.g. a counterexample trace or values generated by
/// a property test.
///
/// Draws take the next value in order, converting it to the requested type. Once the sequence
/// is exhausted every further draw yields zero (or `false`), and the number of such draws is
/// counted so a caller can tell the trace did not cover the whole run.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    values: VecDeque<Choice>,
    missing: usize,
}

impl ReplaySource {
    pub fn new(values: impl IntoIterator<Item = Choice>) -> Self {
        ReplaySource { values: values.into_iter().collect(), missing: 0 }
    }

    /// Replay raw words; each word serves whatever type the next draw asks for.
    pub fn from_words(words: impl IntoIterator<Item = u64>) -> Self {
        Self::new(words.into_iter().map(|word| Choice::Ptr(word as usize)))
    }

    /// Choices that were never drawn.
    pub fn leftover(&self) -> usize {
        self.values.len()
    }

    /// Draws made after the sequence ran out.
    pub fn missing(&self) -> usize {
        self.missing
    }

    fn next(&mut self) -> Option<Choice> {
        let next = self.values.pop_front();
        if next.is_none() {
            self.missing += 1;
        }
        next
    }
}

impl NondetSource for ReplaySource {
    fn any_bool(&mut self) -> bool {
        match self.next() {
            Some(Choice::Bool(value)) => value,
            Some(Choice::Int(value)) => value != 0,
            Some(Choice::Ptr(value)) => value & 1 == 1,
            None => false,
        }
    }

    fn any_i32(&mut self) -> i32 {
        match self.next() {
            Some(Choice::Bool(value)) => value as i32,
            Some(Choice::Int(value)) => value,
            Some(Choice::Ptr(value)) => value as i32,
            None => 0,
        }
    }

    fn any_usize(&mut self) -> usize {
        match self.next() {
            Some(Choice::Bool(value)) => value as usize,
            Some(Choice::Int(value)) => value as usize,
            Some(Choice::Ptr(value)) => value,
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_range_helpers() {
        for raw in [0, 1, -1, 7, -7, i32::MAX, i32::MIN] {
            let mut source = ReplaySource::new([Choice::Int(raw)]);
            assert!(source.undef_int_negative() < 0, "negative from {raw}");
            let mut source = ReplaySource::new([Choice::Int(raw)]);
            assert!(source.undef_int_nonpositive() <= 0, "nonpositive from {raw}");
            let mut source = ReplaySource::new([Choice::Int(raw)]);
            assert!(source.undef_int_positive() > 0, "positive from {raw}");
        }
    }

    #[test]
    fn check_replay_order_and_exhaustion() {
        let mut source = ReplaySource::new([Choice::Bool(true), Choice::Int(-4), Choice::Ptr(0)]);
        assert!(source.any_bool());
        assert_eq!(source.undef_int(), -4);
        assert_eq!(source.undef_ptr_non_null(), 1);
        assert_eq!(source.leftover(), 0);
        assert_eq!(source.missing(), 0);

        assert!(!source.any_bool());
        assert_eq!(source.any_i32(), 0);
        assert_eq!(source.missing(), 2);
    }

    #[test]
    fn check_replay_words() {
        let mut source = ReplaySource::from_words([3, 2, u64::from(u32::MAX)]);
        assert!(source.any_bool());
        assert!(!source.any_bool());
        assert_eq!(source.any_i32(), -1);
    }
}
