// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The observable-effect event model and its order-independent min-hash
//! compression into a fixed-length fingerprint.

use std::collections::HashSet;
use std::fmt;

use crate::hash::{self, FINAL_SALT, INVALID_SALT, ORDER_SALT, READ_SALT, RETURN_SALT, SYS_SALT, WRITE_SALT};

/// A single observable interaction of a function with its environment.
///
/// Events are value objects with structural equality; each variant knows
/// how to fold itself into the shared 64-bit hash space via [`Event::hash`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    Read { addr: u64 },
    Write { addr: u64, value: u64 },
    Syscall { number: u64 },
    Return { value: u64 },
    InvalidInstruction { ip: u64 },
}

impl Event {
    /// Folds this event into the shared 64-bit hash space, salted per
    /// variant. For [`Event::Write`] the two fields are chained:
    /// `h(h(write_salt, addr), value)`.
    #[must_use]
    pub fn hash(&self) -> u64 {
        match *self {
            Event::Read { addr } => hash::hash(READ_SALT, addr),
            Event::Write { addr, value } => hash::hash(hash::hash(WRITE_SALT, addr), value),
            Event::Syscall { number } => hash::hash(SYS_SALT, number),
            Event::Return { value } => hash::hash(RETURN_SALT, value),
            Event::InvalidInstruction { ip } => hash::hash(INVALID_SALT, ip),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Event::Read { addr } => write!(f, "Read([{addr:#x}])"),
            Event::Write { addr, value } => write!(f, "Write([{addr:#x}]={value:#x})"),
            Event::Syscall { number } => write!(f, "Sys({number:#x})"),
            Event::Return { value } => write!(f, "Return({value:#x})"),
            Event::InvalidInstruction { ip } => write!(f, "InvalidOpcode([{ip:#x}])"),
        }
    }
}

/// A set (membership only, no multiplicity) of [`Event`]s accumulated
/// across every trace of one function's blanket.
///
/// Deliberately a *set*, not a multiset: two functions that differ only in
/// how many times they repeat an identical operation hash identically,
/// favouring dominant-term similarity over exact operation counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventSet(HashSet<Event>);

impl EventSet {
    #[must_use]
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    /// Records an event. Returns `true` if it was not already present.
    pub fn insert(&mut self, event: Event) -> bool {
        self.0.insert(event)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.0.iter()
    }

    /// The event whose own hash maximises `h(seed, event.hash())`, or `0`
    /// if the set is empty. Ties (possible for small or adversarial sets)
    /// are broken deterministically by the event's own hash, so the
    /// result never depends on hash-set iteration order.
    fn argmax_hash(&self, seed: u64) -> u64 {
        let mut best_event_hash = 0u64;
        let mut best_score = 0u64;
        let mut any = false;
        for event in &self.0 {
            let event_hash = event.hash();
            let score = hash::hash(seed, event_hash);
            if !any || score > best_score || (score == best_score && event_hash > best_event_hash) {
                any = true;
                best_score = score;
                best_event_hash = event_hash;
            }
        }
        best_event_hash
    }

    /// Compresses this set into a fixed-length weighted min-hash
    /// fingerprint. Permutation-invariant in insertion order and stable
    /// under duplicate events by construction, since the backing storage
    /// is already a set.
    #[must_use]
    pub fn fingerprint(&self, length: usize) -> Vec<u8> {
        let mut seed = ORDER_SALT;
        let mut out = Vec::with_capacity(length);
        for _ in 0..length {
            let argmax = self.argmax_hash(seed);
            out.push((hash::hash(FINAL_SALT, argmax) & 0xff) as u8);
            seed = hash::hash(ORDER_SALT, seed);
        }
        out
    }

    /// Human-readable dump, sorted for reproducible diffing. Mirrors the
    /// original's `EventsToMinHash.Inspect`.
    #[must_use]
    pub fn inspect(&self) -> String {
        let mut parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        parts.sort();
        format!("[{}]", parts.join(", "))
    }
}

impl FromIterator<Event> for EventSet {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
