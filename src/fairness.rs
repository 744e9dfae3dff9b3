//! Reservation tokens and the fairness queue
//!
//! A caller that fails to obtain a slot leaves a [`ReservationToken`]
//! behind. While the token is live, free slots are held back for it
//! ahead of callers that arrived later.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

/// Identity of a caller competing for pooled resources
///
/// # Examples
///
/// ```
/// use esox_resourcepool::CallerId;
///
/// let a = CallerId::from(1);
/// let b = CallerId::from(2);
/// assert!(a < b);
/// assert_eq!(a.as_u64(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallerId(u64);

impl CallerId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for CallerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One caller's outstanding wait, ordered by request time then caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReservationToken {
    pub requested_at: Instant,
    pub caller: CallerId,
}

impl ReservationToken {
    pub fn new(requested_at: Instant, caller: CallerId) -> Self {
        Self {
            requested_at,
            caller,
        }
    }

    /// Whether more than `window` has passed since the request
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.requested_at) > window
    }
}

/// Ordered set of live reservation tokens
#[derive(Debug)]
pub(crate) struct FairnessQueue {
    tokens: BTreeSet<ReservationToken>,
    expiry_window: Duration,
    overflow_bound: usize,
}

impl FairnessQueue {
    pub fn new(expiry_window: Duration, overflow_bound: usize) -> Self {
        Self {
            tokens: BTreeSet::new(),
            expiry_window,
            overflow_bound,
        }
    }

    /// Raw token count, expired and duplicate tokens included
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Distinct callers holding at least one token that is still live at
    /// `now`. Read-only, so expired tokens are skipped rather than pruned.
    pub fn waiting_callers(&self, now: Instant) -> usize {
        self.tokens
            .iter()
            .filter(|token| !token.is_expired(now, self.expiry_window))
            .map(|token| token.caller)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Drop expired tokens, then count live tokens ranked ahead of
    /// `caller`'s earliest token (all live tokens if it has none).
    pub fn priority_count(&mut self, caller: CallerId, now: Instant) -> usize {
        let removed = self.prune_expired(now);
        if removed > 0 {
            tracing::trace!(removed, "pruned expired reservation tokens");
        }

        self.tokens
            .iter()
            .take_while(|token| token.caller != caller)
            .count()
    }

    pub fn prune_expired(&mut self, now: Instant) -> usize {
        let window = self.expiry_window;
        let before = self.tokens.len();
        self.tokens.retain(|token| !token.is_expired(now, window));
        before - self.tokens.len()
    }

    /// Remove every token held by `caller`
    pub fn consume(&mut self, caller: CallerId) {
        self.tokens.retain(|token| token.caller != caller);
    }

    /// Record a failed attempt. Returns true if the queue had to be
    /// deduplicated afterwards.
    pub fn enqueue(&mut self, caller: CallerId, now: Instant) -> bool {
        self.tokens.insert(ReservationToken::new(now, caller));

        if self.tokens.len() > self.overflow_bound {
            let before = self.tokens.len();
            self.dedup();
            tracing::warn!(
                before,
                after = self.tokens.len(),
                "reservation queue overflowed, kept earliest token per caller"
            );
            return true;
        }
        false
    }

    fn dedup(&mut self) {
        let mut seen = HashSet::new();
        // BTreeSet iterates in rank order, so the first token seen per caller is its oldest.
        self.tokens.retain(|token| seen.insert(token.caller));
    }

    #[cfg(test)]
    pub fn tokens(&self) -> impl Iterator<Item = &ReservationToken> {
        self.tokens.iter()
    }
}
