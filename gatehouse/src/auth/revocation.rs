//! Revoked session tokens.
//!
//! Each entry remembers the token's original expiry. Once that expiry has passed the token fails
//! validation on its own, so the entry can go. Expired entries are swept on revocation, at most
//! once per [`PRUNE_INTERVAL_SECONDS`], which keeps the set bounded by the number of tokens revoked
//! within one token lifetime plus one interval.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::types::TokenId;

pub const PRUNE_INTERVAL_SECONDS: i64 = 60;

#[derive(Debug, Default)]
pub struct RevokedTokens {
    /// jti -> original `exp` (unix seconds)
    entries: DashMap<TokenId, i64>,
    /// Earliest time the next sweep may run
    next_prune: AtomicI64,
}

impl RevokedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `token_id` until `expires_at`, sweeping entries that expired before `now` when a sweep
    /// is due.
    pub fn revoke(&self, token_id: TokenId, expires_at: i64, now: i64) {
        let due = self.next_prune.load(Ordering::Acquire);
        if now >= due
            && self
                .next_prune
                .compare_exchange(due, now + PRUNE_INTERVAL_SECONDS, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.entries.retain(|_, exp| *exp > now);
        }
        if expires_at > now {
            self.entries.insert(token_id, expires_at);
        }
    }

    pub fn is_revoked(&self, token_id: &TokenId) -> bool {
        self.entries.contains_key(token_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
