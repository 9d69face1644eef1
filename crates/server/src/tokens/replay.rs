//! Single-use registry for action tokens.

use crate::error::TokenError;
use dashmap::{DashMap, mapref::entry::Entry};

/// Token ids that have already been redeemed, with the expiry of the token
/// they belong to. Entries are only needed until that expiry.
#[derive(Debug, Default)]
pub struct ConsumedTokens {
    entries: DashMap<String, i64>,
}

impl ConsumedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `jti` as used. Fails if it was already recorded.
    pub fn redeem(&self, jti: &str, expires_at: i64) -> Result<(), TokenError> {
        match self.entries.entry(jti.to_owned()) {
            Entry::Occupied(_) => Err(TokenError::AlreadyUsed),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(())
            }
        }
    }

    /// Forget a redemption, e.g. when the action it guarded failed.
    pub fn release(&self, jti: &str) {
        self.entries.remove(jti);
    }

    /// Drop entries whose token has expired. Returns how many were removed.
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_redeem_is_rejected() {
        let consumed = ConsumedTokens::new();
        assert!(consumed.redeem("a", 100).is_ok());
        assert_eq!(consumed.redeem("a", 100), Err(TokenError::AlreadyUsed));
        assert!(consumed.redeem("b", 100).is_ok());
    }

    #[test]
    fn release_allows_reuse() {
        let consumed = ConsumedTokens::new();
        consumed.redeem("a", 100).unwrap();
        consumed.release("a");
        assert!(consumed.redeem("a", 100).is_ok());
    }

    #[test]
    fn purge_keeps_live_entries() {
        let consumed = ConsumedTokens::new();
        consumed.redeem("old", 10).unwrap();
        consumed.redeem("live", 1_000).unwrap();
        assert_eq!(consumed.purge_expired(500), 1);
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed.redeem("live", 1_000), Err(TokenError::AlreadyUsed));
    }
}
