//! Identifier issuance contract.

use crate::id::ParticleId;

/// Source of unique particle identifiers.
///
/// Collections receive an issuer at construction and never consult any
/// process-wide state. Implementations decide their own allocation
/// policy; a collection relies only on:
///
/// - identifiers returned by [`next_id`](Self::next_id) are unique among
///   live particles and increase monotonically between calls to
///   [`set_next`](Self::set_next);
/// - every identifier handed out is returned through
///   [`release_id`](Self::release_id) exactly once, when its node is
///   destroyed or when the collection rejects it as a duplicate;
/// - after a particle is added with an explicit identifier, the issuer is
///   rebased past it with [`set_next`](Self::set_next).
///
/// The spatial arguments let location-aware issuers bucket identifiers;
/// [`SequentialIssuer`] ignores them.
pub trait IdIssuer: Send {
    /// Issue a fresh identifier for a particle at the given seed position.
    fn next_id(&mut self, lon: f64, lat: f64, depth: f64, time: f64) -> ParticleId;

    /// Return an identifier whose node has been destroyed.
    fn release_id(&mut self, id: ParticleId);

    /// Number of identifiers issued so far.
    fn total_issued(&self) -> u64;

    /// Rebase the issuer so the next identifier is at least `id`.
    fn set_next(&mut self, id: ParticleId);
}

/// Monotonic counter issuer.
///
/// Released identifiers are counted but never reissued.
#[derive(Clone, Debug, Default)]
pub struct SequentialIssuer {
    next: u64,
    issued: u64,
    released: u64,
}

impl SequentialIssuer {
    /// Issuer whose first identifier is `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issuer whose first identifier is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: first,
            ..Self::default()
        }
    }

    /// Number of identifiers returned through [`IdIssuer::release_id`].
    pub fn released(&self) -> u64 {
        self.released
    }

    /// The identifier the next call to [`IdIssuer::next_id`] will return.
    pub fn peek(&self) -> ParticleId {
        ParticleId(self.next)
    }
}

impl IdIssuer for SequentialIssuer {
    fn next_id(&mut self, _lon: f64, _lat: f64, _depth: f64, _time: f64) -> ParticleId {
        let id = ParticleId(self.next);
        self.next += 1;
        self.issued += 1;
        id
    }

    fn release_id(&mut self, _id: ParticleId) {
        self.released += 1;
    }

    fn total_issued(&self) -> u64 {
        self.issued
    }

    fn set_next(&mut self, id: ParticleId) {
        // Never move backwards: that would reissue live identifiers.
        self.next = self.next.max(id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_monotonically() {
        let mut issuer = SequentialIssuer::new();
        let a = issuer.next_id(0.0, 0.0, 0.0, 0.0);
        let b = issuer.next_id(0.0, 0.0, 0.0, 0.0);
        assert!(a < b);
        assert_eq!(issuer.total_issued(), 2);
    }

    #[test]
    fn set_next_rebases_forward_only() {
        let mut issuer = SequentialIssuer::starting_at(10);
        issuer.set_next(ParticleId(100));
        assert_eq!(issuer.peek(), ParticleId(100));
        issuer.set_next(ParticleId(5));
        assert_eq!(issuer.next_id(0.0, 0.0, 0.0, 0.0), ParticleId(100));
    }

    #[test]
    fn released_ids_are_not_reissued() {
        let mut issuer = SequentialIssuer::new();
        let a = issuer.next_id(0.0, 0.0, 0.0, 0.0);
        issuer.release_id(a);
        let b = issuer.next_id(0.0, 0.0, 0.0, 0.0);
        assert_ne!(a, b);
        assert_eq!(issuer.released(), 1);
    }
}
