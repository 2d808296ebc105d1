//! Ascending prime generation feeding the [`crate::construct::PrimeRegistry`].
//!
//! The source works like an identity generator with a lower bound: it only
//! remembers the highest prime issued so far, so restoring a registry is a
//! matter of retaining every persisted prime.

use crate::construct::Prime;

#[derive(Debug, Clone, Default)]
pub struct PrimeSource {
    lower_bound: u64,
}

impl PrimeSource {
    pub fn new() -> Self {
        Self { lower_bound: 0 }
    }
    /// Restart the sequence right after `highest`, which is the largest prime issued before.
    pub fn resume_after(highest: Prime) -> Self {
        Self {
            lower_bound: highest.get(),
        }
    }
    // Primes restored from a snapshot may arrive in any order.
    pub fn retain(&mut self, prime: Prime) {
        if prime.get() > self.lower_bound {
            self.lower_bound = prime.get();
        }
    }
    pub fn lower_bound(&self) -> u64 {
        self.lower_bound
    }
    pub fn generate(&mut self) -> Option<Prime> {
        let mut candidate = self.lower_bound.checked_add(1)?;
        while !is_prime(candidate) {
            candidate = candidate.checked_add(1)?;
        }
        self.lower_bound = candidate;
        Some(Prime::unchecked(candidate))
    }
}

impl Iterator for PrimeSource {
    type Item = Prime;
    fn next(&mut self) -> Option<Prime> {
        self.generate()
    }
}

/// Exact primality by trial division with the 6k ± 1 wheel.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut divisor = 5u64;
    while divisor <= n / divisor {
        if n % divisor == 0 || n % (divisor + 2) == 0 {
            return false;
        }
        divisor += 6;
    }
    true
}
