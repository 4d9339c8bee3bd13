#![warn(missing_docs, unused_imports)]

//! Ring operations for moduli up to 62 bits.

pub mod factor;
pub mod poly;
pub mod primes;

use std::ops::Deref;

use crate::errors::{Error, Result};
use itertools::Itertools;
use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{cast::ToPrimitive, Zero};
use rand::{distributions::Uniform, CryptoRng, Rng, RngCore};

/// cond ? on_true : on_false
const fn const_time_cond_select(on_true: u64, on_false: u64, cond: bool) -> u64 {
    let mask = -(cond as i64) as u64;
    let diff = on_true ^ on_false;
    (diff & mask) ^ on_false
}

/// Structure encapsulating an integer modulus up to 62 bits.
#[derive(Debug, Clone)]
pub struct Modulus {
    pub(crate) p: u64,
    barrett_hi: u64,
    barrett_lo: u64,
    distribution: Uniform<u64>,
}

// We need to declare Eq manually because of the `Uniform` member.
impl Eq for Modulus {}

impl PartialEq for Modulus {
    fn eq(&self, other: &Self) -> bool {
        self.p == other.p
    }
}

// Override the dereference to return the underlying modulus.
impl Deref for Modulus {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.p
    }
}

impl Modulus {
    /// Create a modulus from an integer of at most 62 bits.
    pub fn new(p: u64) -> Result<Self> {
        if p < 2 || (p >> 62) != 0 {
            Err(Error::InvalidModulus(p))
        } else {
            let barrett = ((BigUint::from(1u64) << 128usize) / p)
                .to_u128()
                .ok_or(Error::InvalidModulus(p))?; // 2^128 / p
            Ok(Self {
                p,
                barrett_hi: (barrett >> 64) as u64,
                barrett_lo: barrett as u64,
                distribution: Uniform::new(0, p),
            })
        }
    }

    /// Returns the value of the modulus.
    #[must_use]
    pub const fn modulus(&self) -> u64 {
        self.p
    }

    /// Performs the modular addition of a and b in constant time.
    /// Aborts if a >= p or b >= p in debug mode.
    #[must_use]
    pub const fn add(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        Self::reduce1(a + b, self.p)
    }

    /// Performs the modular subtraction of a and b in constant time.
    /// Aborts if a >= p or b >= p in debug mode.
    #[must_use]
    pub const fn sub(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        Self::reduce1(a + self.p - b, self.p)
    }

    /// Performs the modular multiplication of a and b in constant time.
    /// Aborts if a >= p or b >= p in debug mode.
    #[must_use]
    pub const fn mul(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        self.reduce_u128((a as u128) * (b as u128))
    }

    /// Modular negation in constant time.
    ///
    /// Aborts if a >= p in debug mode.
    #[must_use]
    pub const fn neg(&self, a: u64) -> u64 {
        debug_assert!(a < self.p);
        Self::reduce1(self.p - a, self.p)
    }

    /// Modular addition of vectors in place in constant time.
    ///
    /// Aborts if a and b differ in size, and if any of their values is >= p in
    /// debug mode.
    pub fn add_vec(&self, a: &mut [u64], b: &[u64]) {
        debug_assert_eq!(a.len(), b.len());
        a.iter_mut().zip(b).for_each(|(ai, bi)| *ai = self.add(*ai, *bi))
    }

    /// Modular subtraction of vectors in place in constant time.
    ///
    /// Aborts if a and b differ in size, and if any of their values is >= p in
    /// debug mode.
    pub fn sub_vec(&self, a: &mut [u64], b: &[u64]) {
        debug_assert_eq!(a.len(), b.len());
        a.iter_mut().zip(b).for_each(|(ai, bi)| *ai = self.sub(*ai, *bi))
    }

    /// Modular multiplication of vectors in place in constant time.
    ///
    /// Aborts if a and b differ in size, and if any of their values is >= p in
    /// debug mode.
    pub fn mul_vec(&self, a: &mut [u64], b: &[u64]) {
        debug_assert_eq!(a.len(), b.len());
        a.iter_mut().zip(b).for_each(|(ai, bi)| *ai = self.mul(*ai, *bi))
    }

    /// Modular scalar multiplication of vectors in place in constant time.
    ///
    /// Aborts if any of the values in a is >= p in debug mode.
    pub fn scalar_mul_vec(&self, a: &mut [u64], b: u64) {
        let b = self.reduce(b);
        a.iter_mut().for_each(|ai| *ai = self.mul(*ai, b))
    }

    /// Modular negation of a vector in place in constant time.
    ///
    /// Aborts if any of the values in the vector is >= p in debug mode.
    pub fn neg_vec(&self, a: &mut [u64]) {
        a.iter_mut().for_each(|ai| *ai = self.neg(*ai))
    }

    /// Modular exponentiation in variable time.
    ///
    /// Aborts if a >= p in debug mode.
    #[must_use]
    pub fn pow(&self, a: u64, n: u64) -> u64 {
        debug_assert!(a < self.p);

        let mut r = 1;
        let mut base = a;
        let mut n = n;
        while n > 0 {
            if n & 1 == 1 {
                r = self.mul(r, base);
            }
            base = self.mul(base, base);
            n >>= 1;
        }
        self.reduce(r)
    }

    /// Modular inversion in variable time.
    ///
    /// Returns None if a is not invertible modulo p.
    /// Aborts if a >= p in debug mode.
    #[must_use]
    pub fn inv(&self, a: u64) -> std::option::Option<u64> {
        debug_assert!(a < self.p);
        let e = (a as i128).extended_gcd(&(self.p as i128));
        if e.gcd != 1 {
            None
        } else {
            let r = e.x.rem_euclid(self.p as i128) as u64;
            debug_assert_eq!(self.mul(a, r), 1);
            Some(r)
        }
    }

    /// Modular reduction of a u128 in constant time.
    #[must_use]
    pub const fn reduce_u128(&self, a: u128) -> u64 {
        Self::reduce1(self.lazy_reduce_u128(a), self.p)
    }

    /// Modular reduction of a u64 in constant time.
    #[must_use]
    pub const fn reduce(&self, a: u64) -> u64 {
        Self::reduce1(self.lazy_reduce(a), self.p)
    }

    /// Modular reduction of a i64 in constant time.
    #[must_use]
    pub const fn reduce_i64(&self, a: i64) -> u64 {
        self.reduce_u128((((self.p as i128) << 64) + (a as i128)) as u128)
    }

    /// Modular reduction of an arbitrary precision integer.
    #[must_use]
    pub fn reduce_bigint(&self, a: &BigInt) -> u64 {
        let r = (a.magnitude() % self.p).to_u64().unwrap_or_default();
        if a.sign() == Sign::Minus && r != 0 {
            self.p - r
        } else {
            r
        }
    }

    /// Modular reduction of an arbitrary precision unsigned integer.
    #[must_use]
    pub fn reduce_biguint(&self, a: &BigUint) -> u64 {
        (a % self.p).to_u64().unwrap_or_default()
    }

    /// Return the representative of a in (-p/2, p/2].
    ///
    /// Aborts if a >= p in debug mode.
    #[must_use]
    pub const fn center(&self, a: u64) -> i64 {
        debug_assert!(a < self.p);
        if a > self.p / 2 {
            (a as i64) - (self.p as i64)
        } else {
            a as i64
        }
    }

    /// Return x mod p in constant time.
    /// Aborts if x >= 2 * p in debug mode.
    pub(crate) const fn reduce1(x: u64, p: u64) -> u64 {
        debug_assert!(p >> 63 == 0);
        debug_assert!(x < 2 * p);

        let r = const_time_cond_select(x, x.wrapping_sub(p), x < p);

        debug_assert!(r == x % p);

        r
    }

    /// Lazy modular reduction of a in constant time.
    /// The output is in the interval [0, 2 * p).
    #[must_use]
    pub const fn lazy_reduce_u128(&self, a: u128) -> u64 {
        let a_lo = a as u64;
        let a_hi = (a >> 64) as u64;
        let p_lo_lo = ((a_lo as u128) * (self.barrett_lo as u128)) >> 64;
        let p_hi_lo = (a_hi as u128) * (self.barrett_lo as u128);
        let p_lo_hi = (a_lo as u128) * (self.barrett_hi as u128);

        let q = ((p_lo_hi + p_hi_lo + p_lo_lo) >> 64) + (a_hi as u128) * (self.barrett_hi as u128);
        let r = (a - q * (self.p as u128)) as u64;

        debug_assert!((r as u128) < 2 * (self.p as u128));
        debug_assert!(r % self.p == (a % (self.p as u128)) as u64);

        r
    }

    /// Lazy modular reduction of a in constant time.
    /// The output is in the interval [0, 2 * p).
    #[must_use]
    pub const fn lazy_reduce(&self, a: u64) -> u64 {
        let p_lo_lo = ((a as u128) * (self.barrett_lo as u128)) >> 64;
        let p_lo_hi = (a as u128) * (self.barrett_hi as u128);

        let q = (p_lo_hi + p_lo_lo) >> 64;
        let r = (a as u128 - q * (self.p as u128)) as u64;

        debug_assert!((r as u128) < 2 * (self.p as u128));
        debug_assert!(r % self.p == a % self.p);

        r
    }

    /// Modular reduction of a vector of i64 in constant time.
    #[must_use]
    pub fn reduce_vec_i64(&self, a: &[i64]) -> Vec<u64> {
        a.iter().map(|ai| self.reduce_i64(*ai)).collect_vec()
    }

    /// Modular reduction of a vector of arbitrary precision integers.
    #[must_use]
    pub fn reduce_vec_bigint(&self, a: &[BigInt]) -> Vec<u64> {
        a.iter().map(|ai| self.reduce_bigint(ai)).collect_vec()
    }

    /// Returns a random vector.
    pub fn random_vec<R: RngCore + CryptoRng>(&self, size: usize, rng: &mut R) -> Vec<u64> {
        rng.sample_iter(self.distribution).take(size).collect_vec()
    }
}

/// Returns `a mod m` in `[0, m)` for a modulus that fits a `u64`.
pub fn bigint_mod(a: &BigInt, m: u64) -> u64 {
    if m == 1 || a.is_zero() {
        return 0;
    }
    let r = (a.magnitude() % m).to_u64().unwrap_or_default();
    if a.sign() == Sign::Minus && r != 0 {
        m - r
    } else {
        r
    }
}
