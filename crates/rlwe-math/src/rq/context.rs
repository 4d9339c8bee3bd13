use itertools::Itertools;
use ndarray::Array2;
use num_bigint::BigUint;
use std::{fmt::Debug, sync::Arc};

use super::PrimeSet;
use crate::{
    rns::RnsContext,
    zm::ZmStar,
    zq::{primes::primitive_root, Modulus},
    Error, Result,
};

/// Struct that holds the context associated with elements in rq: the group
/// Z_m^* and a chain of primes congruent to 1 modulo m.
#[derive(Clone, PartialEq, Eq)]
pub struct Context {
    pub(crate) zm: Arc<ZmStar>,
    pub(crate) moduli: Box<[u64]>,
    pub(crate) q: Box<[Modulus]>,
    // Powers of a primitive m-th root of unity, for each prime.
    pub(crate) roots: Box<[Vec<u64>]>,
    pub(crate) inv_vandermonde: Box<[Array2<u64>]>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("m", &self.zm.m())
            .field("moduli", &self.moduli)
            .finish()
    }
}

impl Context {
    /// Creates a context from a list of moduli and the group Z_m^*.
    ///
    /// Returns an error if the moduli are not distinct primes less than 62
    /// bits congruent to 1 modulo m.
    pub fn new(moduli: &[u64], zm: Arc<ZmStar>) -> Result<Self> {
        if moduli.is_empty() {
            return Err(Error::Default("The list of moduli is empty".to_string()));
        }
        if !moduli.iter().all_unique() {
            return Err(Error::Default("The moduli are not distinct".to_string()));
        }
        let m = zm.m();
        let phi = zm.phi_m();

        let mut q = Vec::with_capacity(moduli.len());
        let mut roots = Vec::with_capacity(moduli.len());
        let mut inv_vandermonde = Vec::with_capacity(moduli.len());
        for modulus in moduli {
            let qi = Modulus::new(*modulus)?;
            if !rlwe_util::is_prime(*modulus) || modulus % m != 1 {
                return Err(Error::Default(format!(
                    "The modulus {modulus} is not a prime congruent to 1 modulo {m}"
                )));
            }
            let zeta = primitive_root(m, &qi).ok_or_else(|| {
                Error::Default(format!("No primitive {m}-th root of unity modulo {modulus}"))
            })?;
            let powers = (0..m)
                .scan(1u64, |acc, _| {
                    let current = *acc;
                    *acc = qi.mul(*acc, zeta);
                    Some(current)
                })
                .collect_vec();

            let vandermonde = Array2::from_shape_fn((phi, phi), |(r, j)| {
                powers[((zm.elements()[r] as u128 * j as u128) % m as u128) as usize]
            });
            inv_vandermonde.push(invert_matrix(vandermonde, &qi)?);
            roots.push(powers);
            q.push(qi);
        }

        Ok(Self {
            zm,
            moduli: moduli.to_owned().into_boxed_slice(),
            q: q.into_boxed_slice(),
            roots: roots.into_boxed_slice(),
            inv_vandermonde: inv_vandermonde.into_boxed_slice(),
        })
    }

    /// Creates a context in an `Arc`.
    pub fn new_arc(moduli: &[u64], zm: Arc<ZmStar>) -> Result<Arc<Self>> {
        Self::new(moduli, zm).map(Arc::new)
    }

    /// The group Z_m^*.
    pub fn zm(&self) -> &Arc<ZmStar> {
        &self.zm
    }

    /// The cyclotomic index.
    pub fn m(&self) -> u64 {
        self.zm.m()
    }

    /// Degree of the ring, which is phi(m).
    pub fn degree(&self) -> usize {
        self.zm.phi_m()
    }

    /// Returns a reference to the moduli in this context.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Returns a reference to the moduli as Modulus in this context.
    pub fn moduli_operators(&self) -> &[Modulus] {
        &self.q
    }

    /// The set of all the primes of the context.
    pub fn full_set(&self) -> PrimeSet {
        PrimeSet::range(0, self.moduli.len())
    }

    /// Returns the moduli indexed by the prime set.
    pub fn moduli_of(&self, set: &PrimeSet) -> Result<Vec<u64>> {
        set.iter()
            .map(|i| {
                self.moduli.get(i).copied().ok_or_else(|| {
                    Error::Default(format!("The prime index {i} is out of range"))
                })
            })
            .collect()
    }

    /// Product of the primes of the set.
    pub fn modulus(&self, set: &PrimeSet) -> Result<BigUint> {
        Ok(self
            .moduli_of(set)?
            .iter()
            .fold(BigUint::from(1u64), |acc, qi| acc * *qi))
    }

    /// Natural logarithm of the product of the primes of the set.
    pub fn log_modulus(&self, set: &PrimeSet) -> Result<f64> {
        Ok(self
            .moduli_of(set)?
            .iter()
            .map(|qi| (*qi as f64).ln())
            .sum())
    }

    /// RNS context over the primes of the set.
    pub fn rns(&self, set: &PrimeSet) -> Result<RnsContext> {
        RnsContext::new(&self.moduli_of(set)?)
    }
}

/// Invert a square matrix modulo a prime with Gauss-Jordan elimination.
fn invert_matrix(mut a: Array2<u64>, q: &Modulus) -> Result<Array2<u64>> {
    let n = a.nrows();
    let mut inv = Array2::from_shape_fn((n, n), |(i, j)| u64::from(i == j));
    for col in 0..n {
        let pivot = (col..n)
            .find(|r| a[[*r, col]] != 0)
            .ok_or_else(|| Error::Default("Singular matrix".to_string()))?;
        if pivot != col {
            for j in 0..n {
                a.swap([pivot, j], [col, j]);
                inv.swap([pivot, j], [col, j]);
            }
        }
        let p_inv = q
            .inv(a[[col, col]])
            .ok_or(Error::NotInvertible(a[[col, col]], **q))?;
        for j in 0..n {
            a[[col, j]] = q.mul(a[[col, j]], p_inv);
            inv[[col, j]] = q.mul(inv[[col, j]], p_inv);
        }
        for r in 0..n {
            let factor = a[[r, col]];
            if r == col || factor == 0 {
                continue;
            }
            for j in 0..n {
                a[[r, j]] = q.sub(a[[r, j]], q.mul(factor, a[[col, j]]));
                inv[[r, j]] = q.sub(inv[[r, j]], q.mul(factor, inv[[col, j]]));
            }
        }
    }
    Ok(inv)
}
