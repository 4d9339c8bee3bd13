#![warn(missing_docs, unused_imports)]

//! Residue-Number System operations.

use crate::{zq::Modulus, Error, Result};
use itertools::{izip, Itertools};
use ndarray::ArrayView1;
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{cast::ToPrimitive, One, Zero};
use std::fmt::Debug;

/// Context for a Residue Number System.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct RnsContext {
    moduli_u64: Vec<u64>,
    moduli: Vec<Modulus>,
    q_tilde: Vec<u64>,
    q_star: Vec<BigUint>,
    garner: Vec<BigUint>,
    product: BigUint,
    half_product: BigUint,
}

impl Debug for RnsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RnsContext")
            .field("moduli_u64", &self.moduli_u64)
            .field("product", &self.product)
            .finish()
    }
}

impl RnsContext {
    /// Create a RNS context from a list of moduli.
    ///
    /// Returns an error if the list is empty, or if the moduli are no coprime.
    pub fn new(moduli_u64: &[u64]) -> Result<Self> {
        if moduli_u64.is_empty() {
            Err(Error::Default("The list of moduli is empty".to_string()))
        } else {
            let mut product = BigUint::one();

            for i in 0..moduli_u64.len() {
                // Return an error if the moduli are not coprime.
                for j in 0..moduli_u64.len() {
                    if i != j && moduli_u64[i].gcd(&moduli_u64[j]) != 1 {
                        return Err(Error::Default("The moduli are not coprime".to_string()));
                    }
                }
                product *= &BigUint::from(moduli_u64[i]);
            }

            let (moduli, q_tilde, q_star, garner): (
                Vec<Modulus>,
                Vec<u64>,
                Vec<BigUint>,
                Vec<BigUint>,
            ) = moduli_u64
                .iter()
                .map(|modulus| {
                    let m = Modulus::new(*modulus)?;
                    let q_star_i = &product / modulus;
                    let q_tilde_i = m
                        .inv(m.reduce_biguint(&q_star_i))
                        .ok_or(Error::NotInvertible(m.reduce_biguint(&q_star_i), *modulus))?;
                    let garner_i = &q_star_i * q_tilde_i;
                    Ok((m, q_tilde_i, q_star_i, garner_i))
                })
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .multiunzip();

            Ok(Self {
                moduli_u64: moduli_u64.to_owned(),
                moduli,
                q_tilde,
                q_star,
                garner,
                half_product: &product >> 1usize,
                product,
            })
        }
    }

    /// Returns the product of the moduli used when creating the RNS context.
    #[must_use]
    pub const fn modulus(&self) -> &BigUint {
        &self.product
    }

    /// Returns the moduli of the RNS context.
    #[must_use]
    pub fn moduli(&self) -> &[u64] {
        &self.moduli_u64
    }

    /// Project a BigUint into its rests.
    #[must_use]
    pub fn project(&self, a: &BigUint) -> Vec<u64> {
        self.moduli.iter().map(|qi| qi.reduce_biguint(a)).collect()
    }

    /// Project a signed integer into its rests.
    #[must_use]
    pub fn project_signed(&self, a: &BigInt) -> Vec<u64> {
        self.moduli.iter().map(|qi| qi.reduce_bigint(a)).collect()
    }

    /// Lift rests into a BigUint.
    ///
    /// Aborts if the number of rests is different than the number of moduli in
    /// debug mode.
    #[must_use]
    pub fn lift(&self, rests: ArrayView1<u64>) -> BigUint {
        debug_assert_eq!(rests.len(), self.moduli_u64.len());
        let mut result = BigUint::zero();
        izip!(rests.iter(), self.garner.iter())
            .for_each(|(r_i, garner_i)| result += garner_i * *r_i);
        result % &self.product
    }

    /// Lift rests into the representative in (-Q/2, Q/2] of their class
    /// modulo the product Q of the moduli.
    #[must_use]
    pub fn lift_centered(&self, rests: ArrayView1<u64>) -> BigInt {
        let r = self.lift(rests);
        if r > self.half_product {
            BigInt::from(r) - BigInt::from(self.product.clone())
        } else {
            BigInt::from(r)
        }
    }

    /// Getter for the i-th garner coefficient.
    #[must_use]
    pub fn get_garner(&self, i: usize) -> Option<&BigUint> {
        self.garner.get(i)
    }

    /// Returns the i-th q_star coefficient, that is the product of all the
    /// moduli but the i-th one.
    #[must_use]
    pub fn get_q_star(&self, i: usize) -> Option<&BigUint> {
        self.q_star.get(i)
    }

    /// Returns the inverse of the i-th q_star coefficient modulo the i-th
    /// modulus.
    #[must_use]
    pub fn get_q_tilde(&self, i: usize) -> Option<u64> {
        self.q_tilde.get(i).copied()
    }
}

/// Returns `Q mod t` for the product `Q` of `moduli`.
pub fn product_mod(moduli: &[u64], t: u64) -> u64 {
    if t == 1 {
        return 0;
    }
    moduli
        .iter()
        .fold(1u128, |acc, qi| (acc * ((*qi % t) as u128)) % (t as u128))
        .to_u64()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {

    use std::error::Error;

    use super::{product_mod, RnsContext};
    use ndarray::ArrayView1;
    use num_bigint::{BigInt, BigUint};
    use rand::{thread_rng, RngCore};

    #[test]
    fn constructor() {
        assert!(RnsContext::new(&[2]).is_ok());
        assert!(RnsContext::new(&[2, 3]).is_ok());
        assert!(RnsContext::new(&[4, 15, 1153]).is_ok());

        let e = RnsContext::new(&[]);
        assert!(e.is_err());
        assert_eq!(e.unwrap_err().to_string(), "The list of moduli is empty");
        let e = RnsContext::new(&[2, 4]);
        assert!(e.is_err());
        assert_eq!(e.unwrap_err().to_string(), "The moduli are not coprime");
        let e = RnsContext::new(&[2, 3, 5, 30]);
        assert!(e.is_err());
        assert_eq!(e.unwrap_err().to_string(), "The moduli are not coprime");
    }

    #[test]
    fn garner() -> Result<(), Box<dyn Error>> {
        let rns = RnsContext::new(&[4, 15, 1153])?;

        for i in 0..3 {
            let gi = rns.get_garner(i);
            assert!(gi.is_some());
            assert_eq!(gi.unwrap(), &rns.garner[i]);
            let q_star = rns.get_q_star(i).unwrap();
            let q_tilde = rns.get_q_tilde(i).unwrap();
            assert_eq!((q_star * q_tilde) % rns.moduli()[i], BigUint::from(1u64));
        }
        assert!(rns.get_garner(3).is_none());

        Ok(())
    }

    #[test]
    fn modulus() -> Result<(), Box<dyn Error>> {
        let mut rns = RnsContext::new(&[2])?;
        assert_eq!(rns.modulus(), &BigUint::from(2u64));

        rns = RnsContext::new(&[2, 5])?;
        assert_eq!(rns.modulus(), &BigUint::from(2u64 * 5));

        rns = RnsContext::new(&[4, 15, 1153])?;
        assert_eq!(rns.modulus(), &BigUint::from(4u64 * 15 * 1153));

        Ok(())
    }

    #[test]
    fn project_lift() -> Result<(), Box<dyn Error>> {
        let ntests = 100;
        let rns = RnsContext::new(&[4, 15, 1153])?;
        let product = 4u64 * 15 * 1153;
        let mut rng = thread_rng();

        assert_eq!(rns.project(&BigUint::from(0u64)), &[0u64, 0, 0]);
        assert_eq!(rns.project(&BigUint::from(4 * 15 * 1153u64)), &[0u64, 0, 0]);
        assert_eq!(rns.project(&BigUint::from(4 * 15 * 1153u64 + 1)), &[1u64, 1, 1]);

        for _ in 0..ntests {
            let a = rng.next_u64() % product;
            let a_proj = rns.project(&BigUint::from(a));
            assert_eq!(rns.lift(ArrayView1::from(&a_proj)), BigUint::from(a));

            let b = (a as i64) - (product as i64 - 1) / 2;
            let b_proj = rns.project_signed(&BigInt::from(b));
            assert_eq!(rns.lift_centered(ArrayView1::from(&b_proj)), BigInt::from(b));
        }

        Ok(())
    }

    #[test]
    fn modulus_mod_t() {
        assert_eq!(product_mod(&[4, 15, 1153], 7), (4u64 * 15 * 1153) % 7);
        assert_eq!(product_mod(&[1153, 1297], 1), 0);
        assert_eq!(product_mod(&[], 17), 1);
    }
}
