#![warn(missing_docs, unused_imports)]

//! Polynomials in R_q = Z_q\[X\] / Phi_m(X), where q is the product of a
//! subset of the primes of a context, stored in double-CRT form.

mod context;
mod ops;
mod prime_set;
mod serialize;

use crate::{rns::product_mod, zq::Modulus, Error, Result};
pub use context::Context;
use itertools::{izip, Itertools};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use num_bigint::{BigInt, BigUint};
pub use prime_set::PrimeSet;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rlwe_util::{sample_vec_hwt, sample_vec_normal, sample_vec_small, sample_vec_uniform};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use zeroize::{Zeroize, Zeroizing};

/// Possible representations of the underlying polynomial.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// The list of coefficients ci, such that the polynomial is c0 + c1 * X +
    /// ... + c_(phi(m) - 1) * X^(phi(m) - 1), modulo each prime.
    #[default]
    PowerBasis,
    /// The values of the polynomial at the primitive m-th roots of unity
    /// zeta^t, for t in Z_m^* in increasing order, modulo each prime.
    Evaluation,
}

impl Representation {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Representation::PowerBasis => 0,
            Representation::Evaluation => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Representation::PowerBasis),
            1 => Ok(Representation::Evaluation),
            _ => Err(Error::Serialization(format!("Unknown representation {v}"))),
        }
    }
}

/// Struct that holds a polynomial over a subset of the primes of a context.
///
/// The coefficients are stored as one row per prime of the set, in increasing
/// order of the prime indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly {
    ctx: Arc<Context>,
    primes: PrimeSet,
    representation: Representation,
    coefficients: Array2<u64>,
}

impl Zeroize for Poly {
    fn zeroize(&mut self) {
        self.coefficients.iter_mut().for_each(|c| c.zeroize())
    }
}

impl AsRef<Poly> for Poly {
    fn as_ref(&self) -> &Poly {
        self
    }
}

impl Poly {
    /// Creates a polynomial holding the constant 0.
    ///
    /// Aborts if the prime set refers to primes outside of the context.
    #[must_use]
    pub fn zero(ctx: &Arc<Context>, primes: &PrimeSet, representation: Representation) -> Self {
        assert!(
            primes.last().map_or(true, |i| i < ctx.moduli.len()),
            "Invalid prime set"
        );
        Self {
            ctx: ctx.clone(),
            primes: primes.clone(),
            representation,
            coefficients: Array2::zeros((primes.len(), ctx.degree())),
        }
    }

    /// Creates a polynomial from its coefficients in the specified
    /// representation, one row per prime of the set.
    pub fn from_coefficients(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        representation: Representation,
        coefficients: Array2<u64>,
    ) -> Result<Self> {
        ctx.moduli_of(primes)?;
        if coefficients.dim() != (primes.len(), ctx.degree()) {
            return Err(Error::Default(format!(
                "Invalid shape {:?} for the coefficients",
                coefficients.dim()
            )));
        }
        for (row, i) in izip!(coefficients.outer_iter(), primes.iter()) {
            let qi = *ctx.q[i];
            if row.iter().any(|c| *c >= qi) {
                return Err(Error::Default(format!(
                    "Coefficients are not reduced modulo {qi}"
                )));
            }
        }
        Ok(Self {
            ctx: ctx.clone(),
            primes: primes.clone(),
            representation,
            coefficients,
        })
    }

    /// Creates a polynomial from signed coefficients, lowest degree first.
    ///
    /// Returns an error if there are more than phi(m) coefficients.
    pub fn from_i64(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        coefficients: &[i64],
        representation: Representation,
    ) -> Result<Self> {
        if coefficients.len() > ctx.degree() {
            return Err(Error::Default(format!(
                "Too many coefficients: {} > {}",
                coefficients.len(),
                ctx.degree()
            )));
        }
        let mut p = Poly::zero(ctx, primes, Representation::PowerBasis);
        izip!(p.coefficients.outer_iter_mut(), primes.iter()).for_each(|(mut row, i)| {
            izip!(row.iter_mut(), coefficients.iter())
                .for_each(|(c, a)| *c = ctx.q[i].reduce_i64(*a))
        });
        p.change_representation(representation);
        Ok(p)
    }

    /// Creates a polynomial from arbitrary precision coefficients, lowest
    /// degree first.
    pub fn from_bigints(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        coefficients: &[BigInt],
        representation: Representation,
    ) -> Result<Self> {
        if coefficients.len() > ctx.degree() {
            return Err(Error::Default(format!(
                "Too many coefficients: {} > {}",
                coefficients.len(),
                ctx.degree()
            )));
        }
        let mut p = Poly::zero(ctx, primes, Representation::PowerBasis);
        izip!(p.coefficients.outer_iter_mut(), primes.iter()).for_each(|(mut row, i)| {
            izip!(row.iter_mut(), coefficients.iter())
                .for_each(|(c, a)| *c = ctx.q[i].reduce_bigint(a))
        });
        p.change_representation(representation);
        Ok(p)
    }

    /// Current representation of the polynomial.
    #[must_use]
    pub const fn representation(&self) -> &Representation {
        &self.representation
    }

    /// The primes over which the polynomial is defined.
    #[must_use]
    pub const fn primes(&self) -> &PrimeSet {
        &self.primes
    }

    /// Returns the context of the underlying polynomial.
    #[must_use]
    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Access the polynomial coefficients in RNS representation.
    #[must_use]
    pub fn coefficients(&self) -> ArrayView2<'_, u64> {
        self.coefficients.view()
    }

    /// Change the representation of the underlying polynomial.
    pub fn change_representation(&mut self, to: Representation) {
        if self.representation == to {
            return;
        }
        match to {
            Representation::Evaluation => self.evaluate_forward(),
            Representation::PowerBasis => self.evaluate_backward(),
        }
        self.representation = to;
    }

    fn evaluate_forward(&mut self) {
        let m = self.ctx.m() as u128;
        let elements = self.ctx.zm.elements();
        izip!(self.coefficients.outer_iter_mut(), self.primes.iter()).for_each(|(mut row, i)| {
            let qi = &self.ctx.q[i];
            let roots = &self.ctx.roots[i];
            let values = elements
                .iter()
                .map(|t| {
                    row.iter().enumerate().fold(0u64, |acc, (j, a)| {
                        let k = ((*t as u128 * j as u128) % m) as usize;
                        qi.add(acc, qi.mul(*a, roots[k]))
                    })
                })
                .collect_vec();
            row.assign(&Array1::from(values));
        });
    }

    fn evaluate_backward(&mut self) {
        izip!(self.coefficients.outer_iter_mut(), self.primes.iter()).for_each(|(mut row, i)| {
            let qi = &self.ctx.q[i];
            let inv = &self.ctx.inv_vandermonde[i];
            let coefficients = inv
                .outer_iter()
                .map(|inv_row| {
                    izip!(inv_row.iter(), row.iter())
                        .fold(0u64, |acc, (a, v)| qi.add(acc, qi.mul(*a, *v)))
                })
                .collect_vec();
            row.assign(&Array1::from(coefficients));
        });
    }

    /// Generate a random polynomial.
    pub fn random<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        representation: Representation,
        rng: &mut R,
    ) -> Self {
        let mut p = Poly::zero(ctx, primes, representation);
        izip!(p.coefficients.outer_iter_mut(), primes.iter()).for_each(|(mut row, i)| {
            row.assign(&Array1::from(ctx.q[i].random_vec(ctx.degree(), rng)))
        });
        p
    }

    /// Generate a random polynomial deterministically from a seed.
    #[must_use]
    pub fn random_from_seed(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        representation: Representation,
        seed: <ChaCha8Rng as SeedableRng>::Seed,
    ) -> Self {
        // Let's hash the seed into a ChaCha8Rng seed.
        let mut hasher = Sha256::new();
        hasher.update(seed);
        let mut prng =
            ChaCha8Rng::from_seed(<ChaCha8Rng as SeedableRng>::Seed::from(hasher.finalize()));
        Poly::random(ctx, primes, representation, &mut prng)
    }

    /// Generate a polynomial with coefficients sampled from a discrete
    /// Gaussian of standard deviation `stdev`.
    pub fn gaussian<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        representation: Representation,
        stdev: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let coeffs = Zeroizing::new(
            sample_vec_normal(ctx.degree(), stdev, rng).map_err(|e| Error::Default(e.to_string()))?,
        );
        Poly::from_i64(ctx, primes, &coeffs, representation)
    }

    /// Generate a polynomial with coefficients in {-1, 0, 1}, each non-zero
    /// value with probability 1/4.
    pub fn small<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        representation: Representation,
        rng: &mut R,
    ) -> Result<Self> {
        let coeffs = Zeroizing::new(sample_vec_small(ctx.degree(), rng));
        Poly::from_i64(ctx, primes, &coeffs, representation)
    }

    /// Generate a polynomial with exactly `hwt` coefficients in {-1, 1} and
    /// all the others equal to 0.
    pub fn hwt<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        representation: Representation,
        hwt: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let coeffs = Zeroizing::new(
            sample_vec_hwt(ctx.degree(), hwt, rng).map_err(|e| Error::Default(e.to_string()))?,
        );
        Poly::from_i64(ctx, primes, &coeffs, representation)
    }

    /// Generate a polynomial with coefficients uniform in [-bound, bound].
    pub fn uniform<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        primes: &PrimeSet,
        representation: Representation,
        bound: &BigUint,
        rng: &mut R,
    ) -> Result<Self> {
        let coeffs = sample_vec_uniform(ctx.degree(), bound, rng);
        Poly::from_bigints(ctx, primes, &coeffs, representation)
    }

    /// Returns the coefficients as integers in (-q/2, q/2], where q is the
    /// product of the primes of the polynomial.
    pub fn to_bigints(&self) -> Result<Vec<BigInt>> {
        let mut p = self.clone();
        p.change_representation(Representation::PowerBasis);
        let rns = self.ctx.rns(&self.primes)?;
        Ok(p.coefficients
            .axis_iter(Axis(1))
            .map(|column| rns.lift_centered(column))
            .collect_vec())
    }

    /// Substitute X by X^k, for k in Z_m^*.
    pub fn automorph(&self, k: u64) -> Result<Poly> {
        let zm = &self.ctx.zm;
        if !zm.in_zm_star(k) {
            return Err(Error::NotInvertible(k, zm.m()));
        }
        let permutation = zm
            .elements()
            .iter()
            .map(|t| zm.index_of(zm.mul(k, *t)).ok_or(Error::NotInvertible(k, zm.m())))
            .collect::<Result<Vec<usize>>>()?;

        let mut p = self.clone();
        p.change_representation(Representation::Evaluation);
        let mut q = Poly::zero(&self.ctx, &self.primes, Representation::Evaluation);
        izip!(q.coefficients.outer_iter_mut(), p.coefficients.outer_iter()).for_each(
            |(mut q_row, p_row)| {
                izip!(q_row.iter_mut(), permutation.iter()).for_each(|(v, src)| *v = p_row[*src])
            },
        );
        q.change_representation(self.representation);
        Ok(q)
    }

    /// Raise the polynomial to the power `e`.
    #[must_use]
    pub fn pow(&self, e: u64) -> Poly {
        let mut p = self.clone();
        p.change_representation(Representation::Evaluation);
        izip!(p.coefficients.outer_iter_mut(), self.primes.iter()).for_each(|(mut row, i)| {
            row.iter_mut().for_each(|v| *v = self.ctx.q[i].pow(*v, e))
        });
        p.change_representation(self.representation);
        p
    }

    /// Returns the polynomial restricted to the primes of `set`, which must be
    /// a subset of the primes of the polynomial.
    pub fn restricted(&self, set: &PrimeSet) -> Result<Poly> {
        if !set.is_subset(&self.primes) || set.is_empty() {
            return Err(Error::PrimeSetMismatch {
                found: set.to_vec(),
                expected: self.primes.to_vec(),
            });
        }
        let positions = set
            .iter()
            .filter_map(|i| self.primes.position(i))
            .collect_vec();
        Ok(Poly {
            ctx: self.ctx.clone(),
            primes: set.clone(),
            representation: self.representation,
            coefficients: self.coefficients.select(Axis(0), &positions),
        })
    }

    /// Drop the primes of `set` without scaling the coefficients.
    pub fn remove_primes(&mut self, set: &PrimeSet) -> Result<()> {
        let kept = self.primes.difference(set);
        if kept == self.primes {
            return Ok(());
        }
        *self = self.restricted(&kept)?;
        Ok(())
    }

    /// Extend the polynomial to the primes of `set`, lifting each coefficient
    /// to its centered representative modulo the current primes.
    pub fn add_primes(&mut self, set: &PrimeSet) -> Result<()> {
        ctx_check(&self.ctx, set)?;
        let extra = set.difference(&self.primes);
        if extra.is_empty() {
            return Ok(());
        }
        let representation = self.representation;
        self.change_representation(Representation::PowerBasis);

        let rns = self.ctx.rns(&self.primes)?;
        let lifted = self
            .coefficients
            .axis_iter(Axis(1))
            .map(|column| rns.lift_centered(column))
            .collect_vec();

        let all = self.primes.union(&extra);
        let mut coefficients = Array2::zeros((all.len(), self.ctx.degree()));
        izip!(coefficients.outer_iter_mut(), all.iter()).for_each(|(mut row, i)| {
            if let Some(k) = self.primes.position(i) {
                row.assign(&self.coefficients.row(k))
            } else {
                let qi = &self.ctx.q[i];
                izip!(row.iter_mut(), lifted.iter()).for_each(|(c, a)| *c = qi.reduce_bigint(a))
            }
        });
        self.coefficients = coefficients;
        self.primes = all;
        self.change_representation(representation);
        Ok(())
    }

    /// Divide the polynomial by the product P of the primes of `dropped` and
    /// drop these primes.
    ///
    /// Each coefficient c is replaced by (c - d) / P, where d = c mod P is
    /// adjusted by a multiple of P so that d = 0 mod t. The result is
    /// therefore congruent to c * P^-1 modulo t. A value of t <= 1 skips the
    /// adjustment, and the division rounds.
    pub fn mod_down(&mut self, dropped: &PrimeSet, t: u64) -> Result<()> {
        let kept = self.primes.difference(dropped);
        if !dropped.is_subset(&self.primes) || kept.is_empty() || dropped.is_empty() {
            return Err(Error::PrimeSetMismatch {
                found: dropped.to_vec(),
                expected: self.primes.to_vec(),
            });
        }
        let representation = self.representation;
        self.change_representation(Representation::PowerBasis);

        let dropped_moduli = self.ctx.moduli_of(dropped)?;
        let rns = self.ctx.rns(dropped)?;
        let p = BigInt::from(rns.modulus().clone());
        let p_inv_t = if t > 1 {
            let pt = product_mod(&dropped_moduli, t);
            Some(Modulus::new(t)?.inv(pt).ok_or(Error::NotInvertible(pt, t))?)
        } else {
            None
        };

        let dropped_positions = dropped
            .iter()
            .filter_map(|i| self.primes.position(i))
            .collect_vec();
        let restricted = self.coefficients.select(Axis(0), &dropped_positions);
        let deltas = restricted
            .axis_iter(Axis(1))
            .map(|column| {
                let delta = rns.lift_centered(column);
                match p_inv_t {
                    Some(p_inv_t) => {
                        let d = crate::zq::bigint_mod(&delta, t);
                        let correction = ((t - d) as u128 * p_inv_t as u128) % t as u128;
                        delta + &p * BigInt::from(correction)
                    }
                    None => delta,
                }
            })
            .collect_vec();

        let mut out = self.restricted(&kept)?;
        izip!(out.coefficients.outer_iter_mut(), kept.iter()).try_for_each(|(mut row, i)| {
            let qi = &self.ctx.q[i];
            let pi = product_mod(&dropped_moduli, **qi);
            let p_inv = qi.inv(pi).ok_or(Error::NotInvertible(pi, **qi))?;
            izip!(row.iter_mut(), deltas.iter())
                .for_each(|(c, d)| *c = qi.mul(qi.sub(*c, qi.reduce_bigint(d)), p_inv));
            Ok::<(), Error>(())
        })?;
        out.change_representation(representation);
        *self = out;
        Ok(())
    }

    /// Break the polynomial into digits with respect to the partition
    /// `digits` of its primes, so that the polynomial is equal to
    /// sum_i c_i * D_0 * ... * D_(i-1), where D_j is the product of the primes
    /// of the j-th digit, and c_i has coefficients in (-D_i/2, D_i/2].
    ///
    /// Each digit is returned over the primes of `target`, in the same
    /// representation as the polynomial.
    pub fn decompose(&self, digits: &[PrimeSet], target: &PrimeSet) -> Result<Vec<Poly>> {
        ctx_check(&self.ctx, target)?;
        let mut current = self.clone();
        current.change_representation(Representation::PowerBasis);
        let mut out = vec![];
        for digit in digits {
            let d = digit.intersection(current.primes());
            if d.is_empty() {
                continue;
            }
            let c_i = current.restricted(&d)?;

            let mut lifted = c_i.clone();
            lifted.add_primes(&target.union(&d))?;
            lifted.remove_primes(&d.difference(target))?;
            lifted.change_representation(self.representation);
            out.push(lifted);

            if &d == current.primes() {
                return Ok(out);
            }
            let mut sub = c_i;
            sub.add_primes(current.primes())?;
            current -= &sub;
            current.mod_down(&d, 1)?;
        }
        Err(Error::Default(
            "The digits do not cover the primes of the polynomial".to_string(),
        ))
    }
}

fn ctx_check(ctx: &Context, set: &PrimeSet) -> Result<()> {
    ctx.moduli_of(set).map(|_| ())
}
