//! The RLWE sampling primitive shared by key generation and encryption.

use crate::{Context, Result};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rlwe_math::rq::{Poly, PrimeSet, Representation};
use zeroize::Zeroizing;

/// Returns c0 = p * e - c1 * s, where e is sampled from a discrete Gaussian,
/// together with the variance of p * e in the canonical embedding.
///
/// The secret `s` must be defined over a superset of the primes of `c1`.
pub(crate) fn rlwe1<R: RngCore + CryptoRng>(
    ctx: &Context,
    c1: &Poly,
    s: &Poly,
    p: u64,
    rng: &mut R,
) -> Result<(Poly, f64)> {
    let zm = ctx.zm();
    let mut stdev = ctx.stdev();
    if !zm.is_pow2() {
        stdev *= (zm.m() as f64).sqrt();
    }

    let p = p.max(1);
    let mut c0 = Poly::gaussian(ctx.ring(), c1.primes(), Representation::Evaluation, stdev, rng)?;
    if p > 1 {
        c0 *= p;
    }
    let mut c1_s = Zeroizing::new(s.restricted(c1.primes())?);
    c1_s.change_representation(Representation::Evaluation);
    let mut c1 = c1.clone();
    c1.change_representation(Representation::Evaluation);
    *c1_s *= &c1;
    c0 -= &*c1_s;

    let n = if zm.is_pow2() {
        zm.m() as f64
    } else {
        zm.phi_m() as f64
    };
    Ok((c0, stdev * stdev * (p * p) as f64 * n))
}

/// Returns an RLWE sample (c0, c1) for the secret `s` over the primes `primes`,
/// where c1 is uniform, generated from `seed` if one is provided, and the
/// variance of its error.
pub(crate) fn rlwe<R: RngCore + CryptoRng>(
    ctx: &Context,
    primes: &PrimeSet,
    s: &Poly,
    p: u64,
    seed: Option<<ChaCha8Rng as SeedableRng>::Seed>,
    rng: &mut R,
) -> Result<(Poly, Poly, f64)> {
    let c1 = match seed {
        Some(seed) => Poly::random_from_seed(ctx.ring(), primes, Representation::Evaluation, seed),
        None => Poly::random(ctx.ring(), primes, Representation::Evaluation, rng),
    };
    let (c0, noise_var) = rlwe1(ctx, &c1, s, p, rng)?;
    Ok((c0, c1, noise_var))
}
