#![crate_name = "rlwe_util"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Utilities for the rlwe.rs library.

#[cfg(test)]
#[macro_use]
extern crate proptest;

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_bigint_dig::{prime::probably_prime, BigUint as BigUintDig};
use num_traits::ToPrimitive;
use rand::{seq::index::sample, CryptoRng, Rng, RngCore};
use rand_distr::{Distribution, Normal};
use std::panic::UnwindSafe;

/// Number of standard deviations after which a Gaussian sample is rejected.
pub const GAUSSIAN_TAIL_CUT: f64 = 10.0;

/// Define catch_unwind to silence the panic in unit tests.
pub fn catch_unwind<F, R>(f: F) -> std::thread::Result<R>
where
    F: FnOnce() -> R + UnwindSafe,
{
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let r = std::panic::catch_unwind(f);
    std::panic::set_hook(prev_hook);
    r
}

/// Returns whether the modulus p is prime; this function is 100% accurate.
pub fn is_prime(p: u64) -> bool {
    probably_prime(&BigUintDig::from(p), 0)
}

/// Sample a vector of rounded Gaussian values of standard deviation `stdev`.
/// Values further than [`GAUSSIAN_TAIL_CUT`] standard deviations from zero are
/// re-sampled, so the output is bounded.
pub fn sample_vec_normal<R: RngCore + CryptoRng>(
    vector_size: usize,
    stdev: f64,
    rng: &mut R,
) -> Result<Vec<i64>, &'static str> {
    if !stdev.is_finite() || stdev <= 0.0 {
        return Err("The standard deviation should be positive");
    }
    let normal = Normal::new(0.0, stdev).map_err(|_| "Invalid standard deviation")?;
    let bound = GAUSSIAN_TAIL_CUT * stdev;

    let mut out = Vec::with_capacity(vector_size);
    while out.len() < vector_size {
        let x: f64 = normal.sample(rng);
        if x.abs() <= bound {
            out.push(x.round() as i64)
        }
    }
    Ok(out)
}

/// Sample a vector with coefficients in {-1, 0, 1}, where 0 has probability
/// 1/2 and each of -1 and 1 has probability 1/4.
pub fn sample_vec_small<R: RngCore + CryptoRng>(vector_size: usize, rng: &mut R) -> Vec<i64> {
    let mut out = Vec::with_capacity(vector_size);
    let mut pool = 0u64;
    let mut pool_nbits = 0;
    for _ in 0..vector_size {
        if pool_nbits < 2 {
            pool = rng.next_u64();
            pool_nbits = 64;
        }
        out.push(((pool & 1) as i64) - (((pool >> 1) & 1) as i64));
        pool >>= 2;
        pool_nbits -= 2;
    }
    out
}

/// Sample a vector with exactly `hamming_weight` non-zero coefficients, each
/// uniform in {-1, 1}, at uniformly random positions.
pub fn sample_vec_hwt<R: RngCore + CryptoRng>(
    vector_size: usize,
    hamming_weight: usize,
    rng: &mut R,
) -> Result<Vec<i64>, &'static str> {
    if hamming_weight > vector_size {
        return Err("The Hamming weight exceeds the vector size");
    }
    let mut out = vec![0i64; vector_size];
    for i in sample(rng, vector_size, hamming_weight).iter() {
        out[i] = if rng.gen::<bool>() { 1 } else { -1 };
    }
    Ok(out)
}

/// Sample a vector of integers uniform in the interval [-bound, bound].
pub fn sample_vec_uniform<R: RngCore + CryptoRng>(
    vector_size: usize,
    bound: &BigUint,
    rng: &mut R,
) -> Vec<BigInt> {
    let width = (bound << 1usize) + 1u64;
    let bound = BigInt::from(bound.clone());
    (0..vector_size)
        .map(|_| BigInt::from(rng.gen_biguint_below(&width)) - &bound)
        .collect()
}

/// Returns the number of bits b such that 2^b <= value.
/// Panics when `value` is 0.
pub fn ilog2(value: u64) -> usize {
    assert!(value > 0);
    63 - value.leading_zeros() as usize
}

/// Compute the sample variance of a list of values.
/// Panics if the length of value is < 2.
pub fn variance<T: ToPrimitive>(values: &[T]) -> f64 {
    assert!(values.len() > 1);
    let v: Vec<f64> = values.iter().filter_map(|x| x.to_f64()).collect();
    let mean = v.iter().sum::<f64>() / (v.len() as f64);
    v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / ((v.len() as f64) - 1.0)
}
