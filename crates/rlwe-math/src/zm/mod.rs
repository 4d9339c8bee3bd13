#![warn(missing_docs, unused_imports)]

//! The group Z_m^*, the m-th cyclotomic polynomial, and the hypercube
//! structure of the quotient Z_m^* / <f> by the subgroup generated by a
//! "Frobenius" element f.

use crate::zq::{factor::order_mod, primes::prime_factors};
use crate::{Error, Result};
use num_integer::Integer;

/// Returns the coefficients of the m-th cyclotomic polynomial, lowest degree
/// first, computed as the product of (X^d - 1)^mu(m/d) over the divisors d of m.
pub fn cyclotomic_polynomial(m: u64) -> Vec<i64> {
    let m = m.max(1) as usize;
    let divisors: Vec<usize> = (1..=m).filter(|d| m % d == 0).collect();

    let mut numerator = vec![1i64];
    let mut denominators = vec![];
    for d in divisors {
        match mobius((m / d) as u64) {
            1 => {
                // numerator *= X^d - 1
                let mut out = vec![0i64; numerator.len() + d];
                for (i, c) in numerator.iter().enumerate() {
                    out[i + d] += c;
                    out[i] -= c;
                }
                numerator = out;
            }
            -1 => denominators.push(d),
            _ => {}
        }
    }

    for d in denominators {
        // Exact division by X^d - 1.
        let n = numerator.len() - 1;
        let mut quotient = vec![0i64; n + 1 - d];
        for k in (d..=n).rev() {
            let c = numerator[k];
            quotient[k - d] = c;
            numerator[k - d] += c;
        }
        debug_assert!(numerator[..d].iter().all(|c| *c == 0));
        numerator = quotient;
    }
    numerator
}

fn mobius(n: u64) -> i64 {
    let factors = prime_factors(n);
    if factors.iter().any(|p| (n / p) % p == 0) {
        0
    } else if factors.len() % 2 == 0 {
        1
    } else {
        -1
    }
}

/// Euler's totient function.
pub fn euler_phi(m: u64) -> u64 {
    prime_factors(m)
        .iter()
        .fold(m, |acc, p| acc / p * (p - 1))
}

/// The group Z_m^* together with the hypercube structure of Z_m^* / <f>.
///
/// The quotient is decomposed greedily into generators g_0, ..., g_{n-1} of
/// orders ord_0, ..., ord_{n-1}, so that every coset has a unique
/// representative g_0^{e_0} ... g_{n-1}^{e_{n-1}} with 0 <= e_i < ord_i. A
/// dimension is native when g_i^{ord_i} = 1 in Z_m^*.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZmStar {
    m: u64,
    elements: Vec<u64>,
    index: Vec<Option<usize>>,
    phim_x: Vec<i64>,
    frobenius: u64,
    frobenius_order: usize,
    gens: Vec<u64>,
    ords: Vec<usize>,
    native: Vec<bool>,
    reps: Vec<u64>,
    slot_of: Vec<Option<usize>>,
}

impl ZmStar {
    /// Create the structure for the cyclotomic index `m` and the element
    /// `frobenius` of Z_m^* (p mod m for the exact scheme, m - 1 for the
    /// complex one).
    pub fn new(m: u64, frobenius: u64) -> Result<Self> {
        if !(2..=(1 << 20)).contains(&m) {
            return Err(Error::Default(format!(
                "The cyclotomic index {m} should be between 2 and 2^20"
            )));
        }
        let frobenius = frobenius % m;
        if frobenius.gcd(&m) != 1 {
            return Err(Error::NotInvertible(frobenius, m));
        }
        let frobenius_order = order_mod(frobenius, m).ok_or(Error::NotInvertible(frobenius, m))?;

        let elements: Vec<u64> = (1..m).filter(|t| t.gcd(&m) == 1).collect();
        let mut index = vec![None; m as usize];
        elements
            .iter()
            .enumerate()
            .for_each(|(i, t)| index[*t as usize] = Some(i));

        let mul = |a: u64, b: u64| ((a as u128 * b as u128) % m as u128) as u64;

        // The subgroup H generated by the Frobenius element.
        let mut subgroup = vec![1u64];
        let mut x = frobenius;
        while x != 1 {
            subgroup.push(x);
            x = mul(x, frobenius);
        }

        let mut covered = vec![false; m as usize];
        subgroup.iter().for_each(|h| covered[*h as usize] = true);
        let mut covered_list = subgroup.clone();

        let mut gens = vec![];
        let mut ords = vec![];
        let mut native = vec![];
        while covered_list.len() < elements.len() {
            // (relative order, native, generator), maximal order first, then
            // native generators, then the smallest generator.
            let mut best: Option<(usize, bool, u64)> = None;
            for g in elements.iter().filter(|g| !covered[**g as usize]) {
                let mut k = 1;
                let mut y = *g;
                while !covered[y as usize] {
                    y = mul(y, *g);
                    k += 1;
                }
                let is_native = y == 1;
                let better = match best {
                    None => true,
                    Some((bk, bn, _)) => k > bk || (k == bk && is_native && !bn),
                };
                if better {
                    best = Some((k, is_native, *g));
                }
            }
            let (k, is_native, g) = best.ok_or(Error::InvalidContext)?;

            let mut new_list = Vec::with_capacity(covered_list.len() * k);
            let mut gj = 1u64;
            for _ in 0..k {
                for c in &covered_list {
                    new_list.push(mul(gj, *c));
                }
                gj = mul(gj, g);
            }
            new_list.iter().for_each(|t| covered[*t as usize] = true);
            covered_list = new_list;

            gens.push(g);
            ords.push(k);
            native.push(is_native);
        }

        let num_slots = elements.len() / subgroup.len();
        let mut reps = Vec::with_capacity(num_slots);
        for e in 0..num_slots {
            let mut t = 1u64;
            let mut rest = e;
            for i in (0..gens.len()).rev() {
                let ei = rest % ords[i];
                rest /= ords[i];
                for _ in 0..ei {
                    t = mul(t, gens[i]);
                }
            }
            reps.push(t);
        }

        let mut slot_of = vec![None; m as usize];
        for (e, t) in reps.iter().enumerate() {
            for h in &subgroup {
                slot_of[mul(*t, *h) as usize] = Some(e);
            }
        }

        Ok(Self {
            m,
            elements,
            index,
            phim_x: cyclotomic_polynomial(m),
            frobenius,
            frobenius_order,
            gens,
            ords,
            native,
            reps,
            slot_of,
        })
    }

    /// The cyclotomic index m.
    pub const fn m(&self) -> u64 {
        self.m
    }

    /// Euler's totient of m, the degree of the ring.
    pub fn phi_m(&self) -> usize {
        self.elements.len()
    }

    /// Returns whether m is a power of two.
    pub const fn is_pow2(&self) -> bool {
        self.m.is_power_of_two()
    }

    /// The elements of Z_m^* in increasing order.
    pub fn elements(&self) -> &[u64] {
        &self.elements
    }

    /// Returns whether t (taken modulo m) belongs to Z_m^*.
    pub fn in_zm_star(&self, t: u64) -> bool {
        self.index_of(t).is_some()
    }

    /// Position of t (taken modulo m) in the list of elements of Z_m^*.
    pub fn index_of(&self, t: u64) -> Option<usize> {
        self.index[(t % self.m) as usize]
    }

    /// Coefficients of the cyclotomic polynomial, lowest degree first.
    pub fn phim_x(&self) -> &[i64] {
        &self.phim_x
    }

    /// The Frobenius element generating the subgroup H.
    pub const fn frobenius(&self) -> u64 {
        self.frobenius
    }

    /// Order of the Frobenius element, i.e. |H|.
    pub const fn frobenius_order(&self) -> usize {
        self.frobenius_order
    }

    /// Number of slots, |Z_m^* / H|.
    pub fn num_slots(&self) -> usize {
        self.reps.len()
    }

    /// Number of hypercube dimensions.
    pub fn num_gens(&self) -> usize {
        self.gens.len()
    }

    /// Generators of the hypercube.
    pub fn gens(&self) -> &[u64] {
        &self.gens
    }

    /// Orders of the generators in the quotient.
    pub fn ords(&self) -> &[usize] {
        &self.ords
    }

    /// The i-th generator.
    pub fn gen(&self, i: usize) -> u64 {
        self.gens[i]
    }

    /// Order of the i-th generator in the quotient.
    pub fn order_of(&self, i: usize) -> usize {
        self.ords[i]
    }

    /// Returns whether the i-th dimension is native.
    pub fn is_native(&self, i: usize) -> bool {
        self.native[i]
    }

    /// Product of the orders of the dimensions after i.
    pub fn stride(&self, i: usize) -> usize {
        self.ords[i + 1..].iter().product()
    }

    /// The i-th coordinate of the slot index k.
    pub fn coordinate(&self, i: usize, k: usize) -> usize {
        (k / self.stride(i)) % self.ords[i]
    }

    /// Slot index obtained from k by adding `offset` (cyclically) to its i-th
    /// coordinate.
    pub fn add_coord(&self, i: usize, k: usize, offset: i64) -> usize {
        let ord = self.ords[i] as i64;
        let stride = self.stride(i);
        let c = self.coordinate(i, k) as i64;
        let nc = (c + offset).rem_euclid(ord) as usize;
        k - (c as usize) * stride + nc * stride
    }

    /// The representative g_0^{e_0} ... g_{n-1}^{e_{n-1}} of the slot k.
    pub fn rep(&self, k: usize) -> u64 {
        self.reps[k]
    }

    /// The slot index of the coset of t, if t belongs to Z_m^*.
    pub fn slot_of(&self, t: u64) -> Option<usize> {
        self.slot_of[(t % self.m) as usize]
    }

    /// Returns g_i^k mod m, where k may be negative.
    pub fn gen_power(&self, i: usize, k: i64) -> u64 {
        let g = if k < 0 {
            self.inverse(self.gens[i])
        } else {
            self.gens[i]
        };
        self.pow(g, k.unsigned_abs())
    }

    /// Returns t^e mod m.
    pub fn pow(&self, t: u64, mut e: u64) -> u64 {
        let mut r = 1u64 % self.m;
        let mut base = t % self.m;
        while e > 0 {
            if e & 1 == 1 {
                r = self.mul(r, base);
            }
            base = self.mul(base, base);
            e >>= 1;
        }
        r
    }

    /// Returns a * b mod m.
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        ((a as u128 * b as u128) % self.m as u128) as u64
    }

    /// Inverse of t in Z_m^*; t must belong to Z_m^*.
    pub fn inverse(&self, t: u64) -> u64 {
        let e = (t as i128).extended_gcd(&(self.m as i128));
        debug_assert_eq!(e.gcd, 1);
        e.x.rem_euclid(self.m as i128) as u64
    }

    /// Returns whether the structure has the given parameters.
    pub fn matches(&self, m: u64, frobenius: u64, gens: &[u64], ords: &[usize]) -> bool {
        self.m == m && self.frobenius == frobenius % m && self.gens == gens && self.ords == ords
    }
}
