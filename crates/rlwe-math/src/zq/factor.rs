//! Equal-degree factorization of squarefree polynomials over Z_p, and
//! Hensel lifting of the factors to Z_{p^r}.

use super::{poly::ZpPoly, Modulus};
use crate::{Error, Result};
use num_bigint::BigUint;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Factor the monic squarefree polynomial `f`, whose irreducible factors all
/// have degree `d`, into its irreducible factors over the prime field Z_p.
///
/// The factors are returned monic and sorted, so the output is deterministic
/// even though the splitting uses random polynomials.
pub fn equal_degree_factorization(f: &ZpPoly, d: usize, p: &Modulus) -> Result<Vec<ZpPoly>> {
    let n = f
        .degree()
        .ok_or_else(|| Error::Default("Cannot factor the zero polynomial".to_string()))?;
    if d == 0 || n % d != 0 {
        return Err(Error::Default(format!(
            "Degree {n} is not a multiple of the factor degree {d}"
        )));
    }
    let f = f.make_monic(p)?;

    let mut rng = ChaCha8Rng::seed_from_u64((**p) ^ ((n as u64) << 32) ^ (d as u64));
    let mut todo = vec![f];
    let mut factors = vec![];
    while let Some(g) = todo.pop() {
        let deg = g.degree().unwrap_or(0);
        if deg == d {
            factors.push(g);
            continue;
        }
        if deg == 0 {
            continue;
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            if attempts > 256 {
                return Err(Error::Default(
                    "Equal-degree factorization did not converge".to_string(),
                ));
            }
            let h = split(&g, d, p, &mut rng)?;
            let deg_h = h.degree().unwrap_or(0);
            if deg_h > 0 && deg_h < deg {
                let (q, r) = g.div_rem(&h, p)?;
                debug_assert!(r.is_zero());
                todo.push(h);
                todo.push(q.make_monic(p)?);
                break;
            }
        }
    }
    factors.sort();
    Ok(factors)
}

/// One Cantor-Zassenhaus splitting attempt: returns a (possibly trivial)
/// factor of `g`.
fn split(g: &ZpPoly, d: usize, p: &Modulus, rng: &mut ChaCha8Rng) -> Result<ZpPoly> {
    let deg = g.degree().unwrap_or(0);
    let coefficients: Vec<u64> = (0..deg).map(|_| rng.gen_range(0..**p)).collect();
    let a = ZpPoly::new(&coefficients, p);
    if a.degree().unwrap_or(0) == 0 {
        return Ok(ZpPoly::constant(1, p));
    }
    let h = a.gcd(g, p)?;
    if h.degree().unwrap_or(0) > 0 {
        return Ok(h);
    }

    let b = if **p == 2 {
        // Trace map a + a^2 + ... + a^(2^(d-1)).
        let mut t = a.clone();
        let mut power = a;
        for _ in 1..d {
            power = power.mul_mod(&power, g, p)?;
            t = t.add(&power, p);
        }
        t
    } else {
        let e = (BigUint::from(**p).pow(d as u32) - 1u64) >> 1usize;
        a.pow_mod(&e, g, p)?.sub(&ZpPoly::constant(1, p), p)
    };
    b.gcd(g, p)
}

/// Lift the monic factor `g` of `f` modulo the prime `p` to the unique monic
/// factor of `f` modulo `pr` = p^r congruent to `g` modulo p.
///
/// The coefficients of `f` are given modulo p^r, and `g` must be coprime to
/// f / g modulo p.
pub fn hensel_lift(
    f: &ZpPoly,
    g: &ZpPoly,
    p: &Modulus,
    pr: &Modulus,
    r: usize,
) -> Result<ZpPoly> {
    let f_p = ZpPoly::new(f.coefficients(), p);
    let (h, rest) = f_p.div_rem(g, p)?;
    if !rest.is_zero() {
        return Err(Error::Default(format!("{g} does not divide {f_p}")));
    }
    // s g + t h = 1 modulo p.
    let s = g
        .inv_mod(&h, p)?
        .ok_or_else(|| Error::Default(format!("{g} is a repeated factor")))?;
    let (t, rest) = ZpPoly::constant(1, p).sub(&s.mul(g, p), p).div_rem(&h, p)?;
    debug_assert!(rest.is_zero());

    let mut g = ZpPoly::new(g.coefficients(), pr);
    for _ in 1..r {
        // f = g q + e with e = 0 modulo the current precision.
        let (_, e) = f.div_rem(&g, pr)?;
        if e.is_zero() {
            break;
        }
        g = g.add(&t.mul(&e, pr).rem(&g, pr)?, pr);
    }
    Ok(g)
}

/// Inverse of `a` modulo the monic polynomial `f` over Z_{p^r}, obtained by
/// Newton iteration from the inverse modulo p. Returns `None` when `a` is not
/// a unit modulo (p, f).
pub fn lift_inverse(
    a: &ZpPoly,
    f: &ZpPoly,
    p: &Modulus,
    pr: &Modulus,
    r: usize,
) -> Result<Option<ZpPoly>> {
    let f_p = ZpPoly::new(f.coefficients(), p);
    let Some(u) = ZpPoly::new(a.coefficients(), p).inv_mod(&f_p, p)? else {
        return Ok(None);
    };
    let a = a.rem(f, pr)?;
    let two = ZpPoly::constant(2, pr);
    let mut u = ZpPoly::new(u.coefficients(), pr);
    let mut precision = 1;
    while precision < r {
        // u <- u (2 - a u) doubles the number of correct p-adic digits.
        let au = a.mul_mod(&u, f, pr)?;
        u = u.mul_mod(&two.sub(&au, pr), f, pr)?;
        precision *= 2;
    }
    Ok(Some(u))
}

/// Returns the multiplicative order of p modulo m, i.e. the degree of the
/// irreducible factors of the m-th cyclotomic polynomial modulo p.
pub fn order_mod(p: u64, m: u64) -> Option<usize> {
    if m == 1 {
        return Some(1);
    }
    let p = p % m;
    let mut x = p;
    for k in 1..=m {
        if x == 1 {
            return Some(k as usize);
        }
        if x == 0 {
            return None;
        }
        x = ((x as u128 * p as u128) % m as u128) as u64;
    }
    None
}
