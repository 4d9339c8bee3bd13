//! Generation of primes and roots of unity.

use super::Modulus;
use rlwe_util::is_prime;

/// Generate a `num_bits`-bit prime, congruent to 1 mod `modulo`, strictly
/// smaller than `upper_bound`. Note that `num_bits` must belong to (10..=62),
/// and upper_bound must be <= 1 << num_bits.
pub fn generate_prime(num_bits: usize, modulo: u64, upper_bound: u64) -> Option<u64> {
    if !(10..=62).contains(&num_bits) || modulo == 0 {
        None
    } else {
        debug_assert!(
            (1u64 << num_bits) >= upper_bound,
            "upper_bound larger than number of bits"
        );

        let leading_zeros = (64 - num_bits) as u32;

        let mut tentative_prime = upper_bound - 1;
        while tentative_prime % modulo != 1 && tentative_prime.leading_zeros() == leading_zeros {
            tentative_prime -= 1
        }

        while tentative_prime.leading_zeros() == leading_zeros
            && !is_prime(tentative_prime)
            && tentative_prime >= modulo
        {
            tentative_prime -= modulo
        }

        if tentative_prime.leading_zeros() == leading_zeros && is_prime(tentative_prime) {
            Some(tentative_prime)
        } else {
            None
        }
    }
}

/// Returns the distinct prime factors of `n`.
pub fn prime_factors(mut n: u64) -> Vec<u64> {
    let mut factors = vec![];
    let mut d = 2u64;
    while d <= n / d {
        if n % d == 0 {
            factors.push(d);
            while n % d == 0 {
                n /= d;
            }
        }
        d += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

/// Returns the smallest element of multiplicative order exactly `order` modulo
/// the prime `p`, or `None` if `order` does not divide `p - 1`.
pub fn primitive_root(order: u64, p: &Modulus) -> Option<u64> {
    if order == 0 || (**p - 1) % order != 0 {
        return None;
    }
    if order == 1 {
        return Some(1);
    }
    let cofactor = (**p - 1) / order;
    let factors = prime_factors(order);
    (2..**p).find_map(|x| {
        let y = p.pow(x, cofactor);
        if factors.iter().all(|l| p.pow(y, order / l) != 1) {
            Some(y)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{generate_prime, prime_factors, primitive_root};
    use crate::zq::Modulus;

    // Verifies that the same moduli as in the NFLlib library are generated.
    // <https://github.com/quarkslab/NFLlib/blob/master/include/nfl/params.hpp>
    #[test]
    fn nfl_62bit_primes() {
        let mut generated = vec![];
        let mut upper_bound = u64::MAX >> 2;
        while generated.len() != 5 {
            let p = generate_prime(62, 2 * 1048576, upper_bound);
            assert!(p.is_some());
            upper_bound = p.unwrap();
            generated.push(upper_bound);
        }
        assert_eq!(
            generated,
            vec![
                4611686018326724609,
                4611686018309947393,
                4611686018282684417,
                4611686018257518593,
                4611686018232352769,
            ]
        );
    }

    #[test]
    fn non_power_of_two_modulo() {
        for m in [17u64, 45, 91, 127] {
            let p = generate_prime(40, m, 1 << 40).unwrap();
            assert_eq!(p % m, 1);
            assert_eq!(p.leading_zeros(), 24);
        }
        assert!(generate_prime(9, 17, 1 << 9).is_none());
        assert!(generate_prime(63, 17, u64::MAX).is_none());
        assert!(generate_prime(20, 0, 1 << 20).is_none());
    }

    #[test]
    fn factors() {
        assert_eq!(prime_factors(1), Vec::<u64>::new());
        assert_eq!(prime_factors(16), vec![2]);
        assert_eq!(prime_factors(45), vec![3, 5]);
        assert_eq!(prime_factors(17), vec![17]);
        assert_eq!(prime_factors(4095), vec![3, 5, 7, 13]);
        assert_eq!(
            prime_factors(u64::MAX),
            vec![3, 5, 17, 257, 641, 65537, 6700417]
        );
        assert_eq!(prime_factors(1 << 63), vec![2]);
    }

    #[test]
    fn roots() {
        let m = 45u64;
        let p = generate_prime(30, m, 1 << 30).unwrap();
        let q = Modulus::new(p).unwrap();
        let z = primitive_root(m, &q).unwrap();
        assert_eq!(q.pow(z, m), 1);
        for d in [3, 5, 9, 15] {
            assert_ne!(q.pow(z, m / d), 1);
        }
        assert!(primitive_root(p, &q).is_none());
        assert_eq!(primitive_root(1, &q), Some(1));
    }
}
