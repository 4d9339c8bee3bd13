//! Key-switching matrices.

use super::{KeyHandle, SecretKey};
use crate::{Context, Error, Result};
use itertools::izip;
use num_bigint::BigUint;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rlwe_math::rq::{Poly, Representation};
use zeroize::Zeroizing;

/// A key-switching matrix from the key `from_key` to the secret key
/// `to_key_id`.
///
/// For each digit i of the context, the matrix holds an RLWE sample
/// (b_i, a_i) such that b_i + a_i * s = t * e_i + P * D_0 * ... * D_(i-1) *
/// from_key, where s is the target secret key, t the plaintext space of the
/// matrix, P the product of the special primes and D_j the product of the
/// primes of the j-th digit. The a_i are uniform over all the primes and are
/// regenerated from `prg_seed`.
#[derive(Debug, Clone)]
pub struct KeySwitch {
    pub(crate) from_key: KeyHandle,
    pub(crate) to_key_id: usize,
    pub(crate) ptxt_space: u64,
    pub(crate) b: Vec<Poly>,
    pub(crate) prg_seed: <ChaCha8Rng as SeedableRng>::Seed,
    pub(crate) noise_var: f64,
}

static DUMMY: KeySwitch = KeySwitch {
    from_key: KeyHandle::one(),
    to_key_id: usize::MAX,
    ptxt_space: 0,
    b: Vec::new(),
    prg_seed: [0u8; 32],
    noise_var: 0.0,
};

impl PartialEq for KeySwitch {
    fn eq(&self, other: &Self) -> bool {
        self.from_key == other.from_key
            && self.to_key_id == other.to_key_id
            && self.ptxt_space == other.ptxt_space
            && self.prg_seed == other.prg_seed
            && self.b == other.b
    }
}

impl KeySwitch {
    /// The sentinel returned by lookups that find no matrix.
    pub fn dummy() -> &'static KeySwitch {
        &DUMMY
    }

    /// Returns whether this is the sentinel matrix.
    pub fn is_dummy(&self) -> bool {
        self.to_key_id == usize::MAX && self.b.is_empty()
    }

    /// The source key of the matrix.
    pub const fn from_key(&self) -> &KeyHandle {
        &self.from_key
    }

    /// The id of the target secret key.
    pub const fn to_key_id(&self) -> usize {
        self.to_key_id
    }

    /// The plaintext space of the matrix.
    pub const fn ptxt_space(&self) -> u64 {
        self.ptxt_space
    }

    /// Number of digits of the matrix.
    pub fn len(&self) -> usize {
        self.b.len()
    }

    /// Returns whether the matrix has no digits.
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Variance of the error of each RLWE sample.
    pub const fn noise_var(&self) -> f64 {
        self.noise_var
    }

    /// Generate the polynomials a_i from the seed.
    pub(crate) fn randomizers(
        ctx: &Context,
        seed: <ChaCha8Rng as SeedableRng>::Seed,
        size: usize,
    ) -> Vec<Poly> {
        let mut rng = ChaCha8Rng::from_seed(seed);
        let all = ctx.all_primes();
        (0..size)
            .map(|_| {
                let mut seed_i = <ChaCha8Rng as SeedableRng>::Seed::default();
                rng.fill(&mut seed_i);
                Poly::random_from_seed(ctx.ring(), &all, Representation::Evaluation, seed_i)
            })
            .collect()
    }

    /// The polynomials a_i of the matrix.
    pub(crate) fn a(&self, ctx: &Context) -> Vec<Poly> {
        Self::randomizers(ctx, self.prg_seed, self.b.len())
    }

    /// Check the matrix against the secret key.
    ///
    /// This recomputes b_i - P * D_0 * ... * D_(i-1) * from_key + a_i * s for
    /// every digit and checks that the result is divisible by the plaintext
    /// space. Only matrices between two distinct keys without automorphism
    /// or power can be verified. Returns the largest ratio between the size
    /// in bits of the error and the size in bits of the modulus.
    pub fn verify(&self, sk: &SecretKey) -> Result<f64> {
        let from_id = self.from_key.secret_key_id();
        if self.from_key.power_of_s() != 1
            || self.from_key.power_of_x() != 1
            || from_id == self.to_key_id
            || self.b.is_empty()
        {
            return Err(Error::UnspecifiedInput(format!(
                "Cannot verify the key-switching matrix from {} to key {}",
                self.from_key, self.to_key_id
            )));
        }
        let ctx = sk.public_key().ctx();
        let from_key = sk.secret_key(from_id)?;
        let to_key = sk.secret_key(self.to_key_id)?;

        let modulus_bits = ctx.ring().modulus(&ctx.all_primes())?.bits() as f64;
        let mut prod = ctx.special_modulus()?;
        let mut ratio = 0f64;
        for (i, (b, a, digit)) in izip!(&self.b, self.a(ctx), ctx.digits()).enumerate() {
            let mut c = Zeroizing::new(&a * to_key);
            *c += b;
            *c -= &*Zeroizing::new(from_key * &prod);
            let coefficients = c.to_bigints()?;
            let t = self.ptxt_space.max(1);
            if coefficients
                .iter()
                .any(|ci| rlwe_math::zq::bigint_mod(ci, t) != 0)
            {
                log::warn!(
                    "Key-switching matrix from {} to key {}: digit {i} is not divisible by {t}",
                    self.from_key,
                    self.to_key_id
                );
                return Err(Error::DefaultError(format!(
                    "Key-switching matrix verification failed at digit {i}"
                )));
            }
            let error_bits = coefficients
                .iter()
                .map(|ci| (ci.magnitude() / BigUint::from(t)).bits())
                .max()
                .unwrap_or(0) as f64;
            ratio = ratio.max(error_bits / modulus_bits);
            prod *= ctx.ring().modulus(digit)?;
        }
        log::info!(
            "Key-switching matrix from {} to key {} verified: error/modulus bits = {ratio:.3}",
            self.from_key,
            self.to_key_id
        );
        Ok(ratio)
    }
}
