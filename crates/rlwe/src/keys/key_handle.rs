//! Handles identifying the secret key of a ciphertext part.

use std::fmt::Display;

/// A handle identifying the key s_i(X^t)^k, with k = `power_of_s`,
/// t = `power_of_x` and i = `secret_key_id`, relative to which a ciphertext
/// part is defined.
///
/// A handle with `power_of_s == 0` is the constant 1: the part is added as is
/// during decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHandle {
    power_of_s: u64,
    power_of_x: u64,
    secret_key_id: usize,
}

impl Default for KeyHandle {
    fn default() -> Self {
        Self::base(0)
    }
}

impl KeyHandle {
    /// Creates a handle for s_id(X^x)^s.
    pub const fn new(power_of_s: u64, power_of_x: u64, secret_key_id: usize) -> Self {
        if power_of_s == 0 {
            Self::one()
        } else {
            Self {
                power_of_s,
                power_of_x,
                secret_key_id,
            }
        }
    }

    /// The handle of the constant 1.
    pub const fn one() -> Self {
        Self {
            power_of_s: 0,
            power_of_x: 1,
            secret_key_id: 0,
        }
    }

    /// The handle of the secret key itself.
    pub const fn base(secret_key_id: usize) -> Self {
        Self {
            power_of_s: 1,
            power_of_x: 1,
            secret_key_id,
        }
    }

    /// Returns whether the handle is the constant 1.
    pub const fn is_one(&self) -> bool {
        self.power_of_s == 0
    }

    /// Returns whether the handle is the secret key `secret_key_id` itself.
    pub const fn is_base(&self, secret_key_id: usize) -> bool {
        self.power_of_s == 1 && self.power_of_x == 1 && self.secret_key_id == secret_key_id
    }

    /// The exponent of the secret key.
    pub const fn power_of_s(&self) -> u64 {
        self.power_of_s
    }

    /// The automorphism X -> X^t applied to the secret key.
    pub const fn power_of_x(&self) -> u64 {
        self.power_of_x
    }

    /// The index of the secret key.
    pub const fn secret_key_id(&self) -> usize {
        self.secret_key_id
    }

    /// The handle after applying the automorphism X -> X^k.
    pub(crate) fn automorph(&self, k: u64, m: u64) -> Self {
        if self.is_one() {
            *self
        } else {
            Self {
                power_of_x: ((self.power_of_x as u128 * k as u128) % m as u128) as u64,
                ..*self
            }
        }
    }
}

impl Display for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {} {}]",
            self.power_of_s, self.power_of_x, self.secret_key_id
        )
    }
}
