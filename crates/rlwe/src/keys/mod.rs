//! Secret keys, public keys and key-switching matrices.

mod key_handle;
mod key_switch;
mod public_key;
mod rlwe;
mod secret_key;

pub use key_handle::KeyHandle;
pub use key_switch::KeySwitch;
pub use public_key::{KeySwitchStrategy, PublicKey};
pub use secret_key::SecretKey;
