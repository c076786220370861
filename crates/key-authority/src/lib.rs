//! Key pool authority
//!
//! Holds at most one "current" API key and rotates across a pool of
//! interchangeable credentials stored in a `KeyStore`. Callers lease the
//! current secret via `get_key` and report outcomes back; those reports drive
//! the per-key health state machine.
//!
//! Key lifecycle:
//! 1. `register_key` stores a new secret (or reactivates a known one)
//! 2. `get_key` hands out the current secret, selecting the most starved
//!    eligible key when none is held
//! 3. A rate-limited failure puts the key into cooldown and forces rotation
//! 4. Repeated ordinary failures deactivate the key
//! 5. Cooldown expiry is detected lazily at the next selection or lease
//! 6. A deactivated key returns only via explicit reactivation

pub mod authority;
pub mod classify;
pub mod clock;
pub mod error;
pub mod events;

pub use authority::{AuthorityConfig, KeyAuthority};
pub use classify::{Classification, FailureInfo, classify, cooldown_expiry};
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use events::{EventSink, TracingSink};
