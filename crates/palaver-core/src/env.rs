//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (time, randomness). The
//! session controller takes time as explicit tick input and draws local
//! message identifiers from the environment, so the same code runs against
//! real clocks in production and synthetic clocks in tests.

use std::time::Duration;

/// Abstract environment providing time and randomness.
///
/// Implementations guarantee that `now()` never goes backwards and that
/// `random_bytes()` draws from cryptographically secure entropy in
/// production.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while test
    /// environments may use synthetic instants.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// Successive calls within one execution context return non-decreasing
    /// values.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// The only async method in the trait; used by runtime code, never by
    /// session logic.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Wall-clock unix time in milliseconds.
    ///
    /// Only for display timestamps on optimistic messages; ordering and
    /// deadlines always use the monotonic [`now`](Environment::now).
    fn unix_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// Deterministic environments produce the same sequence for the same
    /// seed, which is what makes session tests reproducible.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`, used for local message identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
