//! Quote acquisition constants.

use std::time::Duration;

/// Data younger than this is served without touching the store or provider.
pub const FRESH_WINDOW: Duration = Duration::from_secs(3 * 60);

/// The store is not re-queried if it was checked more recently than this.
pub const RECHECK_SUPPRESSION_WINDOW: Duration = Duration::from_secs(30);

/// A stale entry with no predecessor is stamped this long before expiry,
/// so it reads as "about to expire" rather than "just refreshed".
pub const STALE_ENTRY_HEADROOM: Duration = Duration::from_secs(30);

/// Minimum combined row count for the `all` selector to be served from the store.
pub const DEFAULT_MIN_ROWS_ALL: usize = 20;

/// Upper bound on a single live provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);
