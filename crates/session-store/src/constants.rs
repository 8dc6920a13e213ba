//! Session constants
//!
//! Storage keys match what the web front-end keeps in its browser storage so a
//! session file can be inspected alongside it. Endpoint paths are relative to
//! the API base URL.

use std::time::Duration;

/// Storage key for the bearer access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the cached profile of the logged-in user
pub const USER_KEY: &str = "user";

/// Credential renewal endpoint (authorized by the refresh cookie, not a bearer)
pub const RENEWAL_PATH: &str = "/auth/refresh";

/// Login endpoint; its 401s mean bad credentials, not an expired session
pub const LOGIN_PATH: &str = "/auth/login";

/// Per-request timeout applied to every outbound call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single renewal call
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered session events per subscriber before lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 16;
