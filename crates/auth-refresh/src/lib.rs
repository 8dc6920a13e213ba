//! Request execution with single-flight credential renewal
//!
//! Every outbound API call goes through `RequestDispatcher::execute`, which
//! attaches the current bearer credential and hands the response to the
//! `AuthGate`. A first 401 on a request suspends it on the `RefreshCoordinator`,
//! which guarantees at most one renewal call is in flight no matter how many
//! requests fail at once, then replays every suspended request with the new
//! credential (or fails them all with `AuthExpired`).
//!
//! Request lifecycle:
//! 1. Dispatcher checks connectivity → `NetworkUnavailable` if offline
//! 2. Transport call with `Authorization: Bearer <token>`
//! 3. Non-401 → returned to the caller (non-2xx as `Error::Http`)
//! 4. First 401 → marked retried, queued on the coordinator
//! 5. Renewal succeeds → credential stored, request replayed once
//! 6. Renewal fails, times out, or the replay gets 401 again → session
//!    invalidated, caller gets `AuthExpired`

pub mod connectivity;
pub mod coordinator;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod renewer;

#[cfg(test)]
mod test_support;

pub use connectivity::Connectivity;
pub use coordinator::{RefreshCoordinator, RefreshState};
pub use descriptor::{RequestDescriptor, Response};
pub use dispatcher::{RequestDispatcher, Settings};
pub use error::{Error, Result};
pub use gate::{AuthGate, Verdict};
pub use renewer::{EndpointRenewer, RenewalError, Renewer};
