//! Known-offline flag checked before every dispatch

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared connectivity flag. Clones observe the same state.
///
/// The embedding application flips it from whatever network-status source it
/// has; the dispatcher only reads it.
#[derive(Debug, Clone)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
