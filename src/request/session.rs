use std::sync::atomic::{AtomicBool, Ordering};

/// Capability check consulted whenever a call attaches a credential.
pub trait SessionCapability: Send + Sync {
    fn is_admin(&self) -> bool;
}

/// Visitor session: credentials always travel as an access key.
#[derive(Debug, Default)]
pub struct GuestSession;

impl SessionCapability for GuestSession {
    fn is_admin(&self) -> bool {
        false
    }
}

/// Session whose elevation can change at runtime (login, logout).
#[derive(Debug, Default)]
pub struct SwitchableSession {
    admin: AtomicBool,
}

impl SwitchableSession {
    pub fn new(admin: bool) -> Self {
        Self {
            admin: AtomicBool::new(admin),
        }
    }

    pub fn set_admin(&self, admin: bool) {
        self.admin.store(admin, Ordering::Relaxed);
    }
}

impl SessionCapability for SwitchableSession {
    fn is_admin(&self) -> bool {
        self.admin.load(Ordering::Relaxed)
    }
}
