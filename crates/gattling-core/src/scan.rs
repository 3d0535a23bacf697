//! Scan Coordinator
//!
//! Owns the discovery window: whether a scan is running and when it must
//! auto-stop. The coordinator produces effects; the sequencer sends them and
//! polls `deadline()` in its select loop so the window closes itself after
//! the configured period (10 seconds in the source application) unless
//! stopped manually first.

use core::time::Duration;

use tokio::time::Instant;

use crate::messages::Effect;

// ----------------------------------------------------------------------------
// Scan Coordinator
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct ScanCoordinator {
    window: Duration,
    scanning: bool,
    deadline: Option<Instant>,
}

impl ScanCoordinator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            scanning: false,
            deadline: None,
        }
    }

    /// Open a discovery window, arming the auto-stop deadline
    ///
    /// Returns `None` when a window is already open (the running scan and
    /// its deadline are left untouched).
    pub fn start(&mut self, now: Instant) -> Option<Effect> {
        if self.scanning {
            return None;
        }
        self.scanning = true;
        self.deadline = Some(now + self.window);
        Some(Effect::StartScan)
    }

    /// Close the window and cancel the deadline; idempotent
    pub fn stop(&mut self) -> Option<Effect> {
        if !self.scanning {
            return None;
        }
        self.scanning = false;
        self.deadline = None;
        Some(Effect::StopScan)
    }

    /// The transport reported a scan failure; scanning is over without a
    /// stop effect (there is nothing left to stop)
    pub fn mark_failed(&mut self) {
        self.scanning = false;
        self.deadline = None;
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Deadline for the sequencer's timer branch, if a window is open
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
