//! Session configuration
//!
//! Consolidates the tunable knobs of the session core: the scan window and
//! the channel buffer sizes used to wire the sequencer to its collaborators.

use core::time::Duration;

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration for a session
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// How long a discovery window stays open before auto-stopping
    pub scan_window: Duration,
    /// Channel buffer sizes
    pub channels: ChannelConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // The source application scans for 10 seconds per window.
            scan_window: Duration::from_secs(10),
            channels: ChannelConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Override the scan window
    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the channels connecting the sequencer to its peers
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (presentation → sequencer)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (transport → sequencer)
    pub event_buffer_size: usize,
    /// Buffer size for Effect channels (sequencer → transport)
    pub effect_buffer_size: usize,
    /// Buffer size for AppEvent channels (sequencer → presentation)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,   // user commands are infrequent
            event_buffer_size: 128,    // advertisements can be bursty
            effect_buffer_size: 64,    // effects are consumed promptly
            app_event_buffer_size: 64, // UI updates need responsiveness
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scan_window() {
        let config = SessionConfig::default();
        assert_eq!(config.scan_window, Duration::from_secs(10));
    }

    #[test]
    fn test_with_scan_window() {
        let config = SessionConfig::default().with_scan_window(Duration::from_secs(3));
        assert_eq!(config.scan_window, Duration::from_secs(3));
    }
}
