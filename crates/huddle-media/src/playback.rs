//! Playback position of voice/audio attachments.
//!
//! One attachment plays at a time; starting another pauses the current
//! one. Positions survive pausing, so playback resumes where it stopped.

use std::collections::HashMap;

use tracing::debug;

use huddle_shared::types::MessageId;

/// Key of the `index`-th attachment of a message.
pub fn attachment_key(message_id: MessageId, index: usize) -> String {
    format!("{message_id}-{index}")
}

/// Format seconds as `m:ss`. Unknown durations read as `0:00`.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Playback {
    pub position: f64,
    /// Unknown until the player reports metadata. Recorded blobs often
    /// report an infinite duration, which is treated as unknown.
    pub duration: Option<f64>,
}

#[derive(Debug, Default)]
pub struct AudioPlaybackTracker {
    entries: HashMap<String, Playback>,
    playing: Option<String>,
}

impl AudioPlaybackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or resume) `key`. Returns the key that was paused to make
    /// room, if any.
    pub fn play(&mut self, key: &str) -> Option<String> {
        self.entries.entry(key.to_string()).or_default();
        let previous = self.playing.replace(key.to_string());
        match previous {
            Some(previous) if previous != key => {
                debug!(paused = %previous, playing = key, "Switching playback");
                Some(previous)
            }
            _ => None,
        }
    }

    pub fn pause(&mut self, key: &str) {
        if self.playing.as_deref() == Some(key) {
            self.playing = None;
        }
    }

    pub fn is_playing(&self, key: &str) -> bool {
        self.playing.as_deref() == Some(key)
    }

    pub fn current(&self) -> Option<&str> {
        self.playing.as_deref()
    }

    pub fn set_duration(&mut self, key: &str, seconds: f64) {
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.duration = (seconds.is_finite() && seconds > 0.0).then_some(seconds);
        if let Some(duration) = entry.duration {
            entry.position = entry.position.min(duration);
        }
    }

    pub fn update_position(&mut self, key: &str, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let entry = self.entries.entry(key.to_string()).or_default();
        let upper = entry.duration.unwrap_or(f64::MAX);
        entry.position = seconds.clamp(0.0, upper);
    }

    /// Playback reached the end: rewind and stop.
    pub fn finish(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.position = 0.0;
        }
        self.pause(key);
    }

    pub fn state(&self, key: &str) -> Playback {
        self.entries.get(key).copied().unwrap_or_default()
    }

    /// Fraction played in `0.0..=1.0`; 0 while the duration is unknown.
    pub fn progress(&self, key: &str) -> f64 {
        let state = self.state(key);
        match state.duration {
            Some(duration) => (state.position / duration).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    /// Forget an attachment whose message went away.
    pub fn forget(&mut self, key: &str) {
        self.entries.remove(key);
        self.pause(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_playback_at_a_time() {
        let mut tracker = AudioPlaybackTracker::new();
        assert_eq!(tracker.play("a"), None);
        tracker.update_position("a", 3.0);

        assert_eq!(tracker.play("b").as_deref(), Some("a"));
        assert!(!tracker.is_playing("a"));
        assert!(tracker.is_playing("b"));
        assert_eq!(tracker.play("b"), None);

        // Resumes where it stopped.
        tracker.play("a");
        assert_eq!(tracker.state("a").position, 3.0);
    }

    #[test]
    fn progress_needs_a_duration() {
        let mut tracker = AudioPlaybackTracker::new();
        tracker.set_duration("a", f64::INFINITY);
        tracker.update_position("a", 4.0);
        assert_eq!(tracker.progress("a"), 0.0);

        tracker.set_duration("a", 8.0);
        assert_eq!(tracker.progress("a"), 0.5);

        tracker.update_position("a", 20.0);
        assert_eq!(tracker.progress("a"), 1.0);
    }

    #[test]
    fn finish_rewinds_and_stops() {
        let mut tracker = AudioPlaybackTracker::new();
        tracker.play("a");
        tracker.set_duration("a", 10.0);
        tracker.update_position("a", 9.5);

        tracker.finish("a");
        assert_eq!(tracker.current(), None);
        assert_eq!(tracker.state("a").position, 0.0);
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(7.9), "0:07");
        assert_eq!(format_clock(65.0), "1:05");
        assert_eq!(format_clock(f64::NAN), "0:00");
        assert_eq!(attachment_key(MessageId(42), 1), "42-1");
    }
}
