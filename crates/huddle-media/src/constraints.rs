use serde::{Deserialize, Serialize};

use huddle_shared::types::CallType;

/// Microphone capture constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_size_ms: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            frame_size_ms: 20,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

impl AudioConstraints {
    pub fn frame_size_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_size_ms as usize) / 1000
    }
}

/// Camera capture constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            bitrate_kbps: 2500,
        }
    }
}

/// What a call asks the capture devices for. Audio is always requested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: AudioConstraints,
    pub video: Option<VideoConstraints>,
}

impl MediaConstraints {
    pub fn for_call(call_type: CallType) -> Self {
        Self {
            audio: AudioConstraints::default(),
            video: call_type.wants_video().then(VideoConstraints::default),
        }
    }

    pub fn wants_video(&self) -> bool {
        self.video.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_defaults() {
        let audio = AudioConstraints::default();
        assert_eq!(audio.frame_size_samples(), 960);
        assert!(audio.echo_cancellation);
    }

    #[test]
    fn video_only_for_video_calls() {
        assert!(!MediaConstraints::for_call(CallType::Audio).wants_video());
        let video = MediaConstraints::for_call(CallType::Video);
        assert_eq!(video.video.map(|v| (v.width, v.height, v.fps)), Some((1280, 720, 30)));
    }
}
