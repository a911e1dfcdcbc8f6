// 오디오 모듈
// PCM 트랙, 길이 조정, 믹싱

pub mod track;
pub mod reconcile;
pub mod mixer;

pub use mixer::CompositeAudioTrack;
pub use reconcile::{reconcile, Reconciliation};
pub use track::{frames_for, AudioTrack};

/// 내부 PCM 포맷 (f32 interleaved stereo 48kHz)
pub const OUTPUT_SAMPLE_RATE: u32 = 48000;
pub const OUTPUT_CHANNELS: u32 = 2;
