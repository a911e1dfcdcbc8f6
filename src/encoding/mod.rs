// 인코딩 & 합성 모듈
// H.264 비디오 + AAC 오디오 → MP4 컨테이너

pub mod encoder;
pub mod combiner;
pub mod synth;

pub use combiner::{
    combine_video_with_audio, default_output_path, AudioVideoCombiner, CombineRequest,
};
pub use encoder::{encoders_available, EncodeSettings, MediaWriter};
