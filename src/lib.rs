// soundtrack_engine - 비디오에 배경음 합성
// Rust + ffmpeg-next 기반: 길이 조정(반복/자르기) + 볼륨 믹스 + H.264/AAC 인코딩

pub mod error;
pub mod ffmpeg;
pub mod audio;
pub mod encoding;

pub use error::{CombineError, CombineResult, InputRole};
pub use encoding::{
    combine_video_with_audio, default_output_path, AudioVideoCombiner, CombineRequest,
    EncodeSettings,
};
