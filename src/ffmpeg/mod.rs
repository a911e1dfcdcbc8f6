// FFmpeg 래퍼 모듈
// 비디오/오디오 소스 열기 + 디코딩

pub mod source;
pub mod audio_decoder;

pub use audio_decoder::AudioDecoder;
pub use source::{MediaSource, VideoFormat};

use ffmpeg_next as ffmpeg;

/// receive_frame 결과 판별
/// - Ok(true): 프레임 수신
/// - Ok(false): 더 받을 프레임 없음 (EAGAIN / EOF)
/// - Err: 실제 디코딩 에러
pub(crate) fn frame_received(result: Result<(), ffmpeg::Error>) -> Result<bool, ffmpeg::Error> {
    match result {
        Ok(()) => Ok(true),
        Err(ffmpeg::Error::Eof) => Ok(false),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => Ok(false),
        Err(e) => Err(e),
    }
}
