// 비디오 소스 - 입력 파일 열기, 길이/스트림 정보 조회, 프레임 디코딩
// 아키텍처: 소유권 기반 리소스 관리 (decode_frames가 self를 소비 → Drop에서 한 번만 해제)

use crate::error::{CombineError, CombineResult};
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

/// 출력 비디오 포맷 (인코더 설정용)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// 프레임레이트를 알 수 없을 때 기본값
const FALLBACK_FPS: f64 = 30.0;

/// 열린 비디오 입력
pub struct MediaSource {
    path: PathBuf,
    input_ctx: ffmpeg::format::context::Input,
    video_stream_index: usize,
    /// 내장 오디오 스트림 (없으면 None)
    audio_stream_index: Option<usize>,
    decoder: ffmpeg::codec::decoder::Video,
    /// 디코더 출력 → YUV420P (인코더 입력 포맷)
    scaler: ffmpeg::software::scaling::Context,
    width: u32,
    height: u32,
    fps: f64,
    duration_secs: f64,
}

impl MediaSource {
    /// 비디오 파일 열기
    pub fn open_video(file_path: &Path) -> CombineResult<Self> {
        ffmpeg::init()
            .map_err(|e| CombineError::DecodeFailure(format!("FFmpeg init failed: {}", e)))?;

        // 1차 시도: 기본 오픈
        // 2차 시도: moov atom이 파일 끝에 있는 경우 — probesize 확장
        let input_ctx = ffmpeg::format::input(&file_path)
            .or_else(|_| {
                let mut opts = ffmpeg::Dictionary::new();
                opts.set("probesize", "100000000"); // 100MB
                opts.set("analyzeduration", "30000000"); // 30초
                ffmpeg::format::input_with_dictionary(&file_path, opts)
            })
            .map_err(|e| {
                CombineError::DecodeFailure(format!(
                    "Failed to open video file '{}': {}",
                    file_path.display(),
                    e
                ))
            })?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| {
                CombineError::DecodeFailure(format!(
                    "No video stream found in '{}'",
                    file_path.display()
                ))
            })?;

        let video_stream_index = video_stream.index();
        let audio_stream_index = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .map(|s| s.index());

        let fps = {
            let rate = f64::from(video_stream.avg_frame_rate());
            if rate.is_finite() && rate > 0.0 { rate } else { FALLBACK_FPS }
        };

        // Duration 계산 (스트림 → 컨테이너 순)
        let duration_secs = if video_stream.duration() > 0 {
            video_stream.duration() as f64 * f64::from(video_stream.time_base())
        } else if input_ctx.duration() > 0 {
            input_ctx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let mut context = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
            .map_err(|e| CombineError::DecodeFailure(format!("Failed to create context: {}", e)))?;

        // 디코더당 최대 4스레드 (인코더가 나머지 코어 사용)
        if let Ok(parallelism) = std::thread::available_parallelism() {
            context.set_threading(ffmpeg::threading::Config {
                kind: ffmpeg::threading::Type::Frame,
                count: parallelism.get().min(4),
            });
        }

        let decoder = context
            .decoder()
            .video()
            .map_err(|e| CombineError::DecodeFailure(format!("Failed to get video decoder: {}", e)))?;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| CombineError::DecodeFailure(format!("Failed to create scaler: {}", e)))?;

        log::debug!(
            "[MEDIA] 열기: {} ({}x{} @ {:.2}fps, {:.3}s, audio={})",
            file_path.display(),
            width,
            height,
            fps,
            duration_secs,
            audio_stream_index.is_some()
        );

        Ok(Self {
            path: file_path.to_path_buf(),
            input_ctx,
            video_stream_index,
            audio_stream_index,
            decoder,
            scaler,
            width,
            height,
            fps,
            duration_secs,
        })
    }

    pub fn duration(&self) -> f64 { self.duration_secs }
    pub fn has_audio(&self) -> bool { self.audio_stream_index.is_some() }

    pub fn format(&self) -> VideoFormat {
        VideoFormat {
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }

    /// 모든 비디오 프레임을 YUV420P로 디코딩하여 sink에 전달
    /// 소스를 소비 (반환 시 입력 컨텍스트 해제)
    /// 반환: 전달한 프레임 수
    pub fn decode_frames<F>(mut self, mut sink: F) -> CombineResult<usize>
    where
        F: FnMut(&mut ffmpeg::frame::Video) -> CombineResult<()>,
    {
        let mut count = 0usize;

        for (stream, packet) in self.input_ctx.packets() {
            if stream.index() != self.video_stream_index {
                continue;
            }
            // 손상된 패킷은 건너뜀 (디코더가 다음 키프레임에서 복구)
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::warn!("[MEDIA] 패킷 디코딩 실패 (건너뜀): {}", e);
                continue;
            }
            count += drain_decoder(&mut self.decoder, &mut self.scaler, &mut sink)?;
        }

        // EOF: 디코더 내부 버퍼(B-frame 등) 비우기
        self.decoder
            .send_eof()
            .map_err(|e| CombineError::DecodeFailure(format!("Failed to flush video decoder: {}", e)))?;
        count += drain_decoder(&mut self.decoder, &mut self.scaler, &mut sink)?;

        Ok(count)
    }
}

impl Drop for MediaSource {
    fn drop(&mut self) {
        log::debug!("[MEDIA] 닫기: {}", self.path.display());
    }
}

/// 디코더에서 받을 수 있는 프레임을 모두 변환 후 sink에 전달
/// (모듈 레벨 함수 - input_ctx 순회 중 borrow 충돌 방지)
fn drain_decoder<F>(
    decoder: &mut ffmpeg::codec::decoder::Video,
    scaler: &mut ffmpeg::software::scaling::Context,
    sink: &mut F,
) -> CombineResult<usize>
where
    F: FnMut(&mut ffmpeg::frame::Video) -> CombineResult<()>,
{
    let mut count = 0;
    let mut decoded = ffmpeg::frame::Video::empty();
    while super::frame_received(decoder.receive_frame(&mut decoded))
        .map_err(|e| CombineError::DecodeFailure(format!("Failed to decode video frame: {}", e)))?
    {
        let mut yuv = ffmpeg::frame::Video::empty();
        scaler
            .run(&decoded, &mut yuv)
            .map_err(|e| CombineError::DecodeFailure(format!("Scaler failed: {}", e)))?;
        // 픽처 타입은 인코더가 결정
        yuv.set_kind(ffmpeg::picture::Type::None);
        sink(&mut yuv)?;
        count += 1;
    }
    Ok(count)
}
