// 오디오 디코더 - FFmpeg으로 오디오 스트림 전체를 f32 PCM 트랙으로 디코딩
// 배경음 파일 + 비디오 내장 오디오 겸용

use crate::audio::{AudioTrack, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::{CombineError, CombineResult};
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

/// 오디오 디코더 (f32 stereo 48kHz 출력)
pub struct AudioDecoder {
    path: PathBuf,
    input_ctx: ffmpeg::format::context::Input,
    audio_stream_index: usize,
    decoder: ffmpeg::codec::decoder::Audio,
    resampler: ffmpeg::software::resampling::Context,
    /// 입력 채널 레이아웃 (레이아웃 없는 프레임 보정용)
    input_layout: ffmpeg::ChannelLayout,
    duration_ms: i64,
}

impl AudioDecoder {
    /// 파일의 대표 오디오 스트림 열기
    pub fn open(file_path: &Path) -> CombineResult<Self> {
        ffmpeg::init()
            .map_err(|e| CombineError::DecodeFailure(format!("FFmpeg init failed: {}", e)))?;

        let input_ctx = ffmpeg::format::input(&file_path).map_err(|e| {
            CombineError::DecodeFailure(format!(
                "Failed to open audio file '{}': {}",
                file_path.display(),
                e
            ))
        })?;

        // 오디오 스트림 찾기
        let audio_stream = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .ok_or_else(|| {
                CombineError::DecodeFailure(format!(
                    "No audio stream found in '{}'",
                    file_path.display()
                ))
            })?;

        let audio_stream_index = audio_stream.index();
        let time_base = audio_stream.time_base();

        // Duration 계산 (메타데이터, 로그용 — 실제 길이는 디코딩된 샘플 수 기준)
        let duration_ms = if audio_stream.duration() > 0 {
            (audio_stream.duration() * i64::from(time_base.numerator()) * 1000)
                / i64::from(time_base.denominator())
        } else if input_ctx.duration() > 0 {
            input_ctx.duration() / 1000 // AV_TIME_BASE(μs) → ms
        } else {
            0
        };

        let context = ffmpeg::codec::context::Context::from_parameters(audio_stream.parameters())
            .map_err(|e| CombineError::DecodeFailure(format!("Failed to create audio context: {}", e)))?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| CombineError::DecodeFailure(format!("Failed to get audio decoder: {}", e)))?;

        // 레이아웃 정보가 없는 스트림(일부 WAV 등)은 채널 수로 기본 레이아웃 추정
        let input_layout = if decoder.channel_layout().is_empty() {
            ffmpeg::ChannelLayout::default(i32::from(decoder.channels()))
        } else {
            decoder.channel_layout()
        };

        // 리샘플러 설정 (입력 포맷 → f32 stereo 48kHz)
        let resampler = ffmpeg::software::resampling::Context::get(
            decoder.format(),
            input_layout,
            decoder.rate(),
            ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed),
            ffmpeg::ChannelLayout::STEREO,
            OUTPUT_SAMPLE_RATE,
        )
        .map_err(|e| CombineError::DecodeFailure(format!("Failed to create resampler: {}", e)))?;

        log::debug!(
            "[AUDIO] 열기: {} ({}Hz, {}ch, {}ms)",
            file_path.display(),
            decoder.rate(),
            decoder.channels(),
            duration_ms
        );

        Ok(Self {
            path: file_path.to_path_buf(),
            input_ctx,
            audio_stream_index,
            decoder,
            resampler,
            input_layout,
            duration_ms,
        })
    }

    /// 스트림 전체 디코딩 → 트랙
    /// 디코더를 소비 (반환 시 입력 컨텍스트 해제)
    pub fn decode_all(mut self) -> CombineResult<AudioTrack> {
        let estimate = (self.duration_ms.max(0) as usize / 1000 + 1)
            * OUTPUT_SAMPLE_RATE as usize
            * OUTPUT_CHANNELS as usize;
        let mut samples = Vec::with_capacity(estimate);

        for (stream, packet) in self.input_ctx.packets() {
            if stream.index() != self.audio_stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::warn!("[AUDIO] 패킷 디코딩 실패 (건너뜀) {}: {}", self.path.display(), e);
                continue;
            }
            drain_decoder(&mut self.decoder, &mut self.resampler, self.input_layout, &mut samples)?;
        }

        // EOF: 디코더 버퍼 비우기
        self.decoder
            .send_eof()
            .map_err(|e| CombineError::DecodeFailure(format!("Failed to flush audio decoder: {}", e)))?;
        drain_decoder(&mut self.decoder, &mut self.resampler, self.input_layout, &mut samples)?;

        // 리샘플러 내부 지연 샘플 비우기
        let mut tail = ffmpeg::frame::Audio::empty();
        if self.resampler.flush(&mut tail).is_ok() && tail.samples() > 0 {
            append_packed(&tail, &mut samples);
        }

        let track = AudioTrack::new(samples, OUTPUT_SAMPLE_RATE, OUTPUT_CHANNELS);
        log::info!(
            "[AUDIO] 디코딩 완료: {} ({:.3}s)",
            self.path.display(),
            track.duration()
        );
        Ok(track)
    }
}

impl Drop for AudioDecoder {
    fn drop(&mut self) {
        log::debug!("[AUDIO] 닫기: {}", self.path.display());
    }
}

/// 디코더에서 받을 수 있는 프레임을 모두 리샘플링하여 추가
fn drain_decoder(
    decoder: &mut ffmpeg::codec::decoder::Audio,
    resampler: &mut ffmpeg::software::resampling::Context,
    input_layout: ffmpeg::ChannelLayout,
    out: &mut Vec<f32>,
) -> CombineResult<()> {
    let mut decoded = ffmpeg::frame::Audio::empty();
    while super::frame_received(decoder.receive_frame(&mut decoded))
        .map_err(|e| CombineError::DecodeFailure(format!("Failed to decode audio frame: {}", e)))?
    {
        if decoded.channel_layout().is_empty() {
            decoded.set_channel_layout(input_layout);
        }
        let mut resampled = ffmpeg::frame::Audio::empty();
        resampler
            .run(&decoded, &mut resampled)
            .map_err(|e| CombineError::DecodeFailure(format!("Resample failed: {}", e)))?;
        append_packed(&resampled, out);
    }
    Ok(())
}

/// packed f32 stereo 프레임 → interleaved 샘플 추가
fn append_packed(frame: &ffmpeg::frame::Audio, out: &mut Vec<f32>) {
    let sample_count = frame.samples() * OUTPUT_CHANNELS as usize;
    let byte_count = sample_count * std::mem::size_of::<f32>();
    let data = frame.data(0);

    if data.len() < byte_count {
        // 버퍼가 비정상적으로 작으면 무음으로 채워 길이 유지
        out.resize(out.len() + sample_count, 0.0);
        return;
    }

    out.extend(
        data[..byte_count]
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_is_decode_failure() {
        let result = AudioDecoder::open(Path::new("definitely-not-here.mp3"));
        assert!(matches!(result, Err(CombineError::DecodeFailure(_))));
    }
}
