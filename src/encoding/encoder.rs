// 미디어 라이터 - FFmpeg 기반 H.264 + AAC 인코딩 → 컨테이너 먹싱
// YUV420P 프레임 + f32 interleaved stereo PCM 입력
// 비디오 프레임을 쓸 때마다 그 시점까지의 오디오를 함께 기록 (인터리빙)

use crate::audio::{frames_for, AudioTrack, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::{CombineError, CombineResult};
use crate::ffmpeg::VideoFormat;
use ffmpeg::codec;
use ffmpeg::format::Pixel;
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

/// 인코딩 설정
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    /// H.264 품질 (0=무손실, 23=기본, 51=최저)
    pub crf: u32,
    /// x264 프리셋
    pub preset: String,
    /// AAC 비트레이트 (bps)
    pub audio_bit_rate: usize,
    /// 인코더 스레드 수 (None = 사용 가능한 코어 수)
    pub threads: Option<usize>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            crf: 23,
            preset: "medium".to_string(),
            audio_bit_rate: 192_000,
            threads: None,
        }
    }
}

impl EncodeSettings {
    pub fn thread_count(&self) -> usize {
        self.threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// 출력에 필요한 인코더가 모두 있는지 확인 (H.264 + AAC)
pub fn encoders_available() -> bool {
    ffmpeg::init().is_ok()
        && ffmpeg::encoder::find(codec::Id::H264).is_some()
        && ffmpeg::encoder::find(codec::Id::AAC).is_some()
}

fn encode_err(context: &str, e: impl std::fmt::Display) -> CombineError {
    CombineError::EncodeFailure(format!("{}: {}", context, e))
}

/// 비디오 스트림 출력 상태
struct VideoOutput {
    encoder: ffmpeg::encoder::Video,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    fps: f64,
    width: u32,
    height: u32,
    frame_count: i64,
}

/// 오디오 스트림 출력 상태
struct AudioOutput {
    encoder: ffmpeg::encoder::Audio,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    /// AAC 프레임 크기 (보통 1024)
    frame_size: usize,
    /// 기록 대기 중인 PCM (f32 interleaved stereo)
    pending: AudioTrack,
    /// pending에서 이미 인코더로 보낸 프레임 수 (= 다음 PTS)
    cursor: usize,
}

/// 출력 파일 (헤더 작성 ~ 트레일러 작성)
pub struct MediaWriter {
    path: PathBuf,
    output_ctx: ffmpeg::format::context::Output,
    video: Option<VideoOutput>,
    audio: Option<AudioOutput>,
}

impl MediaWriter {
    /// 출력 파일 생성 + 헤더 작성
    /// - video: None이면 오디오 전용 파일
    /// - audio: 48kHz stereo 트랙 (볼륨 배율은 여기서 반영), None이면 비디오 전용
    pub fn create(
        output_path: &Path,
        video: Option<VideoFormat>,
        audio: Option<AudioTrack>,
        settings: &EncodeSettings,
    ) -> CombineResult<Self> {
        ffmpeg::init().map_err(|e| encode_err("FFmpeg init failed", e))?;

        if video.is_none() && audio.is_none() {
            return Err(CombineError::InvalidInput(
                "output needs at least one stream".to_string(),
            ));
        }
        if let Some(audio) = &audio {
            if audio.sample_rate() != OUTPUT_SAMPLE_RATE || audio.channels() != OUTPUT_CHANNELS {
                return Err(CombineError::InvalidInput(format!(
                    "audio must be {}Hz/{}ch, got {}Hz/{}ch",
                    OUTPUT_SAMPLE_RATE,
                    OUTPUT_CHANNELS,
                    audio.sample_rate(),
                    audio.channels()
                )));
            }
        }

        // 출력 컨텍스트 생성 (확장자로 컨테이너 결정)
        let mut output_ctx = ffmpeg::format::output(&output_path)
            .map_err(|e| encode_err("Failed to create output", e))?;

        // 글로벌 헤더 플래그 사전 확인 (borrow 충돌 방지)
        let needs_global_header = output_ctx
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let video = match video {
            Some(format) => Some(Self::add_video_stream(
                &mut output_ctx,
                format,
                settings,
                needs_global_header,
            )?),
            None => None,
        };
        let audio = match audio {
            Some(track) => Some(Self::add_audio_stream(
                &mut output_ctx,
                track.render(),
                settings,
                needs_global_header,
            )?),
            None => None,
        };

        output_ctx
            .write_header()
            .map_err(|e| encode_err("Failed to write header", e))?;

        log::info!(
            "[ENCODE] 출력 생성: {} (video={}, audio={}, threads={})",
            output_path.display(),
            video.is_some(),
            audio.is_some(),
            settings.thread_count()
        );

        Ok(Self {
            path: output_path.to_path_buf(),
            output_ctx,
            video,
            audio,
        })
    }

    fn add_video_stream(
        output_ctx: &mut ffmpeg::format::context::Output,
        format: VideoFormat,
        settings: &EncodeSettings,
        needs_global_header: bool,
    ) -> CombineResult<VideoOutput> {
        // H.264 인코더 찾기
        let codec = ffmpeg::encoder::find(codec::Id::H264)
            .ok_or_else(|| CombineError::EncodeFailure("H.264 encoder not found".to_string()))?;

        let mut video_stream = output_ctx
            .add_stream(codec)
            .map_err(|e| encode_err("Failed to add video stream", e))?;
        let stream_index = video_stream.index();

        // time_base 설정 (1/fps 기반)
        let fps_num = (format.fps * 1000.0).round() as i32;
        let fps_den = 1000i32;
        let time_base = ffmpeg::Rational::new(fps_den, fps_num);

        let threads = settings.thread_count();
        let mut context = codec::context::Context::from_parameters(video_stream.parameters())
            .map_err(|e| encode_err("Failed to create encoder context", e))?;
        // 인코딩은 사용 가능한 코어 전부 사용
        context.set_threading(ffmpeg::threading::Config {
            kind: ffmpeg::threading::Type::Frame,
            count: threads,
        });

        let mut encoder = context
            .encoder()
            .video()
            .map_err(|e| encode_err("Failed to get video encoder", e))?;

        encoder.set_width(format.width);
        encoder.set_height(format.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(ffmpeg::Rational::new(fps_num, fps_den)));

        // CRF 품질 설정 + 인코딩 속도
        let mut opts = ffmpeg::Dictionary::new();
        opts.set("crf", &settings.crf.to_string());
        opts.set("preset", &settings.preset);
        opts.set("threads", &threads.to_string());
        // 글로벌 헤더 플래그 (MP4 컨테이너 호환)
        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |= codec::flag::Flags::GLOBAL_HEADER.bits() as i32;
            }
        }

        let encoder = encoder
            .open_with(opts)
            .map_err(|e| encode_err("Failed to open video encoder", e))?;

        // 스트림 파라미터 업데이트
        video_stream.set_parameters(&encoder);

        Ok(VideoOutput {
            encoder,
            stream_index,
            time_base,
            fps: format.fps,
            width: format.width,
            height: format.height,
            frame_count: 0,
        })
    }

    fn add_audio_stream(
        output_ctx: &mut ffmpeg::format::context::Output,
        pending: AudioTrack,
        settings: &EncodeSettings,
        needs_global_header: bool,
    ) -> CombineResult<AudioOutput> {
        let codec = ffmpeg::encoder::find(codec::Id::AAC)
            .ok_or_else(|| CombineError::EncodeFailure("AAC encoder not found".to_string()))?;

        let mut audio_stream = output_ctx
            .add_stream(codec)
            .map_err(|e| encode_err("Failed to add audio stream", e))?;
        let stream_index = audio_stream.index();
        let time_base = ffmpeg::Rational::new(1, OUTPUT_SAMPLE_RATE as i32);

        let mut encoder = codec::context::Context::from_parameters(audio_stream.parameters())
            .map_err(|e| encode_err("Failed to create audio encoder context", e))?
            .encoder()
            .audio()
            .map_err(|e| encode_err("Failed to get audio encoder", e))?;

        // AAC 네이티브 인코더 입력 포맷: FLTP stereo
        encoder.set_rate(OUTPUT_SAMPLE_RATE as i32);
        encoder.set_channel_layout(ffmpeg::ChannelLayout::STEREO);
        encoder.set_format(ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar));
        encoder.set_bit_rate(settings.audio_bit_rate);
        encoder.set_time_base(time_base);
        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |= codec::flag::Flags::GLOBAL_HEADER.bits() as i32;
            }
        }

        let encoder = encoder
            .open_with(ffmpeg::Dictionary::new())
            .map_err(|e| encode_err("Failed to open audio encoder", e))?;

        audio_stream.set_parameters(&encoder);

        // 프레임 크기 0을 반환하는 코덱 대비
        let frame_size = (encoder.frame_size() as usize).max(1024);

        Ok(AudioOutput {
            encoder,
            stream_index,
            time_base,
            frame_size,
            pending,
            cursor: 0,
        })
    }

    /// 기록한 비디오 길이 (초)
    pub fn video_time(&self) -> f64 {
        match &self.video {
            Some(v) => v.frame_count as f64 / v.fps,
            None => 0.0,
        }
    }

    /// YUV420P 프레임 인코딩 → 기록
    /// 이 프레임 끝 시점까지의 오디오도 함께 기록
    pub fn write_video_frame(&mut self, frame: &mut ffmpeg::frame::Video) -> CombineResult<()> {
        let video = self.video.as_mut().ok_or_else(|| {
            CombineError::EncodeFailure("output has no video stream".to_string())
        })?;

        if frame.width() != video.width || frame.height() != video.height {
            return Err(CombineError::EncodeFailure(format!(
                "Invalid frame size: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                video.width,
                video.height
            )));
        }

        // PTS 설정
        frame.set_pts(Some(video.frame_count));
        video.frame_count += 1;

        video
            .encoder
            .send_frame(frame)
            .map_err(|e| encode_err("Failed to send frame", e))?;
        Self::write_video_packets(&mut self.output_ctx, video)?;

        let until = frames_for(self.video_time(), OUTPUT_SAMPLE_RATE);
        match self.audio.as_mut() {
            Some(audio) => Self::write_audio_until(&mut self.output_ctx, audio, until, false),
            None => Ok(()),
        }
    }

    /// 인코딩 완료 (남은 오디오 기록 + flush + trailer)
    pub fn finish(mut self) -> CombineResult<()> {
        if let Some(audio) = self.audio.as_mut() {
            let total = audio.pending.frames();
            Self::write_audio_until(&mut self.output_ctx, audio, total, true)?;

            audio
                .encoder
                .send_eof()
                .map_err(|e| encode_err("Failed to send audio EOF", e))?;
            Self::write_audio_packets(&mut self.output_ctx, audio)?;
        }

        if let Some(video) = self.video.as_mut() {
            video
                .encoder
                .send_eof()
                .map_err(|e| encode_err("Failed to send video EOF", e))?;
            Self::write_video_packets(&mut self.output_ctx, video)?;
        }

        self.output_ctx
            .write_trailer()
            .map_err(|e| encode_err("Failed to write trailer", e))?;

        log::info!(
            "[ENCODE] 완료: {} (video {} frames, audio {:.3}s)",
            self.path.display(),
            self.video.as_ref().map_or(0, |v| v.frame_count),
            self.audio.as_ref().map_or(0.0, |a| a.cursor as f64 / OUTPUT_SAMPLE_RATE as f64)
        );
        Ok(())
    }

    /// 인코더에서 패킷 수신 → 출력 파일에 기록
    fn write_video_packets(
        output_ctx: &mut ffmpeg::format::context::Output,
        video: &mut VideoOutput,
    ) -> CombineResult<()> {
        let stream_time_base = output_ctx
            .stream(video.stream_index)
            .ok_or_else(|| CombineError::EncodeFailure("Video stream not found".to_string()))?
            .time_base();

        let mut packet = ffmpeg::Packet::empty();
        while video.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(video.stream_index);
            // time_base 변환 (인코더 → 스트림)
            packet.rescale_ts(video.time_base, stream_time_base);
            packet
                .write_interleaved(output_ctx)
                .map_err(|e| encode_err("Failed to write video packet", e))?;
        }
        Ok(())
    }

    /// pending PCM을 until 프레임까지 AAC 프레임 단위로 인코딩
    /// - flush=false: 꽉 찬 프레임만 전송
    /// - flush=true: 마지막 부분 프레임도 전송 (AAC는 마지막 프레임만 짧아도 됨)
    fn write_audio_until(
        output_ctx: &mut ffmpeg::format::context::Output,
        audio: &mut AudioOutput,
        until: usize,
        flush: bool,
    ) -> CombineResult<()> {
        let until = until.min(audio.pending.frames());

        while audio.cursor < until {
            let available = until - audio.cursor;
            if available < audio.frame_size && !flush {
                break;
            }
            let count = available.min(audio.frame_size);

            let frame = planar_frame(
                &audio.pending.samples()[audio.cursor * 2..(audio.cursor + count) * 2],
                audio.cursor as i64,
            );
            audio.cursor += count;

            audio
                .encoder
                .send_frame(&frame)
                .map_err(|e| encode_err("Failed to send audio frame", e))?;
            Self::write_audio_packets(output_ctx, audio)?;
        }
        Ok(())
    }

    fn write_audio_packets(
        output_ctx: &mut ffmpeg::format::context::Output,
        audio: &mut AudioOutput,
    ) -> CombineResult<()> {
        let stream_time_base = output_ctx
            .stream(audio.stream_index)
            .ok_or_else(|| CombineError::EncodeFailure("Audio stream not found".to_string()))?
            .time_base();

        let mut packet = ffmpeg::Packet::empty();
        while audio.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(audio.stream_index);
            packet.rescale_ts(audio.time_base, stream_time_base);
            packet
                .write_interleaved(output_ctx)
                .map_err(|e| encode_err("Failed to write audio packet", e))?;
        }
        Ok(())
    }
}

/// interleaved stereo 샘플 → FLTP 프레임 (L/R 평면 분리)
fn planar_frame(interleaved: &[f32], pts: i64) -> ffmpeg::frame::Audio {
    let count = interleaved.len() / 2;
    let mut frame = ffmpeg::frame::Audio::new(
        ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar),
        count,
        ffmpeg::ChannelLayout::STEREO,
    );
    frame.set_rate(OUTPUT_SAMPLE_RATE);
    frame.set_pts(Some(pts));

    // planar 프레임은 linesize[0]만 채워지므로 data_mut(1)은 빈 슬라이스
    // → samples() 기준 plane_mut 사용
    for channel in 0..OUTPUT_CHANNELS as usize {
        let plane = frame.plane_mut::<f32>(channel);
        for (dst, pair) in plane.iter_mut().zip(interleaved.chunks_exact(2)) {
            *dst = pair[channel];
        }
    }
    frame
}
