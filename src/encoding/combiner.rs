// 비디오 + 배경음 합성 - 전체 흐름
// 입력 확인 → 길이 조정 → 볼륨 → 믹스 → H.264/AAC 인코딩
// 모든 리소스는 소유권으로 관리 (에러 경로 포함, 스코프 종료 시 한 번씩 해제)

use crate::audio::{frames_for, reconcile, CompositeAudioTrack, OUTPUT_SAMPLE_RATE};
use crate::encoding::encoder::{EncodeSettings, MediaWriter};
use crate::error::{CombineError, CombineResult, InputRole};
use crate::ffmpeg::{AudioDecoder, MediaSource};
use std::path::{Path, PathBuf};

/// 원본 오디오 기본 볼륨
pub const DEFAULT_ORIGINAL_VOLUME: f32 = 1.0;
/// 배경음 기본 볼륨
pub const DEFAULT_BACKGROUND_VOLUME: f32 = 0.5;

/// 합성 요청
/// 볼륨 범위([0, 1])는 호출자 책임 (클램프하지 않음)
#[derive(Debug, Clone, PartialEq)]
pub struct CombineRequest {
    pub video_path: PathBuf,
    pub background_audio_path: PathBuf,
    pub output_path: PathBuf,
    pub original_video_audio_volume: f32,
    pub background_music_volume: f32,
}

impl CombineRequest {
    /// 기본 볼륨(원본 1.0, 배경 0.5)으로 요청 생성
    pub fn new(
        video_path: impl Into<PathBuf>,
        background_audio_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            background_audio_path: background_audio_path.into(),
            output_path: output_path.into(),
            original_video_audio_volume: DEFAULT_ORIGINAL_VOLUME,
            background_music_volume: DEFAULT_BACKGROUND_VOLUME,
        }
    }

    pub fn with_volumes(mut self, original: f32, background: f32) -> Self {
        self.original_video_audio_volume = original;
        self.background_music_volume = background;
        self
    }

    /// 처리 전 검사: 입력 파일 존재 + 볼륨 값
    pub fn validate(&self) -> CombineResult<()> {
        if !self.video_path.exists() {
            return Err(CombineError::InputNotFound {
                role: InputRole::Video,
                path: self.video_path.clone(),
            });
        }
        if !self.background_audio_path.exists() {
            return Err(CombineError::InputNotFound {
                role: InputRole::Audio,
                path: self.background_audio_path.clone(),
            });
        }
        // 범위 밖 값(증폭, 음수)은 그대로 통과, NaN/무한대만 거부
        for (name, volume) in [
            ("original video audio volume", self.original_video_audio_volume),
            ("background music volume", self.background_music_volume),
        ] {
            if !volume.is_finite() {
                return Err(CombineError::InvalidInput(format!(
                    "{} must be finite, got {}",
                    name, volume
                )));
            }
        }
        Ok(())
    }
}

/// 출력 경로 미지정 시: 입력 비디오 옆에 generated_<이름><확장자>
pub fn default_output_path(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = video_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let name = format!("generated_{}{}", stem, ext);
    match video_path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// 비디오 + 배경음 합성기
#[derive(Debug, Clone, Default)]
pub struct AudioVideoCombiner {
    settings: EncodeSettings,
}

impl AudioVideoCombiner {
    pub fn new(settings: EncodeSettings) -> Self {
        Self { settings }
    }

    /// 합성 실행
    /// 실패 시 출력 경로에 불완전한 파일이 남을 수 있음 (호출자가 정리)
    pub fn combine(&self, request: &CombineRequest) -> CombineResult<()> {
        request.validate()?;

        // 1. 비디오 열기
        log::info!("[COMBINE] 비디오 로드: {}", request.video_path.display());
        let video = MediaSource::open_video(&request.video_path)?;
        let video_duration = video.duration();
        let target_frames = frames_for(video_duration, OUTPUT_SAMPLE_RATE);
        if target_frames == 0 {
            return Err(CombineError::InvalidInput(format!(
                "video '{}' has zero duration",
                request.video_path.display()
            )));
        }

        // 2. 배경음 디코딩
        log::info!("[COMBINE] 배경음 로드: {}", request.background_audio_path.display());
        let background = AudioDecoder::open(&request.background_audio_path)?.decode_all()?;
        log::info!(
            "[COMBINE] 길이: 비디오 {:.3}s, 배경음 {:.3}s",
            video_duration,
            background.duration()
        );

        // 3. 길이 조정 + 4. 배경 볼륨
        let (background, reconciliation) = reconcile(background, target_frames)?;
        log::debug!("[COMBINE] 길이 조정: {:?}", reconciliation);
        log::info!(
            "[COMBINE] 배경음 볼륨 {}%",
            request.background_music_volume * 100.0
        );
        let background = background.with_volume_scaled(request.background_music_volume);

        // 5. 원본 오디오 (있으면 두 번째 입력)
        let mut composite = CompositeAudioTrack::default();
        if video.has_audio() {
            log::info!(
                "[COMBINE] 원본 오디오 있음, 볼륨 {}%",
                request.original_video_audio_volume * 100.0
            );
            let original = AudioDecoder::open(&request.video_path)?
                .decode_all()?
                .fit_to(target_frames)
                .with_volume_scaled(request.original_video_audio_volume);
            composite.push(original);
        } else {
            log::info!("[COMBINE] 원본 비디오에 오디오 트랙 없음");
        }
        composite.push(background);

        // 6. 믹스
        let mixed = composite.mix()?;

        // 7. 비디오 스트림 + 새 오디오 → 8. 인코딩
        log::info!("[COMBINE] 출력 기록: {}", request.output_path.display());
        let mut writer = MediaWriter::create(
            &request.output_path,
            Some(video.format()),
            Some(mixed),
            &self.settings,
        )?;
        let frame_count = video.decode_frames(|frame| writer.write_video_frame(frame))?;
        if frame_count == 0 {
            return Err(CombineError::DecodeFailure(format!(
                "no video frames decoded from '{}'",
                request.video_path.display()
            )));
        }
        writer.finish()?;

        log::info!("[COMBINE] 완료: {} ({} frames)", request.output_path.display(), frame_count);
        Ok(())
    }
}

/// 단순 성공/실패 경계 함수
/// 실패 원인은 로그로만 남김 (원인 구분이 필요하면 AudioVideoCombiner::combine 사용)
pub fn combine_video_with_audio(request: &CombineRequest) -> bool {
    match AudioVideoCombiner::default().combine(request) {
        Ok(()) => true,
        Err(e) => {
            log::error!("[COMBINE] 에러: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CombineRequest::new("in.mp4", "bg.mp3", "out.mp4");
        assert_eq!(request.original_video_audio_volume, 1.0);
        assert_eq!(request.background_music_volume, 0.5);

        let request = request.with_volumes(0.2, 1.5);
        assert_eq!(request.original_video_audio_volume, 0.2);
        assert_eq!(request.background_music_volume, 1.5);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("videos/clip.mp4")),
            PathBuf::from("videos/generated_clip.mp4")
        );
        assert_eq!(
            default_output_path(Path::new("clip.mov")),
            PathBuf::from("generated_clip.mov")
        );
        assert_eq!(
            default_output_path(Path::new("noext")),
            PathBuf::from("generated_noext")
        );
    }

    #[test]
    fn test_missing_video_reported_first() {
        let request = CombineRequest::new("no-such-video.mp4", "no-such-audio.mp3", "out.mp4");
        match request.validate() {
            Err(CombineError::InputNotFound { role, .. }) => assert_eq!(role, InputRole::Video),
            other => panic!("expected InputNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_volume_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v.mp4");
        let audio = dir.path().join("a.mp3");
        std::fs::write(&video, b"x").unwrap();
        std::fs::write(&audio, b"x").unwrap();

        let request = CombineRequest::new(&video, &audio, dir.path().join("o.mp4"))
            .with_volumes(f32::NAN, 0.5);
        assert!(matches!(request.validate(), Err(CombineError::InvalidInput(_))));

        // 범위 밖이지만 유한한 값은 통과
        let request = request.with_volumes(-0.5, 2.0);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_boundary_returns_false_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let request = CombineRequest::new(dir.path().join("missing.mp4"), "bg.mp3", &output);
        assert!(!combine_video_with_audio(&request));
        assert!(!output.exists());
    }
}
