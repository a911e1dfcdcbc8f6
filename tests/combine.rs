// 합성 통합 테스트
// 픽스처는 synth 모듈로 직접 생성 (H.264/AAC 인코더가 없으면 건너뜀)

use soundtrack_engine::audio::{AudioTrack, OUTPUT_SAMPLE_RATE};
use soundtrack_engine::encoding::encoders_available;
use soundtrack_engine::encoding::synth::{self, Tone};
use soundtrack_engine::ffmpeg::{AudioDecoder, MediaSource, VideoFormat};
use soundtrack_engine::{
    combine_video_with_audio, AudioVideoCombiner, CombineError, CombineRequest, EncodeSettings,
    InputRole,
};
use std::path::{Path, PathBuf};

const FORMAT: VideoFormat = VideoFormat { width: 320, height: 240, fps: 24.0 };

fn settings() -> EncodeSettings {
    EncodeSettings {
        preset: "ultrafast".to_string(),
        ..Default::default()
    }
}

/// 5초 비디오 + 3초 440Hz 배경음 픽스처
fn fixtures(dir: &Path, embedded: Option<Tone>) -> (PathBuf, PathBuf) {
    let video = dir.join("video.mp4");
    let audio = dir.join("background.m4a");
    synth::write_test_video(&video, 5.0, FORMAT, [255, 0, 0], embedded, &settings())
        .expect("write fixture video");
    synth::write_test_audio(&audio, 3.0, Tone::new(440.0, 0.5), &settings())
        .expect("write fixture audio");
    (video, audio)
}

/// 한 채널의 [from, to) 프레임 구간
fn channel(track: &AudioTrack, channel: usize, from: usize, to: usize) -> Vec<f64> {
    let to = to.min(track.frames());
    track.samples()[from * 2..to * 2]
        .iter()
        .skip(channel)
        .step_by(2)
        .map(|&s| f64::from(s))
        .collect()
}

fn at(seconds: f64) -> usize {
    (seconds * OUTPUT_SAMPLE_RATE as f64) as usize
}

/// [start, end) 초 구간 RMS (채널별)
fn rms(track: &AudioTrack, ch: usize, start: f64, end: f64) -> f64 {
    let values = channel(track, ch, at(start), at(end));
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// 픽스처는 dual-mono → 두 채널 RMS가 모두 expected 근처여야 함
fn assert_level(track: &AudioTrack, start: f64, end: f64, expected: f64, tolerance: f64) {
    let left = rms(track, 0, start, end);
    let right = rms(track, 1, start, end);
    assert!((left - expected).abs() < tolerance, "left rms {} in [{}, {})", left, start, end);
    assert!((right - expected).abs() < tolerance, "right rms {} in [{}, {})", right, start, end);

    let l = channel(track, 0, at(start), at(end));
    let r = channel(track, 1, at(start), at(end));
    let max_diff = l.iter().zip(&r).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max);
    assert!(max_diff < 0.05, "channels differ by {} in [{}, {})", max_diff, start, end);
}

/// 정규화 상관계수
fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm_a * norm_b)
}

fn skip_without_encoders() -> bool {
    if !encoders_available() {
        println!("H.264/AAC encoder not available, skipping test");
        return true;
    }
    false
}

#[test]
fn test_missing_video_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("bg.m4a");
    std::fs::write(&audio, b"not really audio").unwrap();
    let output = dir.path().join("out.mp4");

    let request = CombineRequest::new(dir.path().join("missing.mp4"), &audio, &output);
    let err = AudioVideoCombiner::default().combine(&request).unwrap_err();
    match err {
        CombineError::InputNotFound { role, .. } => assert_eq!(role, InputRole::Video),
        other => panic!("expected InputNotFound, got {:?}", other),
    }
    assert!(!output.exists());
}

#[test]
fn test_missing_audio_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, b"not really video").unwrap();
    let output = dir.path().join("out.mp4");

    let request = CombineRequest::new(&video, dir.path().join("missing.m4a"), &output);
    let err = AudioVideoCombiner::default().combine(&request).unwrap_err();
    match err {
        CombineError::InputNotFound { role, .. } => assert_eq!(role, InputRole::Audio),
        other => panic!("expected InputNotFound, got {:?}", other),
    }
    assert!(!output.exists());
    assert!(!combine_video_with_audio(&request));
}

#[test]
fn test_corrupt_video_is_decode_failure() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    let audio = dir.path().join("bg.m4a");
    std::fs::write(&video, b"garbage").unwrap();
    std::fs::write(&audio, b"garbage").unwrap();

    let request = CombineRequest::new(&video, &audio, dir.path().join("out.mp4"));
    let err = AudioVideoCombiner::default().combine(&request).unwrap_err();
    assert!(matches!(err, CombineError::DecodeFailure(_)), "got {:?}", err);
}

#[test]
fn test_silent_video_gets_looped_background() {
    if skip_without_encoders() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (video, audio) = fixtures(dir.path(), None);
    assert!(!MediaSource::open_video(&video).unwrap().has_audio());

    let output = dir.path().join("out.mp4");
    let request = CombineRequest::new(&video, &audio, &output).with_volumes(1.0, 0.5);
    AudioVideoCombiner::new(settings()).combine(&request).unwrap();

    let source = MediaSource::open_video(&output).unwrap();
    assert!(source.has_audio());
    assert!((source.duration() - 5.0).abs() < 0.1, "video duration {}", source.duration());

    let mixed = AudioDecoder::open(&output).unwrap().decode_all().unwrap();
    assert!((mixed.duration() - 5.0).abs() < 0.1, "audio duration {}", mixed.duration());

    // 0.5 진폭 톤 × 0.5 볼륨 → RMS ≈ 0.25 / √2
    let expected = 0.25 / std::f64::consts::SQRT_2;
    for (start, end) in [(0.5, 2.5), (3.3, 4.7)] {
        assert_level(&mixed, start, end, expected, 0.03);
    }
}

#[test]
fn test_embedded_audio_is_mixed_with_background() {
    if skip_without_encoders() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (video, audio) = fixtures(dir.path(), Some(Tone::new(110.0, 0.3)));

    let output = dir.path().join("out.mp4");
    let request = CombineRequest::new(&video, &audio, &output).with_volumes(1.0, 0.5);
    assert!(combine_video_with_audio(&request));

    let mixed = AudioDecoder::open(&output).unwrap().decode_all().unwrap();
    assert!((mixed.duration() - 5.0).abs() < 0.1, "audio duration {}", mixed.duration());

    // 110Hz(0.3) + 440Hz(0.25) 합 → RMS = sqrt(0.3²/2 + 0.25²/2)
    let expected = ((0.3f64.powi(2) + 0.25f64.powi(2)) / 2.0).sqrt();
    assert_level(&mixed, 0.5, 4.5, expected, 0.04);
}

#[test]
fn test_muted_original_leaves_background_only() {
    if skip_without_encoders() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (video, audio) = fixtures(dir.path(), Some(Tone::new(110.0, 0.3)));

    let output = dir.path().join("out.mp4");
    let request = CombineRequest::new(&video, &audio, &output).with_volumes(0.0, 1.0);
    AudioVideoCombiner::new(settings()).combine(&request).unwrap();

    let mixed = AudioDecoder::open(&output).unwrap().decode_all().unwrap();
    let expected = 0.5 / std::f64::consts::SQRT_2;
    assert_level(&mixed, 0.5, 4.5, expected, 0.04);
}

#[test]
fn test_longer_background_is_trimmed_to_video() {
    if skip_without_encoders() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("short.mp4");
    let audio = dir.path().join("long.m4a");
    synth::write_test_video(&video, 2.0, FORMAT, [0, 0, 255], None, &settings()).unwrap();
    synth::write_test_audio(&audio, 4.0, Tone::new(440.0, 0.5), &settings()).unwrap();

    let output = dir.path().join("out.mp4");
    let request = CombineRequest::new(&video, &audio, &output);
    AudioVideoCombiner::new(settings()).combine(&request).unwrap();

    let mixed = AudioDecoder::open(&output).unwrap().decode_all().unwrap();
    assert!((mixed.duration() - 2.0).abs() < 0.1, "audio duration {}", mixed.duration());
    // 기본 배경 볼륨 0.5
    assert_level(&mixed, 0.2, 1.8, 0.25 / std::f64::consts::SQRT_2, 0.03);
}

#[test]
fn test_loop_restarts_background_from_its_start() {
    if skip_without_encoders() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("video.mp4");
    let audio = dir.path().join("background.m4a");
    synth::write_test_video(&video, 5.0, FORMAT, [0, 255, 0], None, &settings()).unwrap();
    // 441.5Hz × 3초 = 1324.5 주기 → 이어서 재생했다면 3초 지점에서 위상 반전
    synth::write_test_audio(&audio, 3.0, Tone::new(441.5, 0.5), &settings()).unwrap();

    let period = AudioDecoder::open(&audio).unwrap().decode_all().unwrap().frames();

    let output = dir.path().join("out.mp4");
    let request = CombineRequest::new(&video, &audio, &output).with_volumes(1.0, 1.0);
    AudioVideoCombiner::new(settings()).combine(&request).unwrap();
    let mixed = AudioDecoder::open(&output).unwrap().decode_all().unwrap();

    // 두 번째 주기는 첫 주기를 그대로 반복
    let (from, to) = (at(0.2), at(1.2));
    for ch in 0..2 {
        let first = channel(&mixed, ch, from, to);
        let second = channel(&mixed, ch, from + period, to + period);
        assert_eq!(first.len(), second.len());
        let c = correlation(&first, &second);
        assert!(c > 0.9, "channel {} correlation {} across loop point", ch, c);
    }
}
