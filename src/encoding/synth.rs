// 테스트용 합성 미디어 생성
// 단색 비디오 + 사인파 톤 (더미 파일 생성, 통합 테스트 픽스처)

use super::encoder::{EncodeSettings, MediaWriter};
use crate::audio::{frames_for, AudioTrack, OUTPUT_SAMPLE_RATE};
use crate::error::CombineResult;
use crate::ffmpeg::VideoFormat;
use ffmpeg_next as ffmpeg;
use std::path::Path;

/// 사인파 톤 (stereo 48kHz, 양 채널 동일)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f64,
    pub amplitude: f32,
}

impl Tone {
    pub fn new(frequency: f64, amplitude: f32) -> Self {
        Self { frequency, amplitude }
    }

    /// seconds 길이의 트랙 생성
    pub fn render(&self, seconds: f64) -> AudioTrack {
        let frames = frames_for(seconds, OUTPUT_SAMPLE_RATE);
        let step = 2.0 * std::f64::consts::PI * self.frequency / OUTPUT_SAMPLE_RATE as f64;
        let samples = (0..frames)
            .flat_map(|i| {
                let v = self.amplitude * (step * i as f64).sin() as f32;
                [v, v]
            })
            .collect();
        AudioTrack::from_output_samples(samples)
    }
}

/// RGB → BT.601 limited range YUV
fn rgb_to_yuv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f64::from);
    let y = 16.0 + 0.257 * r + 0.504 * g + 0.098 * b;
    let u = 128.0 - 0.148 * r - 0.291 * g + 0.439 * b;
    let v = 128.0 + 0.439 * r - 0.368 * g - 0.071 * b;
    [y, u, v].map(|c| c.round().clamp(0.0, 255.0) as u8)
}

/// 단색 YUV420P 프레임
pub fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> ffmpeg::frame::Video {
    let mut frame = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::YUV420P, width, height);
    let yuv = rgb_to_yuv(rgb);
    for (plane, value) in yuv.iter().enumerate() {
        frame.data_mut(plane).fill(*value);
    }
    frame
}

/// 단색 테스트 비디오 생성
/// tone이 None이면 오디오 스트림이 없는 파일
pub fn write_test_video(
    path: &Path,
    seconds: f64,
    format: VideoFormat,
    rgb: [u8; 3],
    tone: Option<Tone>,
    settings: &EncodeSettings,
) -> CombineResult<()> {
    let audio = tone.map(|t| t.render(seconds));
    let mut writer = MediaWriter::create(path, Some(format), audio, settings)?;
    let total_frames = (seconds * format.fps).round() as usize;
    for _ in 0..total_frames {
        let mut frame = solid_frame(format.width, format.height, rgb);
        writer.write_video_frame(&mut frame)?;
    }
    writer.finish()
}

/// 테스트 톤 오디오 파일 생성 (AAC, 확장자로 컨테이너 결정)
pub fn write_test_audio(
    path: &Path,
    seconds: f64,
    tone: Tone,
    settings: &EncodeSettings,
) -> CombineResult<()> {
    MediaWriter::create(path, None, Some(tone.render(seconds)), settings)?.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_length_and_peak() {
        let track = Tone::new(440.0, 0.5).render(3.0);
        assert_eq!(track.frames(), 144_000);
        let peak = track.samples().iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.5 && peak > 0.49);
    }

    #[test]
    fn test_rgb_to_yuv() {
        assert_eq!(rgb_to_yuv([0, 0, 0]), [16, 128, 128]);
        let [y, u, v] = rgb_to_yuv([255, 0, 0]);
        assert_eq!(y, 82);
        assert!(u < 128);
        assert!(v > 200);
    }
}
