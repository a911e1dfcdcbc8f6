// 오디오 트랙 - 디코딩된 PCM + 볼륨 배율
// 파생 연산(반복/자르기/볼륨)은 모두 self를 소비 → 같은 버퍼를 두 번 해제하거나
// 해제 후 사용하는 경우가 타입 수준에서 불가능

use super::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::{CombineError, CombineResult};

/// 초 → 샘플 프레임 수 (반올림)
pub fn frames_for(seconds: f64, sample_rate: u32) -> usize {
    if seconds <= 0.0 || !seconds.is_finite() {
        return 0;
    }
    (seconds * sample_rate as f64).round() as usize
}

/// f32 interleaved PCM 트랙
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    /// interleaved 샘플 (길이 = frames * channels)
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u32,
    /// 볼륨 배율 (믹스 시 적용, 1.0 = 원본)
    volume: f32,
}

impl AudioTrack {
    /// PCM 버퍼로 트랙 생성
    /// 채널 수로 나누어 떨어지지 않는 꼬리 샘플은 버림
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u32) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            sample_rate,
            channels,
            volume: 1.0,
        }
    }

    /// 출력 포맷(48kHz stereo) 트랙
    pub fn from_output_samples(samples: Vec<f32>) -> Self {
        Self::new(samples, OUTPUT_SAMPLE_RATE, OUTPUT_CHANNELS)
    }

    /// 무음 트랙
    pub fn silence(frames: usize, sample_rate: u32, channels: u32) -> Self {
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] { &self.samples }
    pub fn sample_rate(&self) -> u32 { self.sample_rate }
    pub fn channels(&self) -> u32 { self.channels }
    pub fn volume(&self) -> f32 { self.volume }

    /// 샘플 프레임 수 (채널당 샘플 수)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// 길이 (초)
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 볼륨 배율 곱하기 (누적됨, 샘플은 믹스 시점에 스케일)
    pub fn with_volume_scaled(mut self, factor: f32) -> Self {
        self.volume *= factor;
        self
    }

    /// 트랙을 count번 이어붙임
    /// 볼륨 배율은 유지
    pub fn looped(self, count: usize) -> CombineResult<Self> {
        if self.is_empty() {
            return Err(CombineError::InvalidInput(
                "cannot loop an empty audio track".to_string(),
            ));
        }
        let samples = self.samples.repeat(count);
        Ok(Self { samples, ..self })
    }

    /// [0, end_frame) 구간만 남김
    /// end_frame이 길이 이상이면 그대로 반환
    pub fn subclipped(mut self, end_frame: usize) -> Self {
        let end = end_frame.saturating_mul(self.channels as usize);
        self.samples.truncate(end);
        self
    }

    /// 정확히 frames 길이로 맞춤 (길면 자르고, 짧으면 뒤에 무음 패딩)
    pub fn fit_to(mut self, frames: usize) -> Self {
        self.samples.resize(frames * self.channels as usize, 0.0);
        self
    }

    /// 볼륨 배율을 샘플에 반영한 PCM (배율 1.0 트랙)
    pub fn render(self) -> Self {
        if self.volume == 1.0 {
            return self;
        }
        let volume = self.volume;
        let samples = self.samples.into_iter().map(|s| s * volume).collect();
        Self { samples, volume: 1.0, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> AudioTrack {
        let samples = (0..frames)
            .flat_map(|i| {
                let v = i as f32 / frames as f32;
                [v, -v]
            })
            .collect();
        AudioTrack::new(samples, 1000, 2)
    }

    #[test]
    fn test_frames_and_duration() {
        let track = ramp(1500);
        assert_eq!(track.frames(), 1500);
        assert!((track.duration() - 1.5).abs() < 1e-9);
        assert_eq!(frames_for(1.5, 1000), 1500);
        assert_eq!(frames_for(0.0, 48000), 0);
        assert_eq!(frames_for(f64::NAN, 48000), 0);
    }

    #[test]
    fn test_partial_frame_dropped() {
        let track = AudioTrack::new(vec![0.1, 0.2, 0.3], 1000, 2);
        assert_eq!(track.samples(), &[0.1, 0.2]);
    }

    #[test]
    fn test_looped_repeats_waveform() {
        let track = ramp(10);
        let looped = track.clone().looped(3).unwrap();
        assert_eq!(looped.frames(), 30);
        for period in looped.samples().chunks(track.samples().len()) {
            assert_eq!(period, track.samples());
        }
    }

    #[test]
    fn test_loop_empty_is_invalid() {
        let err = AudioTrack::silence(0, 1000, 2).looped(2).unwrap_err();
        assert!(matches!(err, CombineError::InvalidInput(_)));
    }

    #[test]
    fn test_subclipped_keeps_prefix() {
        let track = ramp(10);
        let cut = track.clone().subclipped(4);
        assert_eq!(cut.frames(), 4);
        assert_eq!(cut.samples(), &track.samples()[..8]);

        // 길이 이상이면 변화 없음
        assert_eq!(track.clone().subclipped(99), track);
    }

    #[test]
    fn test_fit_to_pads_with_silence() {
        let fitted = ramp(4).fit_to(6);
        assert_eq!(fitted.frames(), 6);
        assert!(fitted.samples()[8..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_volume_is_multiplicative_and_lazy() {
        let track = ramp(4).with_volume_scaled(0.5).with_volume_scaled(0.5);
        assert_eq!(track.volume(), 0.25);

        let expected: Vec<f32> = ramp(4).samples().iter().map(|s| s * 0.25).collect();
        let rendered = track.render();
        assert_eq!(rendered.volume(), 1.0);
        assert_eq!(rendered.samples(), expected.as_slice());
    }

    #[test]
    fn test_zero_volume_renders_silence() {
        let silent = ramp(8).with_volume_scaled(0.0);
        assert!(silent.samples().iter().all(|&s| s == 0.0));
    }
}
