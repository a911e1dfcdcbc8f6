// 오디오 믹서 - 여러 트랙을 하나의 PCM 스트림으로 합성
// 트랙별 볼륨 적용 후 단순 합산 (정규화/클리핑 없음, 인코더에 맡김)

use super::track::AudioTrack;
use crate::error::{CombineError, CombineResult};

/// 합산할 트랙 묶음
/// 길이 = 멤버 중 최대 길이 (반복/자르기는 하지 않음)
#[derive(Debug, Default)]
pub struct CompositeAudioTrack {
    tracks: Vec<AudioTrack>,
}

impl CompositeAudioTrack {
    pub fn new(tracks: Vec<AudioTrack>) -> Self {
        Self { tracks }
    }

    /// 트랙 추가 (소유권 이전)
    pub fn push(&mut self, track: AudioTrack) {
        self.tracks.push(track);
    }

    /// 최대 프레임 수
    pub fn frames(&self) -> usize {
        self.tracks.iter().map(AudioTrack::frames).max().unwrap_or(0)
    }

    /// 모든 트랙 합산 → 볼륨 1.0 트랙 하나
    /// 짧은 트랙은 끝난 뒤 무음으로 취급
    pub fn mix(self) -> CombineResult<AudioTrack> {
        let first = self.tracks.first().ok_or_else(|| {
            CombineError::InvalidInput("no audio tracks to combine".to_string())
        })?;
        let sample_rate = first.sample_rate();
        let channels = first.channels();

        if let Some(odd) = self
            .tracks
            .iter()
            .find(|t| t.sample_rate() != sample_rate || t.channels() != channels)
        {
            return Err(CombineError::InvalidInput(format!(
                "track format mismatch: {}Hz/{}ch vs {}Hz/{}ch",
                odd.sample_rate(), odd.channels(), sample_rate, channels
            )));
        }

        let num_samples = self.frames() * channels as usize;
        let mut mixed = vec![0.0f32; num_samples];

        // 볼륨 적용 + 합산
        for track in &self.tracks {
            let volume = track.volume();
            for (out, sample) in mixed.iter_mut().zip(track.samples()) {
                *out += sample * volume;
            }
        }

        Ok(AudioTrack::new(mixed, sample_rate, channels))
    }
}
