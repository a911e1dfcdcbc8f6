// 배경음 길이 조정 - 비디오 길이에 정확히 맞춤
// 짧으면 반복 후 자르기, 길면 자르기, 같으면 그대로

use super::track::AudioTrack;
use crate::error::{CombineError, CombineResult};

/// 길이 조정 방식 (로그/테스트용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// loops번 이어붙인 뒤 목표 길이로 자름
    Looped { loops: usize },
    Trimmed,
    Unchanged,
}

/// 반복 횟수: floor(target / source) + 1
/// 비정수 비율이어도 항상 목표 길이 이상을 확보 (마지막 한 번의 자르기로 처리)
pub fn loop_count(target_frames: usize, source_frames: usize) -> usize {
    target_frames / source_frames + 1
}

/// 배경 트랙을 target_frames 길이로 맞춤
/// 반환 트랙의 frames()는 항상 target_frames
pub fn reconcile(
    background: AudioTrack,
    target_frames: usize,
) -> CombineResult<(AudioTrack, Reconciliation)> {
    let source_frames = background.frames();
    if source_frames == 0 {
        return Err(CombineError::InvalidInput(
            "background audio has zero duration".to_string(),
        ));
    }

    if source_frames < target_frames {
        let loops = loop_count(target_frames, source_frames);
        log::info!(
            "[AUDIO] 배경음이 비디오보다 짧음 ({} < {} frames) → {}회 반복",
            source_frames, target_frames, loops
        );
        let looped = background.looped(loops)?.subclipped(target_frames);
        Ok((looped, Reconciliation::Looped { loops }))
    } else if source_frames > target_frames {
        log::info!(
            "[AUDIO] 배경음이 비디오보다 김 ({} > {} frames) → 자르기",
            source_frames, target_frames
        );
        Ok((background.subclipped(target_frames), Reconciliation::Trimmed))
    } else {
        Ok((background, Reconciliation::Unchanged))
    }
}
