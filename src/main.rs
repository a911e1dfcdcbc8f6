// soundtrack CLI - 비디오에 배경음을 합성하고 볼륨 조절

use clap::Parser;
use soundtrack_engine::encoding::synth::{self, Tone};
use soundtrack_engine::ffmpeg::VideoFormat;
use soundtrack_engine::{default_output_path, AudioVideoCombiner, CombineRequest, EncodeSettings};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DUMMY_VIDEO_FILE: &str = "my_test_video.mp4";
const DUMMY_AUDIO_FILE: &str = "my_background_music.m4a";

#[derive(Parser, Debug)]
#[command(name = "soundtrack")]
#[command(about = "Combine a video with background audio and adjust volumes")]
struct Cli {
    /// Path to the input video file
    #[arg(required_unless_present = "create_dummy_files")]
    video_path: Option<PathBuf>,

    /// Path to the background audio file
    #[arg(required_unless_present = "create_dummy_files")]
    background_audio_path: Option<PathBuf>,

    /// Output path (default: generated_<video name> next to the input video)
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// Volume multiplier for the video's original audio (0.0 mutes)
    #[arg(long, default_value_t = 1.0)]
    original_volume: f32,

    /// Volume multiplier for the background music
    #[arg(long, default_value_t = 0.5)]
    bg_volume: f32,

    /// H.264 CRF quality (0 = lossless, 51 = worst)
    #[arg(long, default_value_t = 23)]
    crf: u32,

    /// Encoder threads (default: all available cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Create dummy test video/audio files in the current directory and exit
    #[arg(long)]
    create_dummy_files: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Warning);

    let cli = Cli::parse();
    let settings = EncodeSettings {
        crf: cli.crf,
        threads: cli.threads,
        ..Default::default()
    };

    if cli.create_dummy_files {
        return match create_dummy_files(&settings) {
            Ok(()) => {
                log::info!("Dummy files created/checked. Run again with the two paths to combine them.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("Failed to create dummy files: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // clap이 required_unless_present로 보장
    let (Some(video_path), Some(background_audio_path)) = (cli.video_path, cli.background_audio_path)
    else {
        return ExitCode::FAILURE;
    };

    let output_path = cli.output_path.unwrap_or_else(|| {
        let generated = default_output_path(&video_path);
        log::info!("Output path not specified. Auto-generating: {}", generated.display());
        generated
    });

    let request = CombineRequest::new(video_path, background_audio_path, &output_path)
        .with_volumes(cli.original_volume, cli.bg_volume);

    match AudioVideoCombiner::new(settings).combine(&request) {
        Ok(()) => {
            println!("Successfully created: {}", output_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("[COMBINE] 에러: {}", e);
            println!("Failed to create: {}", output_path.display());
            ExitCode::FAILURE
        }
    }
}

/// 더미 파일 생성 (이미 있으면 건너뜀)
/// - 비디오: 5초, 640x480 빨간 화면, 24fps, 110Hz 톤(0.3)
/// - 오디오: 3초, 440Hz 톤(0.5)
fn create_dummy_files(settings: &EncodeSettings) -> soundtrack_engine::CombineResult<()> {
    let video = Path::new(DUMMY_VIDEO_FILE);
    if video.exists() {
        log::info!("Dummy video '{}' already exists.", video.display());
    } else {
        log::info!("Creating dummy video: {}", video.display());
        let format = VideoFormat { width: 640, height: 480, fps: 24.0 };
        synth::write_test_video(video, 5.0, format, [255, 0, 0], Some(Tone::new(110.0, 0.3)), settings)?;
    }

    let audio = Path::new(DUMMY_AUDIO_FILE);
    if audio.exists() {
        log::info!("Dummy audio '{}' already exists.", audio.display());
    } else {
        log::info!("Creating dummy audio: {}", audio.display());
        synth::write_test_audio(audio, 3.0, Tone::new(440.0, 0.5), settings)?;
    }
    Ok(())
}
