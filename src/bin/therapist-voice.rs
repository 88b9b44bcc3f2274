use std::path::PathBuf;
use std::time::Duration;

use therapist_voice::tts::{DEFAULT_MAX_AUDIO_AGE, cleanup_old_audio};
use therapist_voice::{VoiceSelection, VoiceService, logging};

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Logging unavailable: {err}");
    }
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        std::process::exit(2);
    };
    let rest: Vec<String> = args.collect();
    let code = match command.as_str() {
        "synthesize" => synthesize(rest),
        "detect-emotion" => detect_emotion(rest),
        "warm-cache" => warm_cache(rest),
        "cleanup" => cleanup(rest),
        "--help" | "-h" | "help" => {
            print_help();
            0
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            2
        }
    };
    std::process::exit(code);
}

fn synthesize(args: Vec<String>) -> i32 {
    let mut output_dir = PathBuf::from(".");
    let mut voice = VoiceSelection::Default;
    let mut words = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" => {
                if let Some(value) = args.next() {
                    output_dir = PathBuf::from(value);
                }
            }
            "--voice" => {
                if let Some(value) = args.next() {
                    voice = VoiceSelection::parse(&value);
                }
            }
            _ => words.push(arg),
        }
    }
    let text = words.join(" ");
    match VoiceService::global().try_synthesize(&text, &output_dir, &voice) {
        Ok(report) => {
            println!(
                "{} ({:.2}s, {} chunk(s), embedding {:?})",
                report.path.display(),
                report.duration.as_secs_f32(),
                report.chunks,
                report.embedding_source
            );
            0
        }
        Err(err) => {
            eprintln!("Synthesis failed: {err}");
            1
        }
    }
}

fn detect_emotion(args: Vec<String>) -> i32 {
    let mut timeout = None;
    let mut path = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--timeout" => {
                timeout = args
                    .next()
                    .and_then(|value| value.parse::<f64>().ok())
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
            }
            _ => path = Some(PathBuf::from(arg)),
        }
    }
    let Some(path) = path else {
        eprintln!("detect-emotion needs an audio path");
        return 2;
    };
    let outcome = VoiceService::global().detect_emotion(&path, timeout);
    println!("{}", outcome.distribution().to_json());
    if outcome.is_fallback() { 1 } else { 0 }
}

fn warm_cache(args: Vec<String>) -> i32 {
    let voice = args
        .first()
        .map(|value| VoiceSelection::parse(value))
        .unwrap_or_default();
    match VoiceService::global().warm_embedding_cache(&voice) {
        Ok(outcome) => {
            println!("Embedding ready ({:?})", outcome.source);
            0
        }
        Err(err) => {
            eprintln!("Failed to warm embedding cache: {err}");
            1
        }
    }
}

fn cleanup(args: Vec<String>) -> i32 {
    let mut max_age = DEFAULT_MAX_AUDIO_AGE;
    let mut dir = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--max-age-hours" => {
                if let Some(hours) = args.next().and_then(|value| value.parse::<u64>().ok()) {
                    max_age = max_age_from_hours(hours);
                }
            }
            _ => dir = Some(PathBuf::from(arg)),
        }
    }
    let Some(dir) = dir else {
        eprintln!("cleanup needs a directory");
        return 2;
    };
    println!("Removed {} file(s)", cleanup_old_audio(&dir, max_age));
    0
}

fn max_age_from_hours(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

fn print_help() {
    println!(
        "Usage:\n  therapist-voice synthesize [--out <dir>] [--voice <name|a.wav,b.wav>] <text...>\n  therapist-voice detect-emotion [--timeout <secs>] <audio>\n  therapist-voice warm-cache [<voice>]\n  therapist-voice cleanup [--max-age-hours <n>] <dir>"
    );
}
