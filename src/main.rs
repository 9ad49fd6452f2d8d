use std::path::PathBuf;
use std::process::ExitCode;

use voicescribe::{Transcriber, TranscriberConfig, TranscriptionRequest};

fn usage() -> ExitCode {
    eprintln!("usage: voicescribe <audio.wav> [language] [engine-id]");
    eprintln!("       voicescribe --latest <recordings-dir> [language]");
    eprintln!("       voicescribe --engines");
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = TranscriberConfig::load();
    let transcriber = Transcriber::new(&config);

    let result = match args.first().map(String::as_str) {
        None => return usage(),
        Some("--engines") => {
            for availability in transcriber.registry().probe_all().await {
                match availability.reason {
                    None => println!("{}: available", availability.engine),
                    Some(reason) => println!("{}: unavailable ({})", availability.engine, reason),
                }
            }
            return ExitCode::SUCCESS;
        }
        Some("--latest") => {
            let Some(dir) = args.get(1) else {
                return usage();
            };
            let language = args.get(2).map(String::as_str).unwrap_or("auto");
            transcriber
                .transcribe_latest(&PathBuf::from(dir), language)
                .await
        }
        Some(audio) => {
            let path = PathBuf::from(audio);
            let output_name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "recording".to_string());
            let mut request = TranscriptionRequest::new(path, output_name);
            if let Some(language) = args.get(1) {
                request.language = language.clone();
            }
            request.forced_engine = args.get(2).cloned();
            transcriber.transcribe(&request).await
        }
    };

    match result {
        Ok(result) => {
            println!(
                "[{}] {} words, tier {}{} in {:.1}s",
                result.engine,
                result.word_count,
                result.quality,
                if result.degraded { " (degraded)" } else { "" },
                result.processing_time.as_secs_f64()
            );
            println!("{}", result.text);
            println!("saved to {}", result.paths.transcript.display());
            println!("{}", transcriber.stats().summary());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("transcription failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
