use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use ytsub::markdown::sanitize_filename;
use ytsub::pipeline::FetchOutcome;
use ytsub::{BatchExporter, Config, Enumerator, YouTubeClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("ytsub=info,warn")
        .init();

    let matches = Command::new("ytsub")
        .version("0.1.0")
        .about("Export YouTube subtitle tracks as timestamped Markdown documents")
        .arg(
            Arg::new("url")
                .value_name("URL")
                .help("Video, playlist, or channel URL")
                .required(true)
        )
        .arg(
            Arg::new("output-dir")
                .value_name("DIR")
                .help("Destination directory (derived from the input when omitted)")
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("NUM")
                .help("Maximum simultaneous transcript requests")
        )
        .arg(
            Arg::new("languages")
                .short('l')
                .long("languages")
                .value_name("LANGS")
                .help("Comma-separated subtitle language preference order")
        )
        .arg(
            Arg::new("translate")
                .long("translate")
                .value_name("LANG")
                .help("Request translated captions into this language when needed")
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .value_name("NUM")
                .help("Retries on throttling before giving up on a video")
        )
        .arg(
            Arg::new("max-videos")
                .long("max-videos")
                .value_name("NUM")
                .help("Cap on videos enumerated from a playlist or channel")
        )
        .arg(
            Arg::new("min-delay")
                .long("min-delay")
                .value_name("SECS")
                .help("Lower bound of the randomized pre-request delay")
        )
        .arg(
            Arg::new("max-delay")
                .long("max-delay")
                .value_name("SECS")
                .help("Upper bound of the randomized pre-request delay")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
        )
        .get_matches();

    let url = matches.get_one::<String>("url").unwrap();

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    if let Some(concurrency) = matches.get_one::<String>("concurrency") {
        config.fetch.max_concurrent = concurrency.parse()?;
    }
    if let Some(languages) = matches.get_one::<String>("languages") {
        config.fetch.languages = languages
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(translate) = matches.get_one::<String>("translate") {
        config.fetch.translate_to = Some(translate.clone());
    }
    if let Some(retries) = matches.get_one::<String>("retries") {
        config.fetch.retry_count = retries.parse()?;
    }
    if let Some(max_videos) = matches.get_one::<String>("max-videos") {
        config.fetch.max_videos = max_videos.parse()?;
    }
    if let Some(min_delay) = matches.get_one::<String>("min-delay") {
        config.fetch.min_delay_secs = min_delay.parse()?;
    }
    if let Some(max_delay) = matches.get_one::<String>("max-delay") {
        config.fetch.max_delay_secs = max_delay.parse()?;
    }
    if matches.get_flag("verbose") {
        info!("Verbose logging enabled");
    }
    config.validate()?;

    info!("🚀 ytsub starting for: {}", url);

    let client = Arc::new(YouTubeClient::new(&config.fetch));

    let enumerator = Enumerator::new(Arc::clone(&client), config.fetch.max_videos);
    let resolved = enumerator.resolve(url).await?;

    if resolved.videos.is_empty() {
        warn!("No videos found for {}", url);
        return Ok(());
    }
    info!("📹 Videos to process: {}", resolved.videos.len());

    let output_dir = matches
        .get_one::<String>("output-dir")
        .map(PathBuf::from)
        .or_else(|| config.output.dir.clone())
        .unwrap_or_else(|| {
            PathBuf::from(sanitize_filename(
                &resolved.collection_label,
                config.output.max_filename_len,
            ))
        });
    info!("📂 Output directory: {}", output_dir.display());

    let exporter = BatchExporter::new(Arc::clone(&client), &config, output_dir);

    // Best-effort cancellation: finish in-flight fetches, start no new ones
    let governor = exporter.governor();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Stop requested, letting in-flight fetches finish");
            governor.stop();
        }
    });

    let result = exporter.run(resolved.videos).await?;

    info!("✅ Successful: {}", result.successful);
    info!("❌ Failed: {}", result.failed);

    if result.failed > 0 {
        let mut counts: Vec<(String, usize)> = result
            .failure_counts()
            .into_iter()
            .map(|(kind, count)| (kind.to_string(), count))
            .collect();
        counts.sort();
        for (kind, count) in counts {
            info!("   {}: {}", kind, count);
        }
        for outcome in &result.outcomes {
            if let FetchOutcome::Failure { video, kind, message } = outcome {
                warn!("   {} ({}): {}", video.title, kind, message);
            }
        }
    }

    if result.all_failed() {
        return Err(anyhow!("all {} requested videos failed", result.total));
    }

    Ok(())
}
