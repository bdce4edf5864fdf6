// Fetch the crop recommendation training CSV from the configured mirrors
//
// Usage: cargo run --bin download_dataset -- [--output-dir DIR] [--url URL]
//        [--checksum SHA256] [--force] [--skip-checksum]

use agro_advisor::data::ingestion::{candidate_mirrors, download_dataset, DownloadOptions};
use agro_advisor::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str =
    "Usage: download_dataset [--output-dir DIR] [--url URL] [--checksum SHA256] [--force] [--skip-checksum]";

struct Args {
    output_dir: Option<PathBuf>,
    url: Option<String>,
    checksum: Option<String>,
    force: bool,
    skip_checksum: bool,
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        output_dir: None,
        url: None,
        checksum: None,
        force: false,
        skip_checksum: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--output-dir" | "--url" | "--checksum" => {
                let flag = args[i].clone();
                i += 1;
                let value = args.get(i).ok_or_else(|| format!("{} requires a value", flag))?.clone();
                match flag.as_str() {
                    "--output-dir" => parsed.output_dir = Some(PathBuf::from(value)),
                    "--url" => parsed.url = Some(value),
                    _ => parsed.checksum = Some(value),
                }
            }
            "--force" => parsed.force = true,
            "--skip-checksum" => parsed.skip_checksum = true,
            "--help" | "-h" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown argument: {}\n{}", other, USAGE)),
        }
        i += 1;
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agro_advisor=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let settings = Settings::from_env();
    let mut options = DownloadOptions::from_settings(&settings);
    options.overwrite = args.force;
    options.verify_checksum = !args.skip_checksum;
    if let Some(checksum) = args.checksum {
        options.expected_sha256 = checksum;
    }
    if let Some(url) = args.url.as_deref() {
        options.mirrors = candidate_mirrors(Some(url));
    }

    let output_dir = args.output_dir.unwrap_or_else(|| settings.paths().data_raw);
    let path = download_dataset(&output_dir, &options).await?;
    println!("Dataset ready at {}", path.display());

    Ok(())
}
