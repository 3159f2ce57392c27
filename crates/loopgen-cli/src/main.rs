use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use loopgen_contracts::characters::{ActionSpec, Character, CharacterCatalog};
use loopgen_contracts::events::EventWriter;
use loopgen_contracts::runs::summary::{now_utc_iso, write_summary, GenerationSummary};
use loopgen_engine::normalize::JPEG_QUALITY;
use loopgen_engine::{
    api_keys_from_env, file_sha256, find_start_frame, flatten_to_jpeg, normalize_image,
    parse_background, ActionStatus, Background, Backup, BatchReport, CredentialPool,
    DryrunProvider, FlattenOutcome, NormalizeOptions, NormalizeOutcome, StartFrame,
    StartFrameSource, SubmitSettings, Submitter, VeoProvider, VideoProvider,
    DEFAULT_VIDEO_MODEL,
};
use serde_json::{json, Map, Value};

const BANNER_WIDTH: usize = 50;

#[derive(Debug, Parser)]
#[command(
    name = "loopgen",
    version,
    about = "Generate looping character action clips from a single still image"
)]
struct Cli {
    /// API keys; pass several to rotate between them when one runs out of quota
    #[arg(short = 'k', long = "api-key", num_args = 1..)]
    api_keys: Vec<String>,

    /// Character id from the catalog
    #[arg(short, long, default_value = "fox-xiaoli")]
    character: String,

    /// Only generate this action
    #[arg(short, long)]
    action: Option<String>,

    /// List the character's actions and exit
    #[arg(short, long)]
    list: bool,

    /// Skip the 9:16 aspect-ratio check and crop
    #[arg(long)]
    no_crop: bool,

    /// Do not keep an `<name>_original` copy when cropping
    #[arg(long)]
    no_backup: bool,

    /// Root holding `<character>/assets/idle.jpg|png`
    #[arg(long, default_value = "characters")]
    characters_dir: PathBuf,

    /// JSON catalog replacing the built-in characters
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_VIDEO_MODEL)]
    model: String,

    /// Seconds between completion checks
    #[arg(long, default_value_t = 10.0)]
    poll_interval: f64,

    /// Completion checks before giving up on a job (0 waits indefinitely)
    #[arg(long, default_value_t = 120)]
    max_polls: u64,

    /// Background for transparent PNG start frames, as RRGGBB
    #[arg(long, default_value = "000000")]
    background: String,

    /// Use the offline dryrun provider instead of the Veo API
    #[arg(long)]
    dry_run: bool,

    /// Event log path (defaults to `<assets>/events.jsonl`)
    #[arg(long)]
    events: Option<PathBuf>,
}

impl Cli {
    fn assets_dir(&self) -> PathBuf {
        self.characters_dir.join(&self.character).join("assets")
    }

    fn poll_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.poll_interval).with_context(|| {
            format!(
                "--poll-interval must be a non-negative number of seconds, got {}",
                self.poll_interval
            )
        })
    }

    fn max_polls(&self) -> Option<u64> {
        (self.max_polls > 0).then_some(self.max_polls)
    }

    fn resolve_api_keys(&self) -> Result<Vec<String>> {
        let keys: Vec<String> = if self.api_keys.is_empty() {
            api_keys_from_env()
        } else {
            self.api_keys.clone()
        };
        if !keys.is_empty() {
            return Ok(keys);
        }
        if self.dry_run {
            return Ok(vec!["dryrun".to_string()]);
        }
        bail!(
            "--api-key / -k is required (several keys may be given to rotate between them), \
             or set GEMINI_API_KEY"
        )
    }
}

fn main() {
    match run_with(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("\nloopgen error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run_with(cli: Cli) -> Result<i32> {
    let catalog = match cli.catalog.as_deref() {
        Some(path) => CharacterCatalog::load(path)?,
        None => CharacterCatalog::builtin(),
    };
    let character = catalog.resolve(&cli.character)?;

    if cli.list {
        print_actions(character);
        return Ok(0);
    }

    let api_keys = cli.resolve_api_keys()?;
    let pool = CredentialPool::new(api_keys)?;
    let actions = character.select_actions(cli.action.as_deref())?;
    let poll_interval = cli.poll_interval()?;
    let background = parse_background(&cli.background)?;
    let assets_dir = cli.assets_dir();

    let start_frame_path = prepare_start_frame(&assets_dir, background)?;
    let normalized = if cli.no_crop {
        None
    } else {
        banner("checking image size...");
        let options = NormalizeOptions {
            backup: !cli.no_backup,
            ..NormalizeOptions::default()
        };
        let outcome = normalize_image(&start_frame_path, &options)?;
        report_normalize(&outcome);
        println!();
        Some(outcome)
    };

    let provider: Box<dyn VideoProvider> = if cli.dry_run {
        Box::new(DryrunProvider)
    } else {
        Box::new(VeoProvider::new())
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    let events_path = cli
        .events
        .clone()
        .unwrap_or_else(|| assets_dir.join("events.jsonl"));
    let events = EventWriter::new(&events_path, run_id.clone());
    let started_at = now_utc_iso();

    println!("{}", "=".repeat(BANNER_WIDTH));
    println!("{} - video generator", character.label());
    println!("{}", "=".repeat(BANNER_WIDTH));
    println!("character: {} ({})", character.name, character.id);
    println!("provider: {}", provider.name());
    println!("model: {}", cli.model);
    println!("start frame: {}", start_frame_path.display());
    println!("output dir: {}", assets_dir.display());
    println!("api keys: {}", pool.len());
    if let Some(path) = events.path() {
        println!("event log: {}", path.display());
    }
    println!("clips to generate: {}", actions.len());
    println!("{}", "=".repeat(BANNER_WIDTH));

    events.emit_value(
        "run_started",
        json!({
            "character": character.id,
            "provider": provider.name(),
            "model": cli.model,
            "start_frame": start_frame_path.to_string_lossy(),
            "start_frame_sha256": file_sha256(&start_frame_path)?,
            "actions": actions.iter().map(|spec| spec.id.as_str()).collect::<Vec<&str>>(),
            "api_keys": pool.len(),
        }),
    )?;

    events.emit_value(
        "image_prepared",
        image_prepared_payload(&start_frame_path, normalized.as_ref()),
    )?;

    let mut settings = SubmitSettings::new(cli.model.clone(), &assets_dir);
    settings.poll_interval = poll_interval;
    settings.max_polls = cli.max_polls();
    let api_key_count = pool.len();
    let start_frame = StartFrame::load(&start_frame_path)?;
    let mut submitter = Submitter::new(
        provider.as_ref(),
        pool,
        settings,
        start_frame,
        events.clone(),
    );
    let report = submitter.run_batch(&actions)?;

    events.emit_value(
        "run_finished",
        json!({
            "succeeded": report.succeeded,
            "failed": report.failed,
        }),
    )?;
    let summary = GenerationSummary {
        run_id,
        character: character.id.clone(),
        model: cli.model.clone(),
        provider: provider.name().to_string(),
        started_at,
        finished_at: now_utc_iso(),
        requested: actions.len() as u64,
        succeeded: report.succeeded,
        failed: report.failed,
        outputs: summary_outputs(&report),
    };
    let mut extra = Map::new();
    extra.insert("api_keys".to_string(), json!(api_key_count));
    write_summary(
        &assets_dir.join("generation-summary.json"),
        &summary,
        Some(&extra),
    )?;

    println!("\n{}", "=".repeat(BANNER_WIDTH));
    println!(
        "done! succeeded: {}, failed: {}",
        report.succeeded, report.failed
    );
    println!("{}", "=".repeat(BANNER_WIDTH));

    Ok(if report.failed > 0 { 1 } else { 0 })
}

fn banner(title: &str) {
    println!("{}", "=".repeat(BANNER_WIDTH));
    println!("{title}");
    println!("{}", "=".repeat(BANNER_WIDTH));
}

fn print_actions(character: &Character) {
    println!("{} available actions:", character.label());
    for spec in character.actions.values() {
        println!("  - {}", describe_action(spec));
    }
}

fn describe_action(spec: &ActionSpec) -> String {
    format!("{} ({}s)", spec.id, spec.duration_seconds)
}

/// Finds `idle.jpg`, or flattens `idle.png` into one.
fn prepare_start_frame(assets_dir: &Path, background: Background) -> Result<PathBuf> {
    match find_start_frame(assets_dir)? {
        StartFrameSource::Jpeg(path) => Ok(path),
        StartFrameSource::Png(png) => {
            banner("PNG start frame detected, converting to JPG...");
            let outcome = flatten_to_jpeg(&png, background, JPEG_QUALITY)
                .with_context(|| format!("failed converting {}", png.display()))?;
            match &outcome {
                FlattenOutcome::AlreadyPresent(path) => {
                    println!("✓ JPG already exists: {}", path.display());
                }
                FlattenOutcome::Converted { path, had_alpha } => {
                    if *had_alpha {
                        println!("transparent pixels flattened onto the background color");
                    }
                    println!("✓ converted: {}", path.display());
                }
            }
            println!();
            Ok(outcome.path().to_path_buf())
        }
    }
}

fn report_normalize(outcome: &NormalizeOutcome) {
    match outcome {
        NormalizeOutcome::Unchanged { width, height } => {
            println!("image size: {width}x{height}");
            println!("✓ image is already 9:16, no crop needed");
        }
        NormalizeOutcome::Cropped {
            original_width,
            original_height,
            crop,
            backup,
        } => {
            println!(
                "image size: {original_width}x{original_height}, aspect ratio: {:.4}",
                *original_width as f64 / *original_height as f64
            );
            if crop.width < *original_width {
                println!("cropping left/right, keeping the middle {} px", crop.width);
            } else {
                println!("cropping top/bottom, keeping the middle {} px", crop.height);
            }
            match backup {
                Backup::Written(path) => println!("original backed up to: {}", path.display()),
                Backup::AlreadyPresent(path) => {
                    println!("backup already present: {}", path.display())
                }
                Backup::Skipped => {}
            }
            println!(
                "✓ cropped to {}x{}, aspect ratio: {:.4}",
                crop.width,
                crop.height,
                crop.width as f64 / crop.height as f64
            );
        }
    }
}

fn image_prepared_payload(path: &Path, outcome: Option<&NormalizeOutcome>) -> Value {
    let mut payload = json!({ "path": path.to_string_lossy() });
    match outcome {
        None => {
            payload["checked"] = json!(false);
        }
        Some(NormalizeOutcome::Unchanged { width, height }) => {
            payload["checked"] = json!(true);
            payload["cropped"] = json!(false);
            payload["width"] = json!(width);
            payload["height"] = json!(height);
        }
        Some(NormalizeOutcome::Cropped {
            original_width,
            original_height,
            crop,
            backup,
        }) => {
            payload["checked"] = json!(true);
            payload["cropped"] = json!(true);
            payload["original_width"] = json!(original_width);
            payload["original_height"] = json!(original_height);
            payload["width"] = json!(crop.width);
            payload["height"] = json!(crop.height);
            payload["crop_left"] = json!(crop.left);
            payload["crop_top"] = json!(crop.top);
            if let Backup::Written(path) | Backup::AlreadyPresent(path) = backup {
                payload["backup"] = json!(path.to_string_lossy());
            }
        }
    }
    payload
}

fn summary_outputs(report: &BatchReport) -> Vec<Map<String, Value>> {
    report
        .outcomes
        .iter()
        .map(|outcome| {
            let mut row = Map::new();
            row.insert("action".to_string(), json!(outcome.action));
            row.insert("attempts".to_string(), json!(outcome.attempts));
            match &outcome.status {
                ActionStatus::Succeeded { path } => {
                    row.insert("status".to_string(), json!("succeeded"));
                    row.insert("path".to_string(), json!(path.to_string_lossy()));
                }
                ActionStatus::Failed { reason, exhausted } => {
                    row.insert("status".to_string(), json!("failed"));
                    row.insert("reason".to_string(), json!(reason));
                    row.insert("exhausted".to_string(), json!(exhausted));
                }
            }
            row
        })
        .collect()
}
