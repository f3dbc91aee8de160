//!
//! CLI для сравнения чтения с эталонной записью (транскрипция, фонетика, мелодия).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use phonetics::Phonetics;
use recite_core::{
    AudioRecording, ComparisonResult, PhoneticMode, ProsodyOutcome, RecitationConfig, VerseId,
};
use recite_engine::{Transcriber, WhisperLoader};
use recite_pipeline::{ComparisonPipeline, ComparisonRequest, VerseLibrary};

#[derive(Parser)]
#[command(name = "recite")]
#[command(author, version, about = "Recitation comparison: transcript, phonetics and melody", long_about = None)]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Откуда берётся распознаватель.
#[derive(clap::Args, Clone)]
struct ModelArgs {
    /// Whisper model directory (config.json, tokenizer.json, weights)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Load GGUF weights instead of safetensors
    #[arg(long, default_value_t = false)]
    quantized: bool,

    /// Device to use (cpu, metal, cuda)
    #[arg(long, default_value = "cpu")]
    device: String,

    /// Language forced on the recognizer (ISO 639-1)
    #[arg(long)]
    language: Option<String>,

    /// Cap on generated tokens per 30 s window
    #[arg(long)]
    max_tokens: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a candidate recording with a reference
    Compare {
        /// Reference recording
        #[arg(long, conflicts_with = "verse")]
        reference: Option<PathBuf>,

        /// Verse whose reference is taken from the library (e.g. 1_1 or 1:1)
        #[arg(long)]
        verse: Option<VerseId>,

        /// Directory of `<chapter>_<verse>.<ext>` reference recordings
        #[arg(long)]
        library: Option<PathBuf>,

        /// Candidate recording
        #[arg(long)]
        candidate: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        /// Session id (generated when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// Directory for the pitch chart
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Transcribe one recording
    Transcribe {
        #[arg(long)]
        audio: PathBuf,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Extract pitch contours and optionally chart or score them
    Pitch {
        #[arg(long)]
        audio: PathBuf,

        /// Second recording to score against
        #[arg(long)]
        against: Option<PathBuf>,

        /// Write a PNG chart here
        #[arg(long)]
        plot: Option<PathBuf>,
    },

    /// Join recordings (any supported format) into one WAV
    Concat {
        /// Output WAV file
        #[arg(long)]
        out: PathBuf,

        /// Library directory, used with --verses
        #[arg(long)]
        library: Option<PathBuf>,

        /// Comma-separated verses, e.g. 1_1,1_2
        #[arg(long, value_delimiter = ',')]
        verses: Vec<VerseId>,

        /// Output sample rate
        #[arg(long, default_value_t = 16000)]
        sample_rate: usize,

        /// Recordings to join, in order
        inputs: Vec<PathBuf>,
    },

    /// List the verses available in a library
    Verses {
        #[arg(long)]
        library: Option<PathBuf>,
    },

    /// Model utilities
    Models {
        #[command(subcommand)]
        command: ModelsCommands,
    },
}

#[derive(Subcommand)]
enum ModelsCommands {
    /// Check a model directory and optionally load it
    Check {
        #[arg(long)]
        model: PathBuf,

        /// Also load the model and report its metadata
        #[arg(long, default_value_t = false)]
        load: bool,

        #[arg(long, default_value = "cpu")]
        device: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => RecitationConfig::from_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => RecitationConfig::default(),
    };

    match cli.command {
        Commands::Compare {
            reference,
            verse,
            library,
            candidate,
            model,
            session_id,
            out_dir,
            json,
        } => {
            if let Some(dir) = out_dir {
                config.artifact_dir = dir;
            }
            if let Some(root) = library {
                config.library_root = Some(root);
            }
            apply_model_args(&mut config, &model);

            let reference = match (reference, verse) {
                (Some(path), _) => path,
                (None, Some(verse)) => VerseLibrary::from_config(&config)?
                    .resolve(&verse)?
                    .path()
                    .to_path_buf(),
                (None, None) => anyhow::bail!("either --reference or --verse is required"),
            };

            info!("reference {}, candidate {}", reference.display(), candidate.display());
            let transcriber = Arc::new(build_transcriber(&config, &model)?);
            let phonetics = Arc::new(Phonetics::from_config(&config)?);
            let pipeline = ComparisonPipeline::new(transcriber, phonetics, config);

            let mut request = ComparisonRequest::new(reference, candidate);
            if let Some(verse) = verse {
                request = request.with_verse(verse);
            }
            if let Some(id) = session_id {
                request = request.with_session_id(id);
            }

            let result = pipeline.compare(request)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }

        Commands::Transcribe { audio, model } => {
            apply_model_args(&mut config, &model);
            let transcriber = build_transcriber(&config, &model)?;

            let start = Instant::now();
            let transcript = transcriber.transcribe(&AudioRecording::new(&audio), None)?;
            println!("{}", transcript.text);
            eprintln!(
                "[{}] {:.2}s",
                transcript.language,
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Pitch {
            audio,
            against,
            plot,
        } => {
            let contour = prosody::extract_pitch_contour(&audio, &config.pitch)?;
            let (lo, hi) = contour.range();
            println!("{}", audio.display());
            println!(
                "  mean {:.1} Hz, std {:.1} Hz, range {:.1}..{:.1} Hz",
                contour.mean(),
                contour.std_dev(),
                lo,
                hi
            );

            let other = match &against {
                Some(path) => Some(prosody::extract_pitch_contour(path, &config.pitch)?),
                None => None,
            };
            if let Some(other) = &other {
                match prosody::compare_pitch(&contour, other) {
                    Ok(score) => println!("  prosody similarity: {score:.2}"),
                    Err(e) => println!("  prosody similarity: undefined ({e})"),
                }
            }
            if let Some(path) = plot {
                let candidate = other.as_ref().unwrap_or(&contour);
                prosody::plot_pitch(&contour, candidate, &path, &config.plot)?;
                println!("  chart: {}", path.display());
            }
        }

        Commands::Concat {
            out,
            library,
            verses,
            sample_rate,
            inputs,
        } => {
            let duration = if verses.is_empty() {
                audio::concat_to_wav(&inputs, &out, sample_rate)?
            } else {
                if let Some(root) = library {
                    config.library_root = Some(root);
                }
                VerseLibrary::from_config(&config)?.render_group(&verses, &out, sample_rate)?
            };
            println!("{} ({duration:.2}s)", out.display());
        }

        Commands::Verses { library } => {
            if let Some(root) = library {
                config.library_root = Some(root);
            }
            let library = VerseLibrary::from_config(&config)?;
            for verse in library.verses()? {
                println!("{verse}");
            }
        }

        Commands::Models { command } => match command {
            ModelsCommands::Check {
                model,
                load,
                device,
            } => run_models_check(&model, load, &device)?,
        },
    }
    Ok(())
}

/// Флаги модели перекрывают значения из конфигурации.
fn apply_model_args(config: &mut RecitationConfig, args: &ModelArgs) {
    if let Some(dir) = &args.model {
        config.model_dir = Some(dir.clone());
    }
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
}

fn build_transcriber(config: &RecitationConfig, args: &ModelArgs) -> Result<Transcriber> {
    let model_dir = config
        .model_dir
        .clone()
        .context("no model directory: pass --model or set model_dir in the config")?;
    let loader = WhisperLoader::new(model_dir)
        .quantized(args.quantized)
        .with_device(create_device(&args.device)?);
    let transcriber = Transcriber::new(loader, config.language.clone());
    Ok(match args.max_tokens {
        Some(n) => transcriber.with_max_tokens(n),
        None => transcriber,
    })
}

/// Создать устройство по имени (cpu, metal, cuda).
fn create_device(device: &str) -> Result<candle_core::Device> {
    match device {
        "metal" => Ok(candle_core::Device::new_metal(0)?),
        "cuda" => Ok(candle_core::Device::new_cuda(0)?),
        "cpu" => Ok(candle_core::Device::Cpu),
        other => anyhow::bail!("unknown device {other:?} (cpu, metal, cuda)"),
    }
}

fn print_result(result: &ComparisonResult) {
    println!("Session:   {}", result.session_id);
    if let Some(verse) = &result.verse {
        println!("Verse:     {verse}");
    }
    println!("Reference: {}", result.reference_text);
    println!("Candidate: {}", result.candidate_text);
    println!();

    let mode = match &result.phonetic_mode {
        PhoneticMode::Primary => String::new(),
        PhoneticMode::Fallback { reason } => format!(" (letters only: {reason})"),
        PhoneticMode::RawText { reason } => format!(" (raw text: {reason})"),
    };
    println!("Phonetic:  {:6.2}{mode}", result.phonetic_score);
    println!(
        "Prosody:   {:6.2}{}",
        result.prosody_score,
        if result.prosody_outcome == ProsodyOutcome::Undefined {
            " (undefined: flat pitch)"
        } else {
            ""
        }
    );
    println!("Overall:   {:6.2}", result.overall_score);
    match &result.plot_path {
        Some(path) => println!("Chart:     {}", path.display()),
        None => println!("Chart:     not available"),
    }
}

fn fmt_mib(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
}

fn run_models_check(model_dir: &Path, load: bool, device: &str) -> Result<()> {
    if !model_dir.is_dir() {
        anyhow::bail!("model directory not found: {}", model_dir.display());
    }

    let status = |name: &str| {
        let path = model_dir.join(name);
        match std::fs::metadata(&path) {
            Ok(meta) => format!("OK ({})", fmt_mib(meta.len())),
            Err(_) => "MISSING".to_string(),
        }
    };

    println!("Model: {}", model_dir.display());
    println!("- config.json: {}", status("config.json"));
    println!("- tokenizer.json: {}", status("tokenizer.json"));
    println!("- model.safetensors: {}", status("model.safetensors"));
    let gguf: Vec<PathBuf> = std::fs::read_dir(model_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == "gguf"))
        .collect();
    if gguf.is_empty() {
        println!("- gguf: none");
    } else {
        for path in &gguf {
            println!("- gguf: {}", path.display());
        }
    }
    let mel = if model_dir.join("mel_filters.safetensors").exists() {
        "OK".to_string()
    } else {
        "MISSING (generated filters will be used)".to_string()
    };
    println!("- mel_filters.safetensors: {mel}");

    if load {
        // GGUF только если нет safetensors весов.
        let quantized = !model_dir.join("model.safetensors").exists() && !gguf.is_empty();
        let loader = WhisperLoader::new(model_dir)
            .quantized(quantized)
            .with_device(create_device(device)?);
        let transcriber = Transcriber::new(loader, "he");
        let start = Instant::now();
        let info = transcriber.preload()?;
        println!();
        println!("Loaded {} in {:.2}s", info.name, start.elapsed().as_secs_f64());
        println!(
            "  parameters: {}",
            info.parameters
                .map(|p| format!("~{}M", p / 1_000_000))
                .unwrap_or_else(|| "unknown".to_string())
        );
        println!("  quantized: {}", info.quantized);
        println!("  backend: {}", info.backend);
        println!("  loads: {}", transcriber.load_count());
    }
    Ok(())
}
