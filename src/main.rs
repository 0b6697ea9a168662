//! SpeechCoach - guided pronunciation practice
//!
//! Terminal front-end: the main thread plays the role of the UI thread and
//! drains the session's callback queue.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use speechcoach::asr::{SpeechRecognizer, VoskRecognizer};
use speechcoach::audio::{list_input_devices, read_wav_at, CancelToken, CpalSource, Recorder, WavSink};
use speechcoach::config::Config;
use speechcoach::scoring::{find_focus_window, FeatureExtractor, Scorer};
use speechcoach::sentences::SentencePool;
use speechcoach::session::{
    build_session_plan, ui_channel, EndReason, SessionCallbacks, SessionController, SessionDeps,
    SessionPlan, StartRequest,
};
use speechcoach::storage::{load_reference, ProfileLabel, SqliteStore};
use speechcoach::tts::{self, SpeechQueue};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Input device name (overrides the config file)
    #[arg(short, long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available microphones
    Devices,

    /// Run a guided session
    Run {
        /// Child profile id
        #[arg(long)]
        child: i64,

        /// Number of turns
        #[arg(long, default_value_t = 6)]
        rounds: usize,

        /// Session plan JSON file (ratio or playlist)
        #[arg(long, conflicts_with_all = ["age", "minutes"])]
        plan: Option<PathBuf>,

        /// Child age, to pace an automatic plan
        #[arg(long)]
        age: Option<u32>,

        /// Session length in minutes, to pace an automatic plan
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Record a reference pronunciation for a phoneme
    Enroll {
        #[arg(long)]
        phoneme: String,

        /// target or contrast
        #[arg(long, default_value = "target")]
        label: ProfileLabel,

        /// Store for one child instead of the shared profile
        #[arg(long)]
        child: Option<i64>,
    },

    /// Score an existing recording against the stored references
    Score {
        wav: PathBuf,

        /// Sentence the recording should contain
        #[arg(long)]
        expected: String,

        #[arg(long, default_value = "")]
        target_word: String,

        #[arg(long, default_value = "")]
        phoneme: String,

        #[arg(long, default_value = "")]
        contrast: String,

        #[arg(long)]
        child: Option<i64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    if args.device.is_some() {
        config.input_device = args.device.clone();
    }

    // Setup logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };
    if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("🗣️ SpeechCoach v{} starting...", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Devices => list_devices(),
        Command::Run {
            child,
            rounds,
            plan,
            age,
            minutes,
        } => {
            let request = match (plan, age, minutes) {
                (Some(path), _, _) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Cannot read plan {}", path.display()))?;
                    StartRequest::Plan(SessionPlan::from_json(&content)?)
                }
                (None, None, None) => StartRequest::Rounds(rounds),
                (None, age, minutes) => {
                    StartRequest::Plan(build_session_plan(age, minutes.unwrap_or(3)))
                }
            };
            run_session(config, child, request)
        }
        Command::Enroll {
            phoneme,
            label,
            child,
        } => enroll(&config, child, &phoneme, label),
        Command::Score {
            wav,
            expected,
            target_word,
            phoneme,
            contrast,
            child,
        } => score_file(
            &config,
            &wav,
            &expected,
            &target_word,
            &phoneme,
            &contrast,
            child,
        ),
    }
}

fn list_devices() -> Result<()> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        println!("No input devices found");
    }
    for name in devices {
        println!("🎙️ {}", name);
    }
    Ok(())
}

/// Keyboard controls read on a side thread: p = pause/resume, r = replay, s = stop.
fn spawn_key_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            if tx.send(line.trim().to_lowercase()).is_err() {
                break;
            }
        }
    });
    rx
}

fn run_session(config: Config, child: i64, request: StartRequest) -> Result<()> {
    let pool = SentencePool::load(Path::new(&config.sentences_path))?;
    let store = Arc::new(SqliteStore::open(Path::new(&config.db_path))?);
    let speech = Arc::new(SpeechQueue::new(tts::create_engine(&config)?));
    let recognizer = Arc::new(VoskRecognizer::new(&config)?);
    let (dispatch, queue) = ui_channel();

    let deps = SessionDeps {
        audio: Arc::new(CpalSource::new()),
        sink: Arc::new(WavSink::new()),
        speech,
        recognizer,
        profiles: store.clone(),
        persistence: store,
        dispatch: Arc::new(dispatch),
    };

    let ended: Arc<Mutex<Option<EndReason>>> = Arc::new(Mutex::new(None));
    let callbacks = SessionCallbacks::default()
        .on_status(|text| println!("{text}"))
        .on_sentence(|s| {
            println!(
                "📖 {} [{}/{}] « {} »",
                s.story_title, s.turn, s.total, s.text
            )
        })
        .on_analysis(|o| {
            println!(
                "📊 entendu « {} » | WER {:.2} | acoustique {:.2} | confiance {:.2} | score {:.0}%",
                o.recognized_text,
                o.wer,
                o.acoustic_score,
                o.confidence,
                o.final_score * 100.0
            )
        })
        .on_end({
            let ended = ended.clone();
            move |reason| {
                println!("🏁 Fin: {reason}");
                if let Ok(mut slot) = ended.lock() {
                    *slot = Some(reason);
                }
            }
        });

    let mut controller = SessionController::new(config, deps, pool);
    controller.set_child(Some(child));
    controller.set_callbacks(callbacks);
    controller.start(request)?;
    println!("⌨️ p + Entrée: pause/reprise, r: réécouter, s: arrêter");

    let keys = spawn_key_reader();
    loop {
        queue.pump(Duration::from_millis(100));
        if ended.lock().map(|e| e.is_some()).unwrap_or(true) {
            break;
        }
        while let Ok(key) = keys.try_recv() {
            match key.as_str() {
                "p" => {
                    controller.toggle_pause();
                }
                "r" => {
                    if let Err(e) = controller.replay_last_prompt() {
                        warn!("Replay failed: {}", e);
                    }
                }
                "s" | "q" => controller.stop(),
                _ => {}
            }
        }
    }
    controller.wait();
    queue.drain();
    Ok(())
}

fn enroll(config: &Config, child: Option<i64>, phoneme: &str, label: ProfileLabel) -> Result<()> {
    let store = SqliteStore::open(Path::new(&config.db_path))?;
    let recorder = Recorder::new(
        config.recorder.clone(),
        Arc::new(CpalSource::new()),
        config.input_device.clone(),
    );
    let path = Path::new(&config.audio_dir).join(format!(
        "reference_{}_{}_{}.wav",
        phoneme,
        label.as_str(),
        chrono::Local::now().timestamp()
    ));

    println!("🎙️ Prononce le son « {phoneme} » ({})...", label.as_str());
    let recording = recorder.record(&WavSink::new(), &path, &CancelToken::new())?;
    let features = FeatureExtractor::new()
        .extract(
            &recording.samples,
            recording.sample_rate,
            0.0,
            recording.duration_sec,
        )
        .context("Recording too short to build a reference")?;

    let id = store.save_reference_profile(child, phoneme, label, &features)?;
    println!("✅ Reference #{id} saved ({:.2}s)", recording.duration_sec);
    Ok(())
}

fn score_file(
    config: &Config,
    wav: &Path,
    expected: &str,
    target_word: &str,
    phoneme: &str,
    contrast: &str,
    child: Option<i64>,
) -> Result<()> {
    let store = SqliteStore::open(Path::new(&config.db_path))?;
    // References are enrolled at the recorder rate
    let sample_rate = config.recorder.sample_rate;
    let samples = read_wav_at(wav, sample_rate)?;

    let transcription = match VoskRecognizer::new(config) {
        Ok(recognizer) => recognizer.transcribe(wav),
        Err(e) => {
            warn!("⚠️ No recognizer available: {:#}", e);
            speechcoach::asr::Transcription::Empty
        }
    };
    let (start, end) = find_focus_window(transcription.words(), target_word);
    let features = FeatureExtractor::new().extract(&samples, sample_rate, start, end);
    let target = load_reference(&store, child, phoneme, ProfileLabel::Target);
    let contrast_ref = load_reference(&store, child, contrast, ProfileLabel::Contrast);

    let scores = Scorer::new(config.session.wer_mode).score(
        expected,
        transcription.text(),
        features.as_ref(),
        target.as_ref(),
        contrast_ref.as_ref(),
    );
    println!("📝 « {} »", transcription.text());
    println!("🎯 focus {:.2}s -> {:.2}s", start, end);
    println!("{}", serde_json::to_string_pretty(&scores)?);
    Ok(())
}
