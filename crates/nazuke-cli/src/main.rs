use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use nazuke_core::chart::render_bars;
use nazuke_core::history::{self, History};
use nazuke_core::{
    AiSettings, Gender, NameCandidate, NamingRequest, ResponseFormat, TargetType,
};
use nazuke_suggest::Extraction;
use tracing_subscriber::EnvFilter;

const BAR_WIDTH: usize = 20;

#[derive(Parser)]
#[command(name = "nazuke", version, about = "AI naming advisor: proposes scored names for people, pets and characters.")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Ask the model for name candidates and log them.
    Suggest {
        #[command(flatten)]
        conditions: Conditions,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Parse a saved model reply without calling the model.
    Parse {
        /// Reply file (or "-" / omit for stdin).
        #[arg(default_value = "-")]
        file: String,

        /// Reply format: text or json.
        #[arg(long, default_value = "text")]
        format: ResponseFormat,

        /// Target type recorded in the history log.
        #[arg(long, default_value = "human")]
        target: TargetType,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show or change the stored model settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Work with the persistent history log.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(clap::Args)]
struct Conditions {
    /// What the name should express.
    #[arg(long)]
    wish: String,

    /// Family name the given name must sound good with.
    #[arg(long)]
    surname: Option<String>,

    /// What is being named: human, pet or character.
    #[arg(long, default_value = "human")]
    target: TargetType,

    /// unspecified, male or female.
    #[arg(long, default_value = "unspecified")]
    gender: Gender,

    /// Characters to use where possible.
    #[arg(long, default_value = "")]
    use_kanji: String,

    /// Characters to avoid.
    #[arg(long, default_value = "")]
    avoid_kanji: String,

    /// Number of names to propose.
    #[arg(long, default_value_t = nazuke_core::DEFAULT_CANDIDATE_COUNT)]
    count: usize,
}

impl Conditions {
    fn into_request(self) -> NamingRequest {
        NamingRequest {
            target: self.target,
            surname: self.surname,
            gender: self.gender,
            use_kanji: self.use_kanji,
            avoid_kanji: self.avoid_kanji,
            wish: self.wish,
            count: self.count,
        }
    }
}

/// Overrides for the stored settings.
#[derive(clap::Args)]
struct ModelArgs {
    #[arg(long, env = "NAZUKE_PROVIDER")]
    provider: Option<String>,

    #[arg(long, env = "NAZUKE_MODEL")]
    model: Option<String>,

    #[arg(long, env = "NAZUKE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Reply format: text or json.
    #[arg(long)]
    format: Option<ResponseFormat>,

    /// Seconds to wait for the model.
    #[arg(long)]
    timeout: Option<u64>,
}

impl ModelArgs {
    fn apply(self, mut settings: AiSettings) -> AiSettings {
        if let Some(provider) = self.provider {
            settings.provider = provider;
        }
        if let Some(model) = self.model {
            settings.model = model;
        }
        if let Some(key) = self.api_key.filter(|k| !k.is_empty()) {
            settings.api_key = key;
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        settings
    }
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Print candidates and warnings as JSON.
    #[arg(long)]
    json: bool,

    /// History file to append to (default: ~/.nazuke/naming_log.csv).
    #[arg(long)]
    log: Option<PathBuf>,

    /// Do not append to the history file.
    #[arg(long)]
    no_log: bool,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings (API key masked).
    Show,
    /// Update stored settings; omitted fields are kept.
    Set {
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print where the history file lives.
    Path,
    /// Copy the history to a dated file (naming_log_YYYYMMDD.csv).
    Export {
        /// History file to export (default: ~/.nazuke/naming_log.csv).
        #[arg(long)]
        from: Option<PathBuf>,

        /// Directory to write into.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.cmd).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,nazuke=debug,nazuke_suggest=debug,nazuke_core=debug"
    } else {
        "warn,nazuke=info,nazuke_suggest=info,nazuke_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .init();
}

async fn run(cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Suggest {
            conditions,
            model,
            output,
        } => {
            let settings = model.apply(nazuke_core::read_settings());
            if !nazuke_core::ai_configured(&settings) {
                bail!(
                    "no API key for provider `{}`; pass --api-key, set NAZUKE_API_KEY, or run `nazuke settings set`",
                    settings.provider
                );
            }
            let request = conditions.into_request();
            let extraction =
                nazuke_suggest::get_candidates(&request, &settings, settings.format).await?;
            finish(&extraction, request.target, &output)
        }
        Cmd::Parse {
            file,
            format,
            target,
            output,
        } => {
            let raw = read_input(&file)?;
            let extraction = nazuke_suggest::extract(&raw, format);
            nazuke_suggest::report(&extraction);
            finish(&extraction, target, &output)
        }
        Cmd::Settings { action } => match action {
            SettingsAction::Show => {
                let settings = nazuke_core::read_settings();
                println!("{}", settings_summary(&settings));
                Ok(())
            }
            SettingsAction::Set { model } => {
                let settings = model.apply(nazuke_core::read_settings());
                nazuke_core::write_settings(&settings).context("saving settings")?;
                tracing::info!(provider = %settings.provider, model = %settings.model, "settings saved");
                println!("{}", settings_summary(&settings));
                Ok(())
            }
        },
        Cmd::History { action } => match action {
            HistoryAction::Path => {
                println!("{}", nazuke_core::history_path().display());
                Ok(())
            }
            HistoryAction::Export { from, out } => {
                let from = from.unwrap_or_else(nazuke_core::history_path);
                let dest = export_history(&from, &out)?;
                println!("{}", dest.display());
                Ok(())
            }
        },
    }
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading reply from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {file}"))
    }
}

/// Print the extraction and append it to the history file.
fn finish(extraction: &Extraction, target: TargetType, output: &OutputArgs) -> Result<()> {
    if output.json {
        println!("{}", extraction_json(extraction)?);
    } else if extraction.candidates.is_empty() {
        println!("No names could be read from the reply.");
    } else {
        for candidate in &extraction.candidates {
            println!("{}", render_candidate(candidate));
        }
    }

    if output.no_log || extraction.candidates.is_empty() {
        return Ok(());
    }
    let mut session = History::new();
    session.record(target, &extraction.candidates, Local::now().naive_local());
    let path = output.log.clone().unwrap_or_else(nazuke_core::history_path);
    history::append_csv(&path, session.records())
        .with_context(|| format!("appending to {}", path.display()))?;
    tracing::debug!(path = %path.display(), rows = session.len(), "history appended");
    Ok(())
}

fn extraction_json(extraction: &Extraction) -> Result<String> {
    let value = serde_json::json!({
        "candidates": extraction.candidates,
        "warnings": extraction.warning_messages(),
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

fn render_candidate(candidate: &NameCandidate) -> String {
    let mut out = String::new();
    out.push_str(&format!("### {}", candidate.display_name));
    if let Some(reading) = &candidate.reading {
        if !candidate.display_name.contains(reading.as_str()) {
            out.push_str(&format!(" ({reading})"));
        }
    }
    out.push_str(&format!("  総合 {:.1}\n", candidate.overall));
    out.push_str(&render_bars(&candidate.scores, BAR_WIDTH));
    if !candidate.rationale.is_empty() {
        out.push_str(candidate.rationale.trim());
        out.push('\n');
    }
    out
}

fn settings_summary(settings: &AiSettings) -> String {
    format!(
        "provider: {}\nmodel: {}\napi key: {}\nformat: {}\ntimeout: {}s\nconfigured: {}",
        settings.provider,
        settings.model,
        if settings.api_key.is_empty() { "(not set)" } else { "(set)" },
        settings.format,
        settings.timeout_secs,
        nazuke_core::ai_configured(settings),
    )
}

fn export_history(from: &Path, out_dir: &Path) -> Result<PathBuf> {
    if !from.exists() {
        bail!("no history yet at {}", from.display());
    }
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let dest = out_dir.join(history::export_file_name(Local::now().date_naive()));
    std::fs::copy(from, &dest)
        .with_context(|| format!("copying {} -> {}", from.display(), dest.display()))?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nazuke_core::Scores;

    fn candidate() -> NameCandidate {
        NameCandidate {
            display_name: "光（ヒカル）".into(),
            reading: Some("ヒカル".into()),
            scores: Scores::default(),
            overall: 50.0,
            rationale: "明るい子に".into(),
            source_fragment: "名前：光（ヒカル）".into(),
        }
    }

    #[test]
    fn suggest_args_parse() {
        let cli = Cli::try_parse_from([
            "nazuke", "suggest", "--wish", "優しい子に", "--target", "pet", "--gender", "female",
            "--format", "json", "--count", "5", "--no-log",
        ])
        .unwrap();
        let Cmd::Suggest { conditions, model, output } = cli.cmd else {
            panic!("expected suggest");
        };
        assert!(output.no_log);
        let settings = model.apply(AiSettings::default());
        assert_eq!(settings.format, ResponseFormat::StructuredJson);
        let request = conditions.into_request();
        assert_eq!(request.target, TargetType::Pet);
        assert_eq!(request.gender, Gender::Female);
        assert_eq!(request.count, 5);
    }

    #[test]
    fn bad_format_is_rejected() {
        assert!(Cli::try_parse_from(["nazuke", "parse", "--format", "yaml"]).is_err());
    }

    #[test]
    fn candidate_rendering_skips_duplicate_reading() {
        let rendered = render_candidate(&candidate());
        assert!(rendered.starts_with("### 光（ヒカル）  総合 50.0\n"));
        assert!(!rendered.contains("(ヒカル)"));
        assert!(rendered.contains("響き"));
        assert!(rendered.ends_with("明るい子に\n"));
    }

    #[test]
    fn parse_appends_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log.csv");
        let extraction = nazuke_suggest::extract("名前：凛\n響き：70点\n", ResponseFormat::DelimitedText);
        let output = OutputArgs {
            json: true,
            log: Some(log.clone()),
            no_log: false,
        };
        finish(&extraction, TargetType::Character, &output).unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains(",キャラクター,凛,,70,50,50,50,50,54.0,"));
    }

    #[test]
    fn export_copies_to_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("naming_log.csv");
        std::fs::write(&from, "timestamp\n").unwrap();
        let dest = export_history(&from, &dir.path().join("out")).unwrap();
        assert!(dest
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("naming_log_"));
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "timestamp\n");
    }

    #[test]
    fn export_without_history_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(export_history(&dir.path().join("missing.csv"), dir.path()).is_err());
    }
}
