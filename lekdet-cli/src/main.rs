use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use lekdet::analysis::calibration::{
    Calibrator, SavedCalibration, backtest_range, backtest_step, load_calibration,
    save_calibration,
};
use lekdet::analysis::sampler::{final_guess, make_rng};
use lekdet::analysis::scorer::{Prediction, ScoringMode, TieBreak, analyze};
use lekdet::config::{AnalysisConfig, load_config};
use lekdet::display;
use lekdet::import::{ExtractMode, parse_history, read_input};
use lekdet_db::db::{
    DEFAULT_SESSION, append_draws, clear_session, count_draws, db_path, fetch_history,
    list_sessions, migrate, open_db, session_format,
};
use lekdet_db::models::{CandidateKind, DrawFormat, History};
use lekdet_db::rusqlite::Connection;
use lekdet_db::slips::SlipStore;

#[derive(Parser)]
#[command(name = "lekdet", about = "Statistiques et pronostics sur les tirages à chiffres")]
struct Cli {
    /// Chemin de la base de sessions (défaut : ./data/lekdet.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer des tirages collés (fichier texte, ou - pour l'entrée standard)
    Import {
        file: PathBuf,

        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,

        #[arg(short, long, value_enum, default_value = "four")]
        format: DrawFormat,

        /// Extraction : ligne exacte ou derniers chiffres de la ligne
        #[arg(short, long, value_enum, default_value = "exact")]
        mode: ExtractMode,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les sessions enregistrées
    Sessions,

    /// Lister les derniers tirages d'une session
    List {
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,

        #[arg(short, long, default_value = "10")]
        last: usize,
    },

    /// Terminer une session (supprime ses tirages)
    Clear {
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },

    /// Fréquences, retards et positions des chiffres
    Stats {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Classer les candidats (1 à 4 chiffres) et proposer un pronostic
    Predict {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Seed du tirage aléatoire du pronostic final
        #[arg(long)]
        seed: Option<u64>,

        /// Fichier de calibration (ignoré s'il n'existe pas)
        #[arg(long, default_value = "calibration.json")]
        calibration: PathBuf,

        /// Exporter les candidats classés au format CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Calibrer les scores par évaluation glissante sur l'historique
    Calibrate {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        tuning: TuningArgs,

        #[arg(short, long, default_value = "calibration.json")]
        output: PathBuf,
    },

    /// Justificatifs de paiement
    Slip {
        #[command(subcommand)]
        action: SlipAction,
    },
}

#[derive(Subcommand)]
enum SlipAction {
    /// Enregistrer un justificatif (.jpg, .png)
    Upload {
        file: PathBuf,

        /// Nom ou téléphone de l'utilisateur
        #[arg(short, long)]
        name: String,

        #[arg(long, default_value = "slips")]
        dir: PathBuf,
    },

    /// Lister les justificatifs, du plus récent au plus ancien
    List {
        #[arg(long, default_value = "slips")]
        dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Session enregistrée à analyser
    #[arg(short, long, default_value = DEFAULT_SESSION)]
    session: String,

    /// Analyser un fichier directement, sans l'enregistrer
    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "four")]
    format: DrawFormat,

    #[arg(short, long, value_enum, default_value = "exact")]
    mode: ExtractMode,
}

#[derive(clap::Args)]
struct TuningArgs {
    /// Fichier de configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    window: Option<usize>,

    #[arg(long)]
    min_history: Option<usize>,

    #[arg(long, value_enum)]
    scoring: Option<ScoringMode>,

    /// Poids de la fréquence empirique dans le lissage
    #[arg(long)]
    lambda: Option<f64>,

    #[arg(long, value_enum)]
    tie_break: Option<TieBreak>,

    /// Nombre de candidats affichés par catégorie
    #[arg(short, long)]
    top: Option<usize>,

    /// Poids par position (séparés par des virgules)
    #[arg(long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,
}

impl TuningArgs {
    fn resolve(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(w) = self.window {
            config.window = w;
        }
        if let Some(m) = self.min_history {
            config.min_history = m;
        }
        if let Some(s) = self.scoring {
            config.scoring = s;
        }
        if let Some(l) = self.lambda {
            config.lambda = l;
        }
        if let Some(t) = self.tie_break {
            config.tie_break = t;
        }
        if let Some(n) = self.top {
            config.top_n = n;
        }
        if let Some(w) = &self.weights {
            config.position_weights = w.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LEKDET_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let path = cli.db.clone().unwrap_or_else(db_path);

    match cli.command {
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::Slip { action } => cmd_slip(action),
        command => {
            let conn = open_db(&path)?;
            migrate(&conn)?;
            match command {
                Command::Import { file, session, format, mode } => {
                    cmd_import(&conn, &file, &session, format, mode)
                }
                Command::Sessions => cmd_sessions(&conn),
                Command::List { session, last } => cmd_list(&conn, &session, last),
                Command::Clear { session } => cmd_clear(&conn, &session),
                Command::Stats { source, tuning } => cmd_stats(&conn, &source, &tuning),
                Command::Predict { source, tuning, seed, calibration, csv } => {
                    cmd_predict(&conn, &source, &tuning, seed, &calibration, csv.as_deref())
                }
                Command::Calibrate { source, tuning, output } => {
                    cmd_calibrate(&conn, &source, &tuning, &output)
                }
                Command::DbPath | Command::Slip { .. } => Ok(()),
            }
        }
    }
}

fn cmd_import(
    conn: &Connection,
    file: &Path,
    session: &str,
    format: DrawFormat,
    mode: ExtractMode,
) -> Result<()> {
    let text = read_input(file)?;
    let report = parse_history(&text, format, mode);
    display::display_parse_report(&report);

    let inserted = append_draws(conn, session, report.history.draws())?;
    let total = count_draws(conn, session)?;
    println!("  Ajoutés à la session '{}' : {} (total {})", session, inserted, total);
    Ok(())
}

fn cmd_sessions(conn: &Connection) -> Result<()> {
    let sessions = list_sessions(conn)?;
    display::display_sessions(&sessions);
    Ok(())
}

fn load_session(conn: &Connection, session: &str, fallback: DrawFormat) -> Result<History> {
    let format = session_format(conn, session)?.unwrap_or(fallback);
    fetch_history(conn, session, format)
}

fn cmd_list(conn: &Connection, session: &str, last: usize) -> Result<()> {
    let history = load_session(conn, session, DrawFormat::Four)?;
    if history.is_empty() {
        println!("Session vide. Lancez d'abord : lekdet import <fichier>");
        return Ok(());
    }
    let draws = history.window(last);
    display::display_draws(draws, history.len() - draws.len());
    Ok(())
}

fn cmd_clear(conn: &Connection, session: &str) -> Result<()> {
    let deleted = clear_session(conn, session)?;
    println!("Session '{}' terminée : {} tirages supprimés.", session, deleted);
    Ok(())
}

/// Historique à analyser : fichier ponctuel (en mémoire) ou session enregistrée.
fn resolve_history(conn: &Connection, source: &SourceArgs) -> Result<History> {
    match &source.file {
        Some(file) => {
            let text = read_input(file)?;
            let report = parse_history(&text, source.format, source.mode);
            if !report.rejected.is_empty() {
                display::display_parse_report(&report);
            }
            Ok(report.history)
        }
        None => load_session(conn, &source.session, source.format),
    }
}

fn run_analysis(history: &History, config: &AnalysisConfig) -> Result<Prediction> {
    analyze(history, config).with_context(|| {
        format!(
            "Ajoutez des tirages (au moins {} requis) puis relancez l'analyse",
            config.min_history
        )
    })
}

fn cmd_stats(conn: &Connection, source: &SourceArgs, tuning: &TuningArgs) -> Result<()> {
    let config = tuning.resolve()?;
    let history = resolve_history(conn, source)?;
    let prediction = run_analysis(&history, &config)?;

    display::display_stats(&prediction);
    display::display_frequency_chart(&prediction);
    display::display_digit_summary(&prediction);
    Ok(())
}

fn cmd_predict(
    conn: &Connection,
    source: &SourceArgs,
    tuning: &TuningArgs,
    seed: Option<u64>,
    calibration: &Path,
    csv_path: Option<&Path>,
) -> Result<()> {
    let config = tuning.resolve()?;
    let history = resolve_history(conn, source)?;
    let prediction = run_analysis(&history, &config)?;

    let calibrator = if calibration.exists() {
        load_calibration(calibration)?.calibrator_for(prediction.format, config.window)
    } else {
        None
    };
    if calibrator.is_none() {
        println!("(Pas de calibration applicable, pourcentages bruts)");
    }

    display::display_digit_summary(&prediction);

    for kind in CandidateKind::ALL {
        display::display_candidates(kind, &prediction, config.top_n, calibrator.as_ref());
    }

    let mut rng = make_rng(seed);
    if let Some(guess) = final_guess(&prediction, config.top_n, &mut rng) {
        display::display_guess(guess);
    }

    if let Some(path) = csv_path {
        export_csv(&prediction, path)?;
        println!("\nCandidats exportés dans : {}", path.display());
    }

    Ok(())
}

fn export_csv(prediction: &Prediction, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Impossible de créer {:?}", path))?;
    writer.write_record(["categorie", "rang", "candidat", "score"])?;
    for (kind, list) in &prediction.ranked {
        for (i, c) in list.iter().enumerate() {
            writer.write_record([
                kind.width().to_string(),
                (i + 1).to_string(),
                c.value.clone(),
                format!("{:.6}", c.score),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn cmd_calibrate(
    conn: &Connection,
    source: &SourceArgs,
    tuning: &TuningArgs,
    output: &Path,
) -> Result<()> {
    let config = tuning.resolve()?;
    let history = resolve_history(conn, source)?;
    if history.len() <= config.min_history {
        bail!(
            "Calibration impossible : {} tirages, il en faut plus de {}",
            history.len(),
            config.min_history
        );
    }

    let range = backtest_range(&history, &config);
    println!("Évaluation glissante sur {} tirages...", range.len());

    let pb = ProgressBar::new(range.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
        .context("Modèle de barre de progression invalide")?
        .progress_chars("=> "));

    let mut samples = Vec::new();
    for t in range {
        samples.extend(backtest_step(&history, t, &config));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let hits = samples.iter().filter(|(_, h)| *h).count();
    let saved = SavedCalibration {
        format: history.format(),
        window: config.window,
        samples: samples.len(),
        hit_rate: if samples.is_empty() { 0.0 } else { hits as f64 / samples.len() as f64 },
        calibrator: Calibrator::fit(&samples, &config.calibration),
    };

    display::display_calibration(&saved);

    save_calibration(&saved, output)?;
    println!("\nCalibration sauvegardée dans : {}", output.display());
    Ok(())
}

fn cmd_slip(action: SlipAction) -> Result<()> {
    match action {
        SlipAction::Upload { file, name, dir } => {
            let store = SlipStore::new(dir);
            let now = chrono::Local::now().naive_local();
            let path = store.store(&file, &name, now)?;
            println!("✅ Justificatif enregistré : {}", path.display());
            println!("Merci de patienter pendant la vérification.");
            Ok(())
        }
        SlipAction::List { dir } => {
            let store = SlipStore::new(dir);
            display::display_slips(&store.list()?);
            Ok(())
        }
    }
}
