use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL,
};
use std::path::PathBuf;
use textplots::{Chart, Plot, Shape};

use lekdet_db::db::SessionSummary;
use lekdet_db::models::{CandidateKind, CandidateScore, DIGITS, DigitTag, Draw};

use crate::analysis::calibration::{Calibrator, SavedCalibration};
use crate::analysis::scorer::Prediction;
use crate::import::ParseReport;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn display_draws(draws: &[Draw], offset: usize) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table();
    table.set_header(vec!["#", "Tirage"]);
    for (i, draw) in draws.iter().enumerate() {
        table.add_row(vec![(offset + i + 1).to_string(), draw.to_string()]);
    }
    println!("{table}");
}

pub fn display_parse_report(report: &ParseReport) {
    println!("Import terminé :");
    println!("  Tirages acceptés : {}", report.accepted());
    if report.rejected.is_empty() {
        return;
    }
    println!("  Lignes ignorées  : {}", report.rejected.len());

    let mut table = new_table();
    table.set_header(vec!["Ligne", "Contenu", "Motif"]);
    for r in &report.rejected {
        table.add_row(vec![
            Cell::new(r.line_no),
            Cell::new(&r.content),
            Cell::new(r.reason.to_string()).fg(Color::Yellow),
        ]);
    }
    println!("{table}");
}

pub fn display_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("Aucune session enregistrée.");
        return;
    }
    let mut table = new_table();
    table.set_header(vec!["Session", "Format", "Tirages"]);
    for s in sessions {
        table.add_row(vec![s.name.clone(), s.format.to_string(), s.draws.to_string()]);
    }
    println!("{table}");
}

fn tag_color(tag: DigitTag) -> Color {
    match tag {
        DigitTag::Hot => Color::Green,
        DigitTag::Cold => Color::Blue,
        DigitTag::Missing => Color::Red,
        DigitTag::Normal => Color::White,
    }
}

pub fn display_stats(prediction: &Prediction) {
    println!("\n📊 Statistiques sur les {} derniers tirages\n", prediction.window);

    let positions = prediction.counts.by_position.len();
    let mut header = vec!["Chiffre".to_string(), "Fréquence".to_string()];
    header.extend((0..positions).map(|p| format!("Pos {}", p + 1)));
    header.push("Retard".to_string());
    header.push("Tag".to_string());

    let mut table = new_table();
    table.set_header(header);

    let mut sorted = prediction.stats.clone();
    sorted.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.digit.cmp(&b.digit)));

    for stat in &sorted {
        let tag = prediction
            .tags
            .iter()
            .find(|(d, _)| *d == stat.digit)
            .map(|(_, t)| *t)
            .unwrap_or(DigitTag::Normal);
        let mut row = vec![Cell::new(stat.digit), Cell::new(stat.frequency)];
        for pos in &prediction.counts.by_position {
            row.push(Cell::new(pos[stat.digit as usize]));
        }
        row.push(Cell::new(stat.gap));
        row.push(Cell::new(tag.to_string()).fg(tag_color(tag)));
        table.add_row(row);
    }
    println!("{table}");
}

pub fn display_frequency_chart(prediction: &Prediction) {
    println!("\n── Fréquence des chiffres 0–9 ──\n");
    let points: Vec<(f32, f32)> = (0..DIGITS)
        .map(|d| (d as f32, prediction.counts.overall[d] as f32))
        .collect();
    let y_max = points.iter().map(|(_, y)| *y).fold(1.0f32, f32::max);
    Chart::new_with_y_range(120, 40, -0.5, 9.5, 0.0, y_max)
        .lineplot(&Shape::Bars(&points))
        .display();
}

pub fn display_digit_summary(prediction: &Prediction) {
    let join = |digits: &[u8]| {
        digits.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
    };
    println!("\n🔺 Chiffres dominants : {}", join(&prediction.hot));
    if prediction.missing_is_fallback {
        println!("🔻 Aucun chiffre absent, le moins fréquent : {}", join(&prediction.missing));
    } else {
        println!("🔻 Chiffres absents : {}", join(&prediction.missing));
    }
}

/// Liste classée d'une catégorie, annotée d'un pourcentage.
pub fn display_candidates(
    kind: CandidateKind,
    prediction: &Prediction,
    top: usize,
    calibrator: Option<&Calibrator>,
) {
    let candidates = prediction.candidates(kind);
    if candidates.is_empty() {
        return;
    }
    println!("\n── {} ──", kind.label());

    let calibrated = kind == CandidateKind::Single && calibrator.is_some();
    let shares = prediction.single_shares();
    let mut table = new_table();
    table.set_header(vec![
        "#",
        "Candidat",
        "Score",
        if calibrated { "Probabilité calibrée" } else { "Part" },
    ]);

    for (i, c) in candidates.iter().take(top).enumerate() {
        let pct = match (calibrator, kind) {
            (Some(cal), CandidateKind::Single) => {
                let share = single_share(&shares, &c.value);
                cal.apply(share) * 100.0
            }
            _ => prediction.share(kind, c.score) * 100.0,
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&c.value).fg(Color::Red).add_attribute(Attribute::Bold),
            Cell::new(format!("{:.4}", c.score)),
            Cell::new(format!("{:.1} %", pct)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

fn single_share(shares: &[f64; DIGITS], value: &str) -> f64 {
    value
        .parse::<usize>()
        .ok()
        .and_then(|d| shares.get(d))
        .copied()
        .unwrap_or(0.0)
}

pub fn display_guess(guess: &CandidateScore) {
    println!("\n🔮 Tendance du prochain tirage\n");
    let mut table = new_table();
    table.add_row(vec![
        Cell::new(&guess.value)
            .fg(Color::Red)
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Center),
    ]);
    println!("{table}");
}

pub fn display_calibration(saved: &SavedCalibration) {
    println!(
        "\n🎯 Calibration ({} échantillons, fenêtre {}, taux de présence {:.1} %)\n",
        saved.samples,
        saved.window,
        saved.hit_rate * 100.0
    );

    match &saved.calibrator {
        Calibrator::Isotonic { bins } => {
            let mut table = new_table();
            table.set_header(vec![
                "Classe",
                "Score moyen",
                "Taux observé",
                "Taux monotone",
                "Effectif",
            ]);
            for (i, bin) in bins.iter().enumerate() {
                table.add_row(vec![
                    Cell::new(i + 1),
                    Cell::new(format!("{:.4}", bin.center)),
                    Cell::new(format!("{:.1} %", bin.raw_rate * 100.0)),
                    Cell::new(format!("{:.1} %", bin.rate * 100.0)),
                    Cell::new(bin.count),
                ]);
            }
            println!("{table}");
        }
        Calibrator::Sigmoid { center, scale } => {
            println!(
                "(Échantillon insuffisant : sigmoïde centrée sur {:.4}, pente {:.1})",
                center, scale
            );
        }
    }

    println!("\n── Courbe score → probabilité ──\n");
    let points: Vec<(f32, f32)> = (0..=50)
        .map(|i| {
            let x = i as f64 / 100.0;
            (x as f32, saved.calibrator.apply(x) as f32)
        })
        .collect();
    Chart::new_with_y_range(120, 40, 0.0, 0.5, 0.0, 1.0)
        .lineplot(&Shape::Lines(&points))
        .display();
}

pub fn display_slips(slips: &[PathBuf]) {
    if slips.is_empty() {
        println!("Aucun justificatif enregistré.");
        return;
    }
    println!("📂 Justificatifs enregistrés :");
    let mut table = new_table();
    table.set_header(vec!["Fichier"]);
    for path in slips {
        table.add_row(vec![path.display().to_string()]);
    }
    println!("{table}");
}
