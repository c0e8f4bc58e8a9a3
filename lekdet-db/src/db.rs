use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::models::{Draw, DrawFormat, History};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    session  TEXT NOT NULL,
    seq      INTEGER NOT NULL,
    format   TEXT NOT NULL,
    digits   TEXT NOT NULL,
    PRIMARY KEY (session, seq)
);
";

pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub name: String,
    pub format: DrawFormat,
    pub draws: u32,
}

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("lekdet.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

pub fn session_format(conn: &Connection, session: &str) -> Result<Option<DrawFormat>> {
    let name: Option<String> = conn
        .query_row(
            "SELECT format FROM draws WHERE session = ?1 LIMIT 1",
            [session],
            |row| row.get(0),
        )
        .optional()?;
    match name {
        None => Ok(None),
        Some(n) => match DrawFormat::from_name(&n) {
            Some(format) => Ok(Some(format)),
            None => bail!("Format inconnu '{}' dans la session '{}'", n, session),
        },
    }
}

/// Ajoute des tirages à la fin d'une session. Retourne le nombre de lignes insérées.
pub fn append_draws(conn: &Connection, session: &str, draws: &[Draw]) -> Result<u32> {
    let Some(first) = draws.first() else {
        return Ok(0);
    };
    let format = first.format();
    if draws.iter().any(|d| d.format() != format) {
        bail!("Tous les tirages d'un ajout doivent partager le même format");
    }
    if let Some(existing) = session_format(conn, session)? {
        if existing != format {
            bail!(
                "La session '{}' contient des tirages au format {}, impossible d'ajouter du {}",
                session,
                existing,
                format
            );
        }
    }

    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let next_seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM draws WHERE session = ?1",
        [session],
        |row| row.get(0),
    )?;

    let mut inserted = 0u32;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO draws (session, seq, format, digits) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (offset, draw) in draws.iter().enumerate() {
            stmt.execute(rusqlite::params![
                session,
                next_seq + offset as i64,
                format.as_str(),
                draw.encode(),
            ])
            .context("Échec de l'insertion")?;
            inserted += 1;
        }
    }

    tx.commit().context("Échec du commit")?;
    tracing::debug!(session, inserted, "tirages ajoutés");
    Ok(inserted)
}

/// Charge l'historique complet d'une session, du plus ancien au plus récent.
pub fn fetch_history(conn: &Connection, session: &str, format: DrawFormat) -> Result<History> {
    if let Some(existing) = session_format(conn, session)? {
        if existing != format {
            bail!(
                "La session '{}' est au format {}, pas {}",
                session,
                existing,
                format
            );
        }
    }

    let mut stmt = conn.prepare(
        "SELECT digits FROM draws WHERE session = ?1 ORDER BY seq ASC"
    )?;
    let tokens = stmt
        .query_map([session], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut history = History::new(format);
    for token in tokens {
        let draw = Draw::from_token(&token, format)
            .with_context(|| format!("Tirage corrompu '{}' dans la session '{}'", token, session))?;
        history.push(draw)?;
    }
    Ok(history)
}

pub fn count_draws(conn: &Connection, session: &str) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM draws WHERE session = ?1",
        [session],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_sessions(conn: &Connection) -> Result<Vec<SessionSummary>> {
    let mut stmt = conn.prepare(
        "SELECT session, MIN(format), COUNT(*) FROM draws GROUP BY session ORDER BY session"
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(name, format, draws)| {
            let format = DrawFormat::from_name(&format).with_context(|| {
                format!("Format inconnu '{}' dans la session '{}'", format, name)
            })?;
            Ok(SessionSummary { name, format, draws })
        })
        .collect()
}

/// Termine une session : supprime tous ses tirages.
pub fn clear_session(conn: &Connection, session: &str) -> Result<usize> {
    let deleted = conn
        .execute("DELETE FROM draws WHERE session = ?1", [session])
        .context("Échec de la suppression")?;
    Ok(deleted)
}
