use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

pub const ALLOWED_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// Dossier local des justificatifs de paiement téléversés.
#[derive(Debug, Clone)]
pub struct SlipStore {
    root: PathBuf,
}

impl Default for SlipStore {
    fn default() -> Self {
        let mut root = std::env::current_dir().unwrap_or_default();
        root.push("slips");
        Self { root }
    }
}

impl SlipStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copie un justificatif sous `<root>/<YYYYmmdd_HHMMSS>_<owner>.<ext>`.
    pub fn store(&self, source: &Path, owner: &str, now: NaiveDateTime) -> Result<PathBuf> {
        let ext = allowed_extension(source)?;
        let owner = sanitize_owner(owner);
        if owner.is_empty() {
            bail!("Nom d'utilisateur requis pour enregistrer un justificatif");
        }

        let bytes = std::fs::read(source)
            .with_context(|| format!("Impossible de lire {:?}", source))?;

        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", self.root))?;

        let file_name = format!("{}_{}.{}", now.format("%Y%m%d_%H%M%S"), owner, ext);
        let path = self.root.join(file_name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Impossible d'écrire {:?}", path))?;

        tracing::info!(path = %path.display(), "justificatif enregistré");
        Ok(path)
    }

    /// Justificatifs enregistrés, du plus récent au plus ancien.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("Impossible de lire {:?}", self.root))?
        {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(files)
    }
}

fn allowed_extension(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        bail!(
            "Extension '{}' refusée (autorisées : {})",
            ext,
            ALLOWED_EXTENSIONS.join(", ")
        );
    }
    Ok(ext)
}

fn sanitize_owner(owner: &str) -> String {
    owner
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 16)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn write_source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"\x89PNG fake").unwrap();
        path
    }

    #[test]
    fn test_store_creates_folder_and_timestamped_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SlipStore::new(tmp.path().join("slips"));
        let source = write_source(tmp.path(), "slip.PNG");

        let path = store.store(&source, "somchai 0812", at(9, 5, 7)).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "20240316_090507_somchai_0812.png"
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG fake");
    }

    #[test]
    fn test_store_rejects_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SlipStore::new(tmp.path().join("slips"));
        let source = write_source(tmp.path(), "slip.gif");
        assert!(store.store(&source, "a", at(9, 0, 0)).is_err());
        assert!(!store.root().exists());
    }

    #[test]
    fn test_store_requires_owner() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SlipStore::new(tmp.path().join("slips"));
        let source = write_source(tmp.path(), "slip.jpg");
        assert!(store.store(&source, "   ", at(9, 0, 0)).is_err());
    }

    #[test]
    fn test_list_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SlipStore::new(tmp.path().join("slips"));
        assert!(store.list().unwrap().is_empty());

        let source = write_source(tmp.path(), "slip.jpg");
        store.store(&source, "a", at(8, 0, 0)).unwrap();
        store.store(&source, "b", at(10, 0, 0)).unwrap();

        let names: Vec<String> = store
            .list()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["20240316_100000_b.jpg", "20240316_080000_a.jpg"]);
    }
}
