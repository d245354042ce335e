use crate::domain::error::{AppError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Uploaded files under `<data_dir>/documents/<staff_id>/`.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    data_dir: PathBuf,
}

impl DocumentStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Write the file and return its path relative to the data dir.
    pub fn save(&self, staff_id: &str, file_name: &str, bytes: &[u8], millis: i64) -> Result<String> {
        let staff_dir = self.data_dir.join("documents").join(sanitize_file_name(staff_id));
        ensure_dir(&staff_dir)?;

        let safe_name = sanitize_file_name(file_name);
        let mut stamp = millis;
        let mut stored_name = format!("{}_{}", stamp, safe_name);
        while staff_dir.join(&stored_name).exists() {
            stamp += 1;
            stored_name = format!("{}_{}", stamp, safe_name);
        }
        fs::write(staff_dir.join(&stored_name), bytes)?;

        Ok(format!(
            "documents/{}/{}",
            sanitize_file_name(staff_id),
            stored_name
        ))
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.resolve(relative)?;
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("Stored file missing: {}", relative))
            }
            _ => AppError::from(e),
        })
    }

    /// Remove a stored file; a file that is already gone is not an error.
    pub fn remove(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative = Path::new(relative);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(AppError::ValidationError(format!(
                "Invalid stored file path: {}",
                relative.display()
            )));
        }
        Ok(self.data_dir.join(relative))
    }
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("ID copy (1).pdf"), "ID_copy__1_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\scans\\licence.png"), "licence.png");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn save_read_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let relative = store.save("staff 1", "id.pdf", b"%PDF-1.4", 1700).unwrap();
        assert_eq!(relative, "documents/staff_1/1700_id.pdf");
        assert_eq!(store.read(&relative).unwrap(), b"%PDF-1.4");

        let second = store.save("staff 1", "id.pdf", b"other", 1700).unwrap();
        assert_eq!(second, "documents/staff_1/1701_id.pdf");

        store.remove(&relative).unwrap();
        store.remove(&relative).unwrap();
        assert!(matches!(store.read(&relative), Err(AppError::NotFound(_))));
    }

    #[test]
    fn paths_outside_the_store_are_rejected() {
        let store = DocumentStore::new("/tmp/unused");
        assert!(matches!(
            store.read("../secret"),
            Err(AppError::ValidationError(_))
        ));
        assert!(store.remove("/etc/passwd").is_err());
    }
}
