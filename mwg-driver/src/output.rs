//! Writing rendered artifacts into the output folder
//!
//! Every artifact is first written next to its destination under a temporary
//! name; the final names only appear once all of them were written. If moving
//! one into place fails, the ones already moved are taken back and any files
//! they replaced are restored.

use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// A rendered file and its name inside the output folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: &'static str,
    pub contents: String,
}

impl Artifact {
    pub fn new(name: &'static str, contents: String) -> Self {
        Self { name, contents }
    }
}

/// An artifact written under its temporary name
struct Staged {
    temp: PathBuf,
    backup: PathBuf,
    path: PathBuf,
}

pub fn write_all(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output folder '{}'", dir.display()))?;

    let mut staged = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let temp = dir.join(format!(".{}.tmp", artifact.name));
        if let Err(e) = fs::write(&temp, &artifact.contents) {
            discard(&staged);
            let _ = fs::remove_file(&temp);
            return Err(e).with_context(|| format!("Failed to write '{}'", temp.display()));
        }
        staged.push(Staged {
            temp,
            backup: dir.join(format!(".{}.bak", artifact.name)),
            path: dir.join(artifact.name),
        });
    }

    let mut placed: Vec<(&Staged, bool)> = Vec::with_capacity(staged.len());
    for (index, artifact) in staged.iter().enumerate() {
        match place(artifact) {
            Ok(replaced) => placed.push((artifact, replaced)),
            Err(e) => {
                roll_back(&placed);
                discard(&staged[index..]);
                return Err(e);
            }
        }
    }

    let mut written = Vec::with_capacity(placed.len());
    for (artifact, replaced) in placed {
        if replaced {
            let _ = fs::remove_file(&artifact.backup);
        }
        info!("Wrote {}", artifact.path.display());
        written.push(artifact.path.clone());
    }
    Ok(written)
}

/// Move a staged artifact to its final name, returns whether a previous file was set aside
fn place(artifact: &Staged) -> Result<bool> {
    let replaced = artifact.path.is_file();
    if replaced {
        fs::rename(&artifact.path, &artifact.backup)
            .with_context(|| format!("Failed to set aside '{}'", artifact.path.display()))?;
    }
    if let Err(e) = fs::rename(&artifact.temp, &artifact.path) {
        if replaced {
            let _ = fs::rename(&artifact.backup, &artifact.path);
        }
        return Err(e).with_context(|| format!("Failed to move '{}' into place", artifact.path.display()));
    }
    Ok(replaced)
}

/// Undo placed artifacts, newest first, restoring the files they replaced
fn roll_back(placed: &[(&Staged, bool)]) {
    for (artifact, replaced) in placed.iter().rev() {
        let _ = fs::remove_file(&artifact.path);
        if *replaced {
            let _ = fs::rename(&artifact.backup, &artifact.path);
        }
    }
}

fn discard(staged: &[Staged]) {
    for artifact in staged {
        let _ = fs::remove_file(&artifact.temp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_every_artifact() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("nested").join("out");
        let artifacts = vec![
            Artifact::new("main.c", "int main(void) { return 0; }\n".to_string()),
            Artifact::new("Makefile", "all:\n".to_string()),
        ];
        let written = write_all(&dir, &artifacts).unwrap();
        assert_eq!(written, vec![dir.join("main.c"), dir.join("Makefile")]);
        assert_eq!(fs::read_to_string(dir.join("Makefile")).unwrap(), "all:\n");

        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_replaces_previous_output() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("main.c"), "old").unwrap();
        write_all(root.path(), &[Artifact::new("main.c", "new".to_string())]).unwrap();
        assert_eq!(fs::read_to_string(root.path().join("main.c")).unwrap(), "new");
    }

    fn hidden_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with('.'))
            .collect()
    }

    #[test]
    fn test_failed_move_restores_previous_output() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("main.c"), "old").unwrap();
        // A non-empty directory cannot be replaced by a file
        fs::create_dir(root.path().join("Makefile")).unwrap();
        fs::write(root.path().join("Makefile").join("keep"), "").unwrap();

        let artifacts = vec![
            Artifact::new("main.c", "new".to_string()),
            Artifact::new("Makefile", "all:\n".to_string()),
        ];
        assert!(write_all(root.path(), &artifacts).is_err());
        assert_eq!(fs::read_to_string(root.path().join("main.c")).unwrap(), "old");
        assert!(root.path().join("Makefile").join("keep").exists());
        assert!(hidden_leftovers(root.path()).is_empty());
    }

    #[test]
    fn test_failed_move_leaves_no_partial_output() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("Makefile")).unwrap();
        fs::write(root.path().join("Makefile").join("keep"), "").unwrap();

        let artifacts = vec![
            Artifact::new("main.c", "new".to_string()),
            Artifact::new("Makefile", "all:\n".to_string()),
        ];
        assert!(write_all(root.path(), &artifacts).is_err());
        assert!(!root.path().join("main.c").exists());
        assert!(hidden_leftovers(root.path()).is_empty());
    }
}
