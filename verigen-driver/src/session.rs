// SPDX-License-Identifier: Apache-2.0

//! Timestamped session directory manager.
//!
//! One session per program run: `<base>/<YYYY-MM-DD_HH-MM-SS>/`, with each
//! iteration getting a zero-padded five-digit subdirectory. All per-tool
//! artifacts live below the iteration directory, so nothing from one
//! iteration can leak into another.

use anyhow::Context;
use std::path::{Path, PathBuf};

pub struct Session {
    dir: PathBuf,
    counter: u32,
}

impl Session {
    pub fn create(base: &Path) -> anyhow::Result<Session> {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let dir = base.join(stamp);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create session directory {}", dir.display()))?;
        Ok(Session { dir, counter: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocates the next iteration directory, e.g. `<session>/00042/`.
    pub fn next(&mut self) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(format!("{:05}", self.counter));
        self.counter += 1;
        std::fs::create_dir_all(&path)
            .with_context(|| format!("cannot create iteration directory {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_directories_are_zero_padded_and_ordered() {
        let base = tempfile::tempdir().unwrap();
        let mut session = Session::create(base.path()).unwrap();
        assert!(session.dir().is_dir());

        let first = session.next().unwrap();
        let second = session.next().unwrap();
        assert!(first.ends_with("00000"));
        assert!(second.ends_with("00001"));
        assert!(first.is_dir());
        assert!(second.is_dir());
    }

    #[test]
    fn session_directory_carries_a_timestamp_stamp() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::create(base.path()).unwrap();
        let name = session.dir().file_name().unwrap().to_string_lossy().into_owned();
        // YYYY-MM-DD_HH-MM-SS
        assert_eq!(name.len(), 19);
        assert_eq!(&name[4..5], "-");
        assert_eq!(&name[10..11], "_");
    }
}
