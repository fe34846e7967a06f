use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::{Error, Result};

const TEMP_NAME_LEN: usize = 12;
const MAX_RENAME_ATTEMPTS: usize = 64;

/// An in-flight streaming write of one file part.
///
/// Bytes go to a randomly named temporary file; on [`finish`] the file
/// is renamed to a collision-free final name.
///
/// [`finish`]: SaveOperation::finish
pub(crate) struct SaveOperation {
    dir: PathBuf,
    temp_name: String,
    file: File,
}

impl SaveOperation {
    /// Opens a temporary write target under the nearest existing
    /// directory of `path`, walking up parents if `path` itself is not
    /// a directory.
    pub(crate) fn begin(path: &Path) -> Result<Self> {
        let dir = resolve_dir(path)?;
        let temp_name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMP_NAME_LEN)
            .map(char::from)
            .collect();
        let file = File::create(dir.join(&temp_name))?;
        debug!("saving part under {:?} as {}", dir, temp_name);
        Ok(Self {
            dir,
            temp_name,
            file,
        })
    }

    pub(crate) fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk)?;
        Ok(())
    }

    /// Closes the write target and renames it to `name`, deriving
    /// `name[1].ext`, `name[2].ext`, … while the candidate exists.
    ///
    /// Each candidate is reserved with an atomic create-if-absent open
    /// before the rename; two concurrent saves never resolve to the
    /// same final path. An empty `name` keeps the temporary name.
    pub(crate) fn finish(mut self, name: &str) -> Result<PathBuf> {
        self.file.flush()?;
        drop(self.file);

        let temp_path = self.dir.join(&self.temp_name);
        // only the last path component of the declared name is honored
        let name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        if name.is_empty() {
            return Ok(temp_path);
        }

        let mut candidate = name.to_owned();
        for _ in 0..MAX_RENAME_ATTEMPTS {
            let target = self.dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(_) => {
                    fs::rename(&temp_path, &target)?;
                    debug!("part saved to {:?}", target);
                    return Ok(target);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = next_candidate(&candidate);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::RenameLimit(name.to_owned()))
    }
}

fn resolve_dir(path: &Path) -> Result<PathBuf> {
    let mut dir = path;
    loop {
        if dir.is_dir() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => dir = parent,
            _ => {
                return Err(
                    io::Error::new(io::ErrorKind::NotFound, "no existing save directory").into(),
                )
            }
        }
    }
}

/// `report.txt` -> `report[1].txt` -> `report[2].txt` -> …
fn next_candidate(name: &str) -> String {
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    };
    let bumped = match stem.strip_suffix(']').and_then(|s| s.rsplit_once('[')) {
        Some((base, digits)) => match digits.parse::<u32>() {
            Ok(n) => format!("{base}[{}]", n + 1),
            Err(_) => format!("{stem}[1]"),
        },
        None => format!("{stem}[1]"),
    };
    format!("{bumped}{ext}")
}
