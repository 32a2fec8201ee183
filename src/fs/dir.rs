use super::{clean_path, Filesystem, WalkEntry};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A live directory tree, e.g. `/` of the running machine or a project checkout.
#[derive(Debug, Clone)]
pub struct DirFs {
    base: PathBuf,
}

impl DirFs {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = clean_path(path);
        if path == "." {
            self.base.clone()
        } else {
            self.base.join(path)
        }
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.base).unwrap_or(path);
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        clean_path(&parts.join("/"))
    }
}

impl Filesystem for DirFs {
    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|e| Error::io(&full, e))?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn walk<'a>(&'a self, root: &str) -> Box<dyn Iterator<Item = Result<WalkEntry>> + 'a> {
        let start = self.resolve(root);
        let walker = WalkDir::new(&start).sort_by_file_name().into_iter();

        Box::new(walker.map(move |entry| {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| start.clone());
                Error::io(path, e.into())
            })?;

            Ok(WalkEntry {
                path: self.relative(entry.path()),
                is_dir: entry.file_type().is_dir(),
                is_file: entry.file_type().is_file(),
            })
        }))
    }
}
