use std::collections::{BTreeMap, BTreeSet};

/// In-memory stand-in for the CEC system save data archive.
///
/// Paths are absolute and `/`-separated. Writing a file creates its parent directories.
#[derive(Debug, Clone, Default)]
pub struct BoxStore {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

fn is_child(path: &str, dir: &str) -> bool {
    path.strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

impl BoxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn create_dir_all(&mut self, path: &str) {
        let mut current = Some(path);
        while let Some(dir) = current {
            if !self.dirs.insert(dir.to_owned()) {
                break;
            }
            current = parent(dir);
        }
    }

    pub fn read(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn write(&mut self, path: &str, data: Vec<u8>) {
        if let Some(dir) = parent(path) {
            self.create_dir_all(dir);
        }
        self.files.insert(path.to_owned(), data);
    }

    pub fn remove_file(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }

    /// Removes `path` and everything below it.
    pub fn remove_dir_all(&mut self, path: &str) -> bool {
        if !self.dirs.remove(path) {
            return false;
        }
        let prefix = format!("{path}/");
        self.files.retain(|file, _| !file.starts_with(&prefix));
        self.dirs.retain(|dir| !dir.starts_with(&prefix));
        true
    }

    /// Names of the files and directories directly inside `dir`.
    pub fn entries(&self, dir: &str) -> Vec<&str> {
        let dirs = self.dirs.iter().filter(|d| is_child(d, dir));
        let files = self.files.keys().filter(|f| is_child(f, dir));
        dirs.chain(files)
            .filter_map(|path| path.rsplit_once('/').map(|(_, name)| name))
            .collect()
    }
}
