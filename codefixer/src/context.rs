use std::cell::RefCell;
use std::collections::BTreeMap;

/// Optional callback the fixer uses to pull in a file referenced by an
/// import but not present in the in-memory project map. Fetched files are
/// cached in the working set for the remainder of the run, so a given path
/// is fetched at most once.
pub trait FileFetcher {
    fn fetch(&self, path: &str) -> Option<String>;
}

/// A fetcher that never resolves anything, for callers with no external
/// file store (e.g. tests, or a fully in-memory project snapshot).
pub struct NoopFetcher;

impl FileFetcher for NoopFetcher {
    fn fetch(&self, _path: &str) -> Option<String> {
        None
    }
}

/// Shared mutable state threaded through every fixer invocation during one
/// `fix_project_issues` run.
pub(crate) struct FixCtx<'a> {
    files: RefCell<BTreeMap<String, String>>,
    fetcher: &'a dyn FileFetcher,
}

impl<'a> FixCtx<'a> {
    pub fn new(files: BTreeMap<String, String>, fetcher: &'a dyn FileFetcher) -> Self {
        Self { files: RefCell::new(files), fetcher }
    }

    /// Returns the current contents of `path`, fetching and caching it on
    /// first access if it is not already in the working set.
    pub fn get(&self, path: &str) -> Option<String> {
        if let Some(existing) = self.files.borrow().get(path) {
            return Some(existing.clone());
        }
        let fetched = self.fetcher.fetch(path)?;
        self.files.borrow_mut().insert(path.to_string(), fetched.clone());
        Some(fetched)
    }

    pub fn set(&self, path: &str, contents: String) {
        self.files.borrow_mut().insert(path.to_string(), contents);
    }

    pub fn into_files(self) -> BTreeMap<String, String> {
        self.files.into_inner()
    }
}
