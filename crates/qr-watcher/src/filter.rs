//! Path filtering for changed paths.
//!
//! Filters run in the debouncer callback, before a batch is sent to the
//! change channel. They see every changed path, directories included, so a
//! filter that only knows about files should let extension-less paths
//! through.
//!
//! # Examples
//!
//! ```
//! use qr_watcher::{CompositeFilter, ExtensionFilter, FileFilter, HiddenFilter};
//! use camino::Utf8Path;
//!
//! let filter = CompositeFilter::new()
//!     .and(HiddenFilter)
//!     .and(ExtensionFilter::new(&["txt", "md"]));
//!
//! assert!(filter.should_process(Utf8Path::new("/notes/todo.txt")));
//! assert!(filter.should_process(Utf8Path::new("/notes/archive")));
//! assert!(!filter.should_process(Utf8Path::new("/notes/.todo.txt.swp")));
//! assert!(!filter.should_process(Utf8Path::new("/notes/logo.png")));
//! ```

use camino::Utf8Path;
use smallvec::SmallVec;

/// A predicate deciding which changed paths reach the change channel.
///
/// # Thread Safety
///
/// Filters must be [`Send`] and [`Sync`] because they are called from the
/// debouncer thread, and `'static` because they are moved into its callback.
///
/// # Examples
///
/// ```
/// use qr_watcher::FileFilter;
/// use camino::Utf8Path;
///
/// struct NoBuildOutput;
///
/// impl FileFilter for NoBuildOutput {
///     fn should_process(&self, path: &Utf8Path) -> bool {
///         !path.as_str().contains("/target/")
///     }
/// }
///
/// assert!(!NoBuildOutput.should_process(Utf8Path::new("/src/target/debug/out.txt")));
/// ```
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if changes to the given path should be reported.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts all paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// A filter rejecting hidden (dot-prefixed) paths.
///
/// Only the final component is inspected, so a tracked directory that
/// itself lives under a hidden ancestor still reports changes.
///
/// # Examples
///
/// ```
/// use qr_watcher::{FileFilter, HiddenFilter};
/// use camino::Utf8Path;
///
/// assert!(HiddenFilter.should_process(Utf8Path::new("/home/me/.cache/notes/a.txt")));
/// assert!(!HiddenFilter.should_process(Utf8Path::new("/home/me/notes/.git")));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HiddenFilter;

impl HiddenFilter {
    /// Returns `true` if the path's final component starts with a dot.
    #[inline]
    #[must_use]
    pub fn is_hidden(path: &Utf8Path) -> bool {
        path.file_name().is_some_and(|name| name.starts_with('.'))
    }
}

impl FileFilter for HiddenFilter {
    #[inline]
    fn should_process(&self, path: &Utf8Path) -> bool {
        !Self::is_hidden(path)
    }
}

/// A filter based on file extensions.
///
/// Paths with a listed extension pass. Paths without any extension pass as
/// well unless [`strict`](Self::strict) is set, so directory changes still
/// get through.
///
/// # Examples
///
/// ```
/// use qr_watcher::{ExtensionFilter, FileFilter};
/// use camino::Utf8Path;
///
/// let filter = ExtensionFilter::new(&["txt", "md"]);
/// assert!(filter.should_process(Utf8Path::new("notes/a.txt")));
/// assert!(filter.should_process(Utf8Path::new("notes/drafts")));
/// assert!(!filter.should_process(Utf8Path::new("notes/a.pdf")));
///
/// let strict = ExtensionFilter::new(&["txt"]).strict();
/// assert!(!strict.should_process(Utf8Path::new("notes/drafts")));
/// ```
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: SmallVec<[String; 8]>,
    strict: bool,
}

impl ExtensionFilter {
    /// Creates a new extension filter.
    ///
    /// # Arguments
    ///
    /// * `extensions` - The extensions to accept (without the leading dot)
    #[must_use]
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|s| (*s).to_owned()).collect(),
            strict: false,
        }
    }

    /// Creates an extension filter from owned strings.
    #[must_use]
    pub fn from_owned(extensions: Vec<String>) -> Self {
        Self {
            extensions: extensions.into_iter().collect(),
            strict: false,
        }
    }

    /// Rejects paths without an extension.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

impl FileFilter for ExtensionFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        match path.extension() {
            Some(ext) => self.extensions.iter().any(|e| e == ext),
            None => !self.strict,
        }
    }
}

/// A composite filter that combines multiple filters with AND logic.
///
/// An empty composite accepts everything.
#[derive(Default)]
pub struct CompositeFilter {
    filters: Vec<Box<dyn FileFilter>>,
}

impl CompositeFilter {
    /// Creates a new empty composite filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Adds a filter to the composite.
    #[must_use]
    pub fn and<F: FileFilter>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Returns the number of combined filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if no filter has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl FileFilter for CompositeFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        self.filters.iter().all(|f| f.should_process(path))
    }
}

impl<F: FileFilter + ?Sized> FileFilter for Box<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}

impl<F: FileFilter + ?Sized> FileFilter for std::sync::Arc<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_all_filter() {
        assert!(AcceptAllFilter.should_process(Utf8Path::new("anything.txt")));
        assert!(AcceptAllFilter.should_process(Utf8Path::new("")));
    }

    #[test]
    fn test_hidden_filter() {
        assert!(HiddenFilter.should_process(Utf8Path::new("/notes/a.txt")));
        assert!(HiddenFilter.should_process(Utf8Path::new("/tmp/.tmpA1b2/a.txt")));
        assert!(!HiddenFilter.should_process(Utf8Path::new("/notes/.a.txt")));
        assert!(!HiddenFilter.should_process(Utf8Path::new("/notes/.git")));
        assert!(HiddenFilter.should_process(Utf8Path::new("/")));
    }

    #[test]
    fn test_extension_filter() {
        let filter = ExtensionFilter::new(&["txt", "md"]);
        assert!(filter.should_process(Utf8Path::new("a.txt")));
        assert!(filter.should_process(Utf8Path::new("a.md")));
        assert!(!filter.should_process(Utf8Path::new("a.rs")));
        assert!(filter.should_process(Utf8Path::new("Makefile")));
    }

    #[test]
    fn test_extension_filter_strict() {
        let filter = ExtensionFilter::from_owned(vec!["txt".to_owned()]).strict();
        assert!(filter.should_process(Utf8Path::new("a.txt")));
        assert!(!filter.should_process(Utf8Path::new("Makefile")));
    }

    #[test]
    fn test_composite_filter() {
        let empty = CompositeFilter::new();
        assert!(empty.is_empty());
        assert!(empty.should_process(Utf8Path::new("anything")));

        let filter = CompositeFilter::new()
            .and(HiddenFilter)
            .and(ExtensionFilter::new(&["txt"]).strict());
        assert_eq!(filter.len(), 2);
        assert!(filter.should_process(Utf8Path::new("/n/a.txt")));
        assert!(!filter.should_process(Utf8Path::new("/n/.a.txt")));
        assert!(!filter.should_process(Utf8Path::new("/n/a.md")));
    }

    #[test]
    fn test_boxed_and_arc_filters() {
        let boxed: Box<dyn FileFilter> = Box::new(HiddenFilter);
        assert!(!boxed.should_process(Utf8Path::new(".hidden")));

        let shared = std::sync::Arc::new(ExtensionFilter::new(&["txt"]));
        assert!(shared.should_process(Utf8Path::new("a.txt")));
    }
}
