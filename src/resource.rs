use std::path::PathBuf;

const DEFAULT_INDEX_NAME: &str = "index.html";

/// What a request target refers to under the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A regular file, served as is.
    File(PathBuf),
    /// The `index.html` of a directory requested with a trailing slash.
    DirectoryIndex(PathBuf),
    /// A directory requested with a trailing slash that has no `index.html`.
    Listing(PathBuf),
    NotFound,
}

impl Resource {
    /// Classify `target` (which starts with `/`) relative to `wwwroot`.
    ///
    /// The filesystem is consulted on every call, so each request sees the tree as it is right
    /// now. A directory named without a trailing slash is not found; there are no redirects.
    pub fn resolve(wwwroot: &str, target: &str) -> Self {
        let path = PathBuf::from(format!("{}{}", wwwroot, target));
        if path.is_dir() && target.ends_with('/') {
            let index = path.join(DEFAULT_INDEX_NAME);
            if index.is_file() {
                Self::DirectoryIndex(index)
            } else {
                Self::Listing(path)
            }
        } else if path.is_file() {
            Self::File(path)
        } else {
            Self::NotFound
        }
    }
}

/// Resolve `//`, `/./` and `/../` in a URL path.
///
/// None if the path does not start with `/` or climbs above it. A trailing slash survives
/// unless nothing is left but the root.
pub fn make_safe_url(url: &str) -> Option<String> {
    let rest = url.strip_prefix('/')?;
    let mut segments = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            name => segments.push(name),
        }
    }
    let mut safe = format!("/{}", segments.join("/"));
    if url.ends_with('/') && !segments.is_empty() {
        safe.push('/');
    }
    Some(safe)
}
