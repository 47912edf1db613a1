use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Escape < > & ' " into HTML entities.
pub struct HtmlEscaped<'a>(pub &'a str);

impl<'a> fmt::Display for HtmlEscaped<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '<' => write!(f, "&lt;")?,
                '>' => write!(f, "&gt;")?,
                '&' => write!(f, "&amp;")?,
                '\'' => write!(f, "&apos;")?,
                '"' => write!(f, "&quot;")?,
                c => write!(f, "{}", c)?,
            }
        }
        Ok(())
    }
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    is_dir: bool,
}

/// Synthesized index page for a directory without an `index.html`.
#[derive(Debug)]
pub struct Listing(Vec<Entry>);

impl Listing {
    /// Enumerate the immediate children of `dir`, sorted by name.
    pub fn read(dir: &Path) -> io::Result<Self> {
        let mut entries = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                // Follows symlinks, so a link to a directory is listed as one.
                is_dir: entry.path().is_dir(),
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self(entries))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<html><body><ul>")?;
        for entry in &self.0 {
            let slash = if entry.is_dir { "/" } else { "" };
            let name = HtmlEscaped(&entry.name);
            write!(f, "<li><a href=\"{}{}\">{}{}</a></li>", name, slash, name, slash)?;
        }
        write!(f, "</ul></body></html>")
    }
}
