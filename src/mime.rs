use std::collections::HashMap;
use std::path::Path;

/// Content type for files whose extension is not in the table.
pub const DEFAULT_MIME_TYPE: &str = "other";

const DEFAULT_EXTENSIONS_MAP: &[&str] = &[
    "application/pdf         .pdf",
    "image/gif               .gif",
    "image/jpeg              .jpg",
    "image/png               .png",
    "text/css                .css",
    "text/html               .html",
    "text/plain              .txt",
];

/// Extension to content type table. Keys include the leading dot and match case-sensitively.
#[derive(Debug)]
pub struct MimeMap {
    mimetypes: HashMap<String, String>,
    default_mimetype: String,
}

impl MimeMap {
    /// Add line from an extension map: a mimetype followed by one or more extensions.
    fn add_mimetype_line(&mut self, line: &str) {
        let mut fields = line
            .split(|c| matches!(c, ' ' | '\t'))
            .filter(|field| !field.is_empty());
        let mimetype = match fields.next() {
            Some(mimetype) => mimetype,
            None => return, // empty line
        };
        for extension in fields {
            self.mimetypes
                .insert(extension.to_string(), mimetype.to_string());
        }
    }

    /// Get content type for a file path.
    pub fn content_type(&self, path: &Path) -> &str {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(|extension| self.mimetypes.get(&format!(".{}", extension)))
            .unwrap_or(&self.default_mimetype)
    }
}

impl Default for MimeMap {
    fn default() -> Self {
        let mut mime_map = Self {
            mimetypes: HashMap::new(),
            default_mimetype: DEFAULT_MIME_TYPE.to_string(),
        };
        for line in DEFAULT_EXTENSIONS_MAP {
            mime_map.add_mimetype_line(line);
        }
        mime_map
    }
}
