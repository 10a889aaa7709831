//! Logical object identifiers
//!
//! An [`ObjectPath`] is the backend-agnostic identifier for a stored image:
//! `{category}/{id}.{ext}`. Callers never see which backend serves a path.
//! Construction is the only way to obtain one, and construction validates,
//! so any `ObjectPath` held by the rest of the system is safe to hand to a
//! backend.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use uuid::Uuid;

/// Object categories. Fixed set; each category maps to one top-level
/// directory (local backend) or key prefix (sidecar backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Items,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Items => "items",
        }
    }
}

impl FromStr for Category {
    type Err = ObjectPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "items" => Ok(Category::Items),
            _ => Err(ObjectPathError::UnknownCategory(s.to_string())),
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Supported image formats.
///
/// This is the single source of content types at read time; the MIME type
/// served for a stored object is derived from its path extension, never
/// from caller-supplied metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Canonical MIME type for the format.
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }

    /// Canonical file extension (no leading dot).
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    /// Resolve a format from a file extension. Accepts the `jpeg` alias.
    pub fn from_extension(ext: &str) -> Option<ImageFormat> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }
}

/// Errors from constructing or parsing an [`ObjectPath`].
#[derive(Debug, thiserror::Error)]
pub enum ObjectPathError {
    #[error("Unknown object category: {0}")]
    UnknownCategory(String),

    #[error("Invalid object id")]
    InvalidId,

    #[error("Unsupported object extension: {0}")]
    UnsupportedExtension(String),

    #[error("Malformed object path: {0}")]
    Malformed(String),
}

/// Logical, backend-agnostic identifier for a stored object.
///
/// Invariant: the id never contains path separators, `..`, NUL bytes, or
/// whitespace, so the rendered key `{category}/{id}.{ext}` is always a safe
/// relative path with exactly two segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    category: Category,
    id: String,
    format: ImageFormat,
}

impl ObjectPath {
    /// Construct a path from parts, validating the id.
    pub fn new(
        category: Category,
        id: impl Into<String>,
        format: ImageFormat,
    ) -> Result<Self, ObjectPathError> {
        let id = id.into();
        if !Self::id_is_safe(&id) {
            return Err(ObjectPathError::InvalidId);
        }
        Ok(ObjectPath {
            category,
            id,
            format,
        })
    }

    /// Generate a path with a fresh unique id. Ids are generated per upload,
    /// so distinct uploads never collide.
    pub fn generate(category: Category, format: ImageFormat) -> Self {
        ObjectPath {
            category,
            id: Uuid::new_v4().to_string(),
            format,
        }
    }

    /// Parse a logical path string: `items/{id}.{ext}`. A leading `/` or
    /// `/objects/` prefix from the serving route is tolerated.
    pub fn parse(raw: &str) -> Result<Self, ObjectPathError> {
        let trimmed = raw
            .trim_start_matches('/')
            .strip_prefix("objects/")
            .unwrap_or_else(|| raw.trim_start_matches('/'));

        let mut segments = trimmed.split('/');
        let (category, filename) = match (segments.next(), segments.next(), segments.next()) {
            (Some(category), Some(filename), None) => (category, filename),
            _ => return Err(ObjectPathError::Malformed(raw.to_string())),
        };

        let category = category.parse::<Category>()?;

        let (id, ext) = filename
            .rsplit_once('.')
            .ok_or_else(|| ObjectPathError::Malformed(raw.to_string()))?;
        let format = ImageFormat::from_extension(ext)
            .ok_or_else(|| ObjectPathError::UnsupportedExtension(ext.to_string()))?;

        Self::new(category, id, format)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Relative storage key: `{category}/{id}.{ext}`. All backends use this
    /// layout so objects are addressed identically everywhere.
    pub fn key(&self) -> String {
        format!(
            "{}/{}.{}",
            self.category.as_str(),
            self.id,
            self.format.extension()
        )
    }

    /// Public URL for the object. A revision is a cache-busting query
    /// annotation on the same bytes; objects are never rewritten in place.
    pub fn url(&self, base_url: &str, revision: Option<u32>) -> String {
        let base = base_url.trim_end_matches('/');
        match revision {
            Some(rev) => format!("{}/objects/{}?v={}", base, self.key(), rev),
            None => format!("{}/objects/{}", base, self.key()),
        }
    }

    fn id_is_safe(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= 128
            && !id.contains("..")
            && id.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_paths_are_unique_and_well_formed() {
        let a = ObjectPath::generate(Category::Items, ImageFormat::Jpeg);
        let b = ObjectPath::generate(Category::Items, ImageFormat::Jpeg);
        assert_ne!(a.id(), b.id());
        assert!(a.key().starts_with("items/"));
        assert!(a.key().ends_with(".jpg"));
    }

    #[test]
    fn parse_round_trips() {
        let path = ObjectPath::generate(Category::Items, ImageFormat::Png);
        let parsed = ObjectPath::parse(&path.key()).unwrap();
        assert_eq!(parsed, path);

        let served = format!("/objects/{}", path.key());
        assert_eq!(ObjectPath::parse(&served).unwrap(), path);
    }

    #[test]
    fn traversal_ids_are_rejected() {
        for id in ["../../etc/passwd", "a/b", "..", "a..b", "a b", "a\0b", ""] {
            assert!(
                ObjectPath::new(Category::Items, id, ImageFormat::Png).is_err(),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(ObjectPath::parse("items/abc").is_err());
        assert!(ObjectPath::parse("items/abc.exe").is_err());
        assert!(ObjectPath::parse("receipts/abc.png").is_err());
        assert!(ObjectPath::parse("items/a/b.png").is_err());
        assert!(ObjectPath::parse("items/../../etc/passwd.png").is_err());
    }

    #[test]
    fn url_carries_cache_busting_revision() {
        let path = ObjectPath::new(Category::Items, "abc123", ImageFormat::Webp).unwrap();
        assert_eq!(
            path.url("http://localhost:4000/", None),
            "http://localhost:4000/objects/items/abc123.webp"
        );
        assert_eq!(
            path.url("http://localhost:4000", Some(2)),
            "http://localhost:4000/objects/items/abc123.webp?v=2"
        );
    }

    #[test]
    fn jpeg_alias_maps_to_canonical_extension() {
        let parsed = ObjectPath::parse("items/abc.jpeg").unwrap();
        assert_eq!(parsed.format(), ImageFormat::Jpeg);
        assert_eq!(parsed.key(), "items/abc.jpg");
    }
}
