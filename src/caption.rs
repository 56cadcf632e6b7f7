//! Caption model interface used by downstream evaluation tools.
//!
//! No model ships with this crate; implementors wrap one and
//! [`CleanedCaptioner`] normalizes whatever it returns.

use std::path::Path;

/// Returned when every generated caption is empty after cleaning.
pub const FALLBACK_CAPTION: &str = "Unknown.";

/// Produces candidate captions for an image file.
pub trait Captioner {
    fn caption(&self, image: &Path) -> anyhow::Result<Vec<String>>;
}

/// Strip non-ASCII characters, trim whitespace and drop empty entries.
///
/// Never returns an empty list.
pub fn clean_captions<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let cleaned: Vec<String> = raw
        .into_iter()
        .map(|text| {
            text.as_ref()
                .chars()
                .filter(char::is_ascii)
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|text| !text.is_empty())
        .collect();

    if cleaned.is_empty() {
        vec![FALLBACK_CAPTION.to_string()]
    } else {
        cleaned
    }
}

/// Applies [`clean_captions`] to another captioner's output.
pub struct CleanedCaptioner<C> {
    inner: C,
}

impl<C: Captioner> CleanedCaptioner<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Captioner> Captioner for CleanedCaptioner<C> {
    fn caption(&self, image: &Path) -> anyhow::Result<Vec<String>> {
        let raw = self.inner.caption(image)?;
        Ok(clean_captions(raw))
    }
}
