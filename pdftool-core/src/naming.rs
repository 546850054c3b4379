//! Download naming for transformed documents
//!
//! Client-supplied filenames never reach the filesystem. They are reduced to a
//! slugified stem plus a sanitized extension and only used to label the
//! download, e.g. `Quarterly Report (final).PDF` becomes
//! `encrypted_quarterly-report-final.PDF`.

/// Stem used when the declared filename slugifies to nothing
const FALLBACK_STEM: &str = "document";

/// Split a declared filename into `(stem, extension)`.
///
/// Directory components (either separator) are dropped first. The extension
/// keeps its leading dot and is reduced to ASCII alphanumerics; an extension
/// that sanitizes to nothing is treated as absent.
pub fn split_extension(declared: &str) -> (&str, String) {
    let base = declared
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(declared);

    match base.rfind('.') {
        Some(idx) => {
            let ext: String = base[idx + 1..]
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect();
            if ext.is_empty() {
                (&base[..idx], String::new())
            } else {
                (&base[..idx], format!(".{ext}"))
            }
        }
        None => (base, String::new()),
    }
}

/// Transliterate, lowercase and collapse non-alphanumerics to `-`
pub fn slugify_stem(stem: &str) -> String {
    let slug = slug::slugify(stem);
    if slug.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        slug
    }
}

/// Build `<prefix>_<slug><ext>` from a declared filename
pub fn output_filename(prefix: &str, declared: &str) -> String {
    let (stem, ext) = split_extension(declared);
    format!("{prefix}_{}{ext}", slugify_stem(stem))
}

/// Build a collision-free object store key `<uuid>-<slug><ext>`
pub fn object_key(declared: &str) -> String {
    let (stem, ext) = split_extension(declared);
    format!("{}-{}{ext}", uuid::Uuid::new_v4(), slugify_stem(stem))
}
