//! Choosing the catalogue file for the user's languages.
//!
//! Catalogues are installed next to each other as `<prefix>_<lang>.ts`, where `<lang>` is either a
//! bare language code (`cppcheck_sv.ts`) or language and region joined by an underscore
//! (`cppcheck_pt_BR.ts`).

use locale_config::LanguageRange;
use std::path::{Path, PathBuf};

// File name suffixes to try for one language range, most specific first.
fn candidates(range: &LanguageRange) -> Vec<String> {
    let tag: &str = range.as_ref();
    let mut res = Vec::new();
    if tag.is_empty() {
        return res;
    }
    let parts: Vec<&str> = tag.split('-').collect();
    if parts.len() > 1 {
        let region = parts[1..].iter()
            .find(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_alphabetic()));
        if let Some(region) = region {
            res.push(format!("{}_{}", parts[0], region.to_ascii_uppercase()));
        }
    }
    res.push(parts[0].to_owned());
    res
}

/// Find the catalogue for the first of `ranges` that has one.
///
/// For `sv-SE` this tries `<prefix>_sv_SE.ts` and then `<prefix>_sv.ts`. The invariant range is
/// skipped.
pub fn find_resource<'r, I>(dir: &Path, prefix: &str, ranges: I) -> Option<PathBuf>
    where I: IntoIterator<Item = LanguageRange<'r>>
{
    for range in ranges {
        let tag: &str = range.as_ref();
        for lang in candidates(&range) {
            let path = dir.join(format!("{}_{}.ts", prefix, lang));
            if path.is_file() {
                debug!("using catalogue {} for ‘{}’", path.display(), tag);
                return Some(path);
            }
            trace!("no catalogue {}", path.display());
        }
    }
    None
}
