//! CSS asset selection

use indexmap::IndexSet;
use regex::Regex;
use std::sync::LazyLock;

use crate::host::Chunk;

/// `.css`, optionally followed by a query string, at the end of the path.
/// Case folding is ASCII-only and the query stops at line terminators, as in
/// a non-unicode JavaScript regex.
static CSS_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u:\.css)(\?[^\n\r\u{2028}\u{2029}]*)?$").expect("CSS asset pattern is valid")
});

/// Whether `path` names a CSS asset.
pub fn is_css_asset(path: &str) -> bool {
    CSS_ASSET.is_match(path)
}

/// CSS paths among `paths`, in first-seen order, each at most once.
pub fn css_assets<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .filter(|path| is_css_asset(path.as_ref()))
        .map(|path| path.as_ref().to_string())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Every file of every chunk, in chunk order. Chunks without a file list
/// contribute nothing.
pub fn chunk_files(chunks: &[Chunk]) -> impl Iterator<Item = &str> {
    chunks.iter().flat_map(|chunk| chunk.files()).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_css_suffix() {
        assert!(is_css_asset("a.css"));
        assert!(is_css_asset("static/css/app.8f2c1.css"));
        assert!(is_css_asset("A.CSS"));
        assert!(is_css_asset("c.css?v=2"));
        assert!(is_css_asset("c.Css?"));
    }

    #[test]
    fn test_rejects_lookalikes() {
        assert!(!is_css_asset("b.js"));
        assert!(!is_css_asset("a.cssx"));
        assert!(!is_css_asset("a.scss.map"));
        assert!(!is_css_asset("foo.css.bak"));
        assert!(!is_css_asset("foo.css.map"));
        assert!(!is_css_asset("css/app.js"));
        assert!(!is_css_asset("acss"));
        assert!(!is_css_asset("evil.c\u{17f}s"));
        assert!(!is_css_asset("a.css?v=1\nb.js"));
    }

    #[test]
    fn test_scss_suffix_matches_only_as_css() {
        // `.scss` ends in `css` but not `.css`
        assert!(!is_css_asset("theme.scss"));
    }

    #[test]
    fn test_css_assets_filters_and_dedupes() {
        let selected = css_assets(["a.css", "b.js", "c.css?v=2", "a.css"]);
        assert_eq!(selected, vec!["a.css".to_string(), "c.css?v=2".to_string()]);
    }

    #[test]
    fn test_chunk_files_flattens() {
        let chunks = vec![
            Chunk::new(["main.js", "main.css"]),
            Chunk::without_files(),
            Chunk::new(["vendor.css"]),
        ];
        let files: Vec<&str> = chunk_files(&chunks).collect();
        assert_eq!(files, vec!["main.js", "main.css", "vendor.css"]);
    }
}
