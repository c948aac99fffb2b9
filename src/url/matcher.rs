use crate::config::PatternEntry;
use regex::Regex;

/// How a plain pattern string from the config should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// `*` matches any run of characters, `?` a single one; anchored at both ends
    Wildcard,
    /// A regular expression, unanchored
    Regex,
}

/// A compiled path pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    kind: PatternKind,
    regex: Regex,
}

impl Pattern {
    /// Compiles a wildcard into an anchored regular expression
    pub fn wildcard(glob: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&wildcard_to_regex(glob))?;
        Ok(Self {
            raw: glob.to_string(),
            kind: PatternKind::Wildcard,
            regex,
        })
    }

    /// Compiles a regular expression as written
    pub fn regex(expr: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(expr)?;
        Ok(Self {
            raw: expr.to_string(),
            kind: PatternKind::Regex,
            regex,
        })
    }

    /// Compiles a config entry, reading a plain string as `plain`
    pub fn from_entry(entry: &PatternEntry, plain: PatternKind) -> Result<Self, regex::Error> {
        match entry {
            PatternEntry::Plain(s) => match plain {
                PatternKind::Wildcard => Self::wildcard(s),
                PatternKind::Regex => Self::regex(s),
            },
            PatternEntry::Regex { regex } => Self::regex(regex),
            PatternEntry::Glob { glob } => Self::wildcard(glob),
        }
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The pattern as it was written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }
}

/// Converts a wildcard into an anchored regular expression
///
/// Everything except `*` and `?` is matched literally.
///
/// # Examples
///
/// ```
/// use docsweep::url::wildcard_to_regex;
///
/// assert_eq!(wildcard_to_regex("/docs/*"), "^/docs/.*$");
/// assert_eq!(wildcard_to_regex("/v?.html"), r"^/v.\.html$");
/// ```
pub fn wildcard_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

/// Applies include/exclude rules to a path
///
/// # Rules
///
/// 1. Any exclude match rejects the path, whatever the include rules say
/// 2. With include rules present, at least one must match
/// 3. With no include rules, everything not excluded is accepted
pub fn matches_patterns(path: &str, include: &[Pattern], exclude: &[Pattern]) -> bool {
    if let Some(p) = exclude.iter().find(|p| p.is_match(path)) {
        tracing::trace!("Path {} excluded by {}", path, p.as_str());
        return false;
    }

    if include.is_empty() {
        return true;
    }

    include.iter().any(|p| p.is_match(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wild(s: &str) -> Pattern {
        Pattern::wildcard(s).unwrap()
    }

    fn re(s: &str) -> Pattern {
        Pattern::regex(s).unwrap()
    }

    #[test]
    fn test_wildcard_star() {
        let p = wild("/components/*");
        assert!(p.is_match("/components/button"));
        assert!(p.is_match("/components/forms/input"));
        assert!(!p.is_match("/guide/components/button"));
    }

    #[test]
    fn test_wildcard_is_anchored() {
        let p = wild("/components/");
        assert!(p.is_match("/components/"));
        assert!(!p.is_match("/guide/intro"));
        assert!(!p.is_match("/x/components/"));
    }

    #[test]
    fn test_wildcard_question_mark() {
        let p = wild("/v?/api");
        assert!(p.is_match("/v1/api"));
        assert!(p.is_match("/v2/api"));
        assert!(!p.is_match("/v10/api"));
    }

    #[test]
    fn test_wildcard_escapes_regex_metacharacters() {
        let p = wild("/file.html");
        assert!(p.is_match("/file.html"));
        assert!(!p.is_match("/fileXhtml"));

        let p = wild("/a+b/(x)");
        assert!(p.is_match("/a+b/(x)"));
    }

    #[test]
    fn test_regex_is_unanchored() {
        let p = re("/v1/");
        assert!(p.is_match("/v1/c"));
        assert!(p.is_match("/docs/v1/c"));
        assert!(!p.is_match("/v2/c"));
    }

    #[test]
    fn test_exclude_takes_precedence() {
        let include = vec![wild("/apis/*")];
        let exclude = vec![re("/apis/")];
        assert!(!matches_patterns("/apis/foo", &include, &exclude));
    }

    #[test]
    fn test_exclude_only_mode() {
        let exclude = vec![re("/apis/")];
        assert!(!matches_patterns("/apis/foo", &[], &exclude));
        assert!(matches_patterns("/guide/intro", &[], &exclude));
    }

    #[test]
    fn test_include_requires_a_match() {
        let include = vec![wild("/components/")];
        assert!(!matches_patterns("/guide/intro", &include, &[]));
    }

    #[test]
    fn test_any_include_suffices() {
        let include = vec![wild("/guide/*"), wild("/components/*")];
        assert!(matches_patterns("/components/card", &include, &[]));
        assert!(matches_patterns("/guide/intro", &include, &[]));
        assert!(!matches_patterns("/blog/post", &include, &[]));
    }

    #[test]
    fn test_no_rules_accepts_everything() {
        assert!(matches_patterns("/anything", &[], &[]));
    }

    #[test]
    fn test_from_entry_reads_plain_by_kind() {
        let entry = PatternEntry::Plain("/a/*".to_string());
        let as_glob = Pattern::from_entry(&entry, PatternKind::Wildcard).unwrap();
        assert_eq!(as_glob.kind(), PatternKind::Wildcard);
        assert!(as_glob.is_match("/a/b"));

        let as_regex = Pattern::from_entry(&entry, PatternKind::Regex).unwrap();
        assert_eq!(as_regex.kind(), PatternKind::Regex);
        assert!(as_regex.is_match("/a//"));
    }

    #[test]
    fn test_from_entry_explicit_forms() {
        let entry = PatternEntry::Glob {
            glob: "*.pdf".to_string(),
        };
        let p = Pattern::from_entry(&entry, PatternKind::Regex).unwrap();
        assert!(p.is_match("/files/manual.pdf"));

        let entry = PatternEntry::Regex {
            regex: r"^/v\d+/".to_string(),
        };
        let p = Pattern::from_entry(&entry, PatternKind::Wildcard).unwrap();
        assert!(p.is_match("/v3/index"));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(Pattern::regex("(unclosed").is_err());
    }
}
