//! Value patterns of query terms.

use regex::Regex;

use crate::error::QueryParseError;

#[derive(Debug, Clone)]
pub enum Pattern {
    /// `*`: any present value.
    Any,
    /// `~term`: partial similarity above the threshold. Stored lowercase.
    Fuzzy(String),
    /// Text containing `*`, matched like a shell glob, ignoring case.
    Glob(Regex),
    /// `[A TO B]`, inclusive. `None` when a bound is not a number; such a range matches nothing.
    Range(Option<(f64, f64)>),
    /// Case-insensitive equality. Stored lowercase.
    Exact(String),
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Pattern::Any, Pattern::Any) => true,
            (Pattern::Fuzzy(a), Pattern::Fuzzy(b)) | (Pattern::Exact(a), Pattern::Exact(b)) => a == b,
            (Pattern::Glob(a), Pattern::Glob(b)) => a.as_str() == b.as_str(),
            (Pattern::Range(a), Pattern::Range(b)) => a == b,
            _ => false,
        }
    }
}

impl Pattern {
    /// Classify a value token. Precedence: `*`, `~`, glob, range, exact.
    pub fn compile(raw: &str, offset: usize) -> Result<Self, QueryParseError> {
        if raw == "*" {
            return Ok(Pattern::Any);
        }
        if let Some(term) = raw.strip_prefix('~') {
            return Ok(Pattern::Fuzzy(term.to_lowercase()));
        }
        if raw.contains('*') {
            let regex = Regex::new(&glob_to_regex(&raw.to_lowercase()))
                .map_err(|e| QueryParseError::new(offset, format!("bad wildcard '{raw}': {e}")))?;
            return Ok(Pattern::Glob(regex));
        }
        if raw.starts_with('[') && raw.contains(" TO ") {
            return Ok(Pattern::Range(parse_range(raw)));
        }
        Ok(Pattern::Exact(raw.to_lowercase()))
    }

    pub fn matches(&self, candidate: &str, fuzzy_threshold: u8) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Fuzzy(term) => {
                partial_ratio(&candidate.to_lowercase(), term) > f64::from(fuzzy_threshold)
            }
            Pattern::Glob(regex) => regex.is_match(&candidate.to_lowercase()),
            Pattern::Range(None) => false,
            Pattern::Range(Some((lo, hi))) => match candidate.trim().parse::<f64>() {
                Ok(v) => *lo <= v && v <= *hi,
                Err(_) => false,
            },
            Pattern::Exact(text) => candidate.to_lowercase() == *text,
        }
    }
}

fn parse_range(raw: &str) -> Option<(f64, f64)> {
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    let (lo, hi) = inner.split_once(" TO ")?;
    Some((lo.trim().parse().ok()?, hi.trim().parse().ok()?))
}

/// Translate a shell glob into an anchored regex: `*` any run, `?` one char,
/// `[...]` / `[!...]` character classes.
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match chars[i + 1..].iter().position(|&c| c == ']') {
                Some(rel) if rel > 0 => {
                    let class: String = chars[i + 1..i + 1 + rel].iter().collect();
                    out.push('[');
                    let body = match class.strip_prefix('!') {
                        Some(negated) => {
                            out.push('^');
                            negated.to_string()
                        }
                        None => class,
                    };
                    out.push_str(&body.replace('\\', "\\\\").replace('[', "\\["));
                    out.push(']');
                    i += rel + 1;
                }
                _ => out.push_str("\\["),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    out
}

/// Length of the longest common subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized indel similarity, 0..=100.
fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// Best similarity of the shorter string against any equally long window of
/// the longer one (windows may hang over either end), 0..=100.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }
    let n = short.len();
    let mut best: f64 = 0.0;
    for end in 1..long.len() + n {
        let start = end.saturating_sub(n);
        let window = &long[start..end.min(long.len())];
        best = best.max(ratio(&short, window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_of_token_forms() {
        assert_eq!(Pattern::compile("*", 0).unwrap(), Pattern::Any);
        assert!(matches!(Pattern::compile("~*x*", 0).unwrap(), Pattern::Fuzzy(_)));
        assert!(matches!(Pattern::compile("[0 TO *]", 0).unwrap(), Pattern::Glob(_)));
        assert_eq!(
            Pattern::compile("[0 TO 3]", 0).unwrap(),
            Pattern::Range(Some((0.0, 3.0)))
        );
        assert_eq!(Pattern::compile("Foo", 0).unwrap(), Pattern::Exact("foo".into()));
    }

    #[test]
    fn glob_matching_ignores_case() {
        let p = Pattern::compile("*jump*", 0).unwrap();
        assert!(p.matches("DiveJump Selector", 80));
        assert!(!Pattern::compile("*Punch*", 0).unwrap().matches("DiveJump Selector", 80));
        let q = Pattern::compile("a?c*[!x]", 0).unwrap();
        assert!(q.matches("ABCdef", 80));
        assert!(!q.matches("abcdex", 80));
        assert!(Pattern::compile("1.5*", 0).unwrap().matches("1.50", 80));
        assert!(!Pattern::compile("1.5*", 0).unwrap().matches("1x50", 80));
    }

    #[test]
    fn range_requires_numbers() {
        let p = Pattern::compile("[0 TO 3]", 0).unwrap();
        assert!(p.matches("0", 80));
        assert!(p.matches("3.0", 80));
        assert!(!p.matches("3.5", 80));
        assert!(!p.matches("abc", 80));
        assert_eq!(Pattern::compile("[a TO 3]", 0).unwrap(), Pattern::Range(None));
        assert!(!Pattern::compile("[a TO 3]", 0).unwrap().matches("1", 80));
    }

    #[test]
    fn fuzzy_scores() {
        assert_eq!(partial_ratio("divejump selector", "jump"), 100.0);
        assert!(partial_ratio("divejump selector", "selectr") > 80.0);
        assert!(partial_ratio("divejump selector", "jmp") < 80.0);
        assert!(partial_ratio("divejump selector", "punch") < 80.0);
        assert_eq!(partial_ratio("", ""), 100.0);
        assert_eq!(partial_ratio("abc", ""), 0.0);
        let p = Pattern::compile("~SELECTR", 0).unwrap();
        assert!(p.matches("DiveJump Selector", 80));
        assert!(!p.matches("Test Generator", 80));
    }

    #[test]
    fn exact_is_case_insensitive() {
        let p = Pattern::compile("Test Generator", 0).unwrap();
        assert!(p.matches("test generator", 80));
        assert!(!p.matches("test generator 2", 80));
    }
}
