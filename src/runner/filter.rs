use regex::Regex;

/// What the name filters decided for one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Run,
    /// Not matched by a non-empty `test` list.
    Filtered,
    /// Matched by the `skip` list. Skip wins over `test`.
    Skipped,
}

/// Name-based `test`/`skip` filters. Patterns are regular expressions; a
/// pattern that does not compile is matched literally.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    only: Vec<Regex>,
    skip: Vec<Regex>,
}

impl NameFilter {
    pub fn new(only: &[String], skip: &[String]) -> Self {
        Self {
            only: only.iter().map(|p| compile(p)).collect(),
            skip: skip.iter().map(|p| compile(p)).collect(),
        }
    }

    pub fn select(&self, name: &str) -> Selection {
        if self.skip.iter().any(|re| re.is_match(name)) {
            return Selection::Skipped;
        }
        if !self.only.is_empty() && !self.only.iter().any(|re| re.is_match(name)) {
            return Selection::Filtered;
        }
        Selection::Run
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|_| {
        // An escaped pattern always compiles.
        Regex::new(&regex::escape(pattern)).unwrap_or_else(|_| unreachable!())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_patterns_runs_everything() {
        let filter = NameFilter::default();
        assert_eq!(filter.select("anything"), Selection::Run);
    }

    #[test]
    fn only_list_restricts_to_matches() {
        let filter = NameFilter::new(&strings(&["foo"]), &[]);
        assert_eq!(filter.select("foo works"), Selection::Run);
        assert_eq!(filter.select("bar"), Selection::Filtered);
    }

    #[test]
    fn skip_takes_precedence_over_only() {
        let filter = NameFilter::new(&strings(&["foo"]), &strings(&["foo slow"]));
        assert_eq!(filter.select("foo slow"), Selection::Skipped);
        assert_eq!(filter.select("foo fast"), Selection::Run);
    }

    #[test]
    fn invalid_regex_matches_literally() {
        let filter = NameFilter::new(&strings(&["a(b"]), &[]);
        assert_eq!(filter.select("call a(b) here"), Selection::Run);
        assert_eq!(filter.select("ab"), Selection::Filtered);
    }
}
