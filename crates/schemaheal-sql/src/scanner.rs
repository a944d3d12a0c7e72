//! Source tree scanning
//!
//! Walks the application's source root, pulls SQL out of string literals and
//! `.sql` files, parses it and extracts column usages. Files are processed on
//! a dedicated rayon pool; a cancellation token is checked between files.

use crate::extractor::{self, INTERPOLATION_PLACEHOLDER};
use crate::literals::{self, CallArguments, HostLanguage, HostLiteral, MARKER};
use crate::parser::SqlParser;
use crate::statement::{SqlStatement, ValueContext};
use rayon::prelude::*;
use schemaheal_core::{Config, DialectConfig, Location, ScannerConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// First words that make a literal a SQL candidate
const SQL_KEYWORDS: &[&str] = &["SELECT", "INSERT", "UPDATE", "CREATE", "ALTER", "WITH"];

/// Scan failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("{path} is {size} bytes, over the {limit} byte limit")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("source root {0} does not exist")]
    MissingRoot(String),

    #[error("scan cancelled")]
    Cancelled,

    #[error("failed to start scan workers: {0}")]
    Pool(String),
}

/// Result of scanning a source tree
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    /// Statements ordered by location
    pub statements: Vec<SqlStatement>,

    /// Per-file failures; the scan continued past them
    pub errors: Vec<ScanError>,

    pub files_scanned: usize,

    /// Candidates that failed to parse
    pub skipped_candidates: usize,
}

/// Statements found in one file
#[derive(Debug, Clone, Default)]
pub struct FileScan {
    pub statements: Vec<SqlStatement>,
    pub skipped_candidates: usize,
}

/// Extracts SQL statements and column usages from a source tree
#[derive(Debug, Clone)]
pub struct SourceScanner {
    config: ScannerConfig,
    dialect: DialectConfig,
}

impl SourceScanner {
    pub fn new(config: ScannerConfig, dialect: DialectConfig) -> Self {
        Self { config, dialect }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.scanner.clone(), config.dialect.clone())
    }

    /// Scan every matching file under `root`
    #[tracing::instrument(skip(self, cancel), fields(root = %root.display()))]
    pub fn scan(&self, root: &Path, cancel: &CancellationToken) -> Result<ScanOutput, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::MissingRoot(root.display().to_string()));
        }

        let started = Instant::now();
        let (files, mut errors) = self.discover(root);

        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("schemaheal-scan-{i}"));
        if self.config.workers > 0 {
            builder = builder.num_threads(self.config.workers);
        }
        let pool = builder.build().map_err(|e| ScanError::Pool(e.to_string()))?;

        let results: Vec<Option<Result<FileScan, ScanError>>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.scan_file(root, path))
                })
                .collect()
        });

        if cancel.is_cancelled() {
            tracing::info!("scan cancelled");
            return Err(ScanError::Cancelled);
        }

        let mut output = ScanOutput::default();
        for result in results.into_iter().flatten() {
            match result {
                Ok(scan) => {
                    output.files_scanned += 1;
                    output.skipped_candidates += scan.skipped_candidates;
                    output.statements.extend(scan.statements);
                }
                Err(error) => {
                    tracing::warn!(%error, "skipping file");
                    errors.push(error);
                }
            }
        }

        output
            .statements
            .sort_by(|a, b| a.location.cmp(&b.location));
        output.errors = errors;

        tracing::info!(
            files = output.files_scanned,
            statements = output.statements.len(),
            skipped = output.skipped_candidates,
            errors = output.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );

        Ok(output)
    }

    /// Files to scan, plus walk errors
    pub fn discover(&self, root: &Path) -> (Vec<PathBuf>, Vec<ScanError>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();

        let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
            let excluded = entry.depth() > 0
                && entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| self.config.exclude_dirs.iter().any(|d| d == name))
                    .unwrap_or(false);
            !excluded
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    errors.push(ScanError::Read {
                        path: e.path().map(|p| p.display().to_string()).unwrap_or_default(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let wanted = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    self.config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
                        && HostLanguage::from_extension(ext).is_some()
                })
                .unwrap_or(false);

            if wanted {
                files.push(entry.into_path());
            }
        }

        files.sort();
        (files, errors)
    }

    fn scan_file(&self, root: &Path, path: &Path) -> Result<FileScan, ScanError> {
        let relative = relative_path(root, path);

        let metadata = std::fs::metadata(path).map_err(|e| ScanError::Read {
            path: relative.clone(),
            message: e.to_string(),
        })?;

        if metadata.len() > self.config.max_file_size {
            return Err(ScanError::TooLarge {
                path: relative,
                size: metadata.len(),
                limit: self.config.max_file_size,
            });
        }

        let bytes = std::fs::read(path).map_err(|e| ScanError::Read {
            path: relative.clone(),
            message: e.to_string(),
        })?;
        let content = String::from_utf8_lossy(&bytes);

        Ok(self.scan_source(&relative, &content))
    }

    /// Extract statements from one file's content.
    ///
    /// `path` is the file's path relative to the source root and selects the
    /// host language by extension.
    pub fn scan_source(&self, path: &str, content: &str) -> FileScan {
        let Some(language) = HostLanguage::from_path(Path::new(path)) else {
            return FileScan::default();
        };

        let parser = SqlParser::from_dialect(&self.dialect);
        let mut scan = FileScan::default();

        if language == HostLanguage::Sql {
            for (line, text) in split_sql_statements(content) {
                self.parse_candidate(&parser, &text, &HashMap::new(), Location::with_line(path, line), &mut scan);
            }
            return scan;
        }

        for literal in literals::extract_literals(content, language) {
            if !is_sql_candidate(&literal.text) {
                continue;
            }
            let (text, bindings) = normalize_placeholders(&literal);
            self.parse_candidate(&parser, &text, &bindings, Location::with_line(path, literal.line), &mut scan);
        }

        scan
    }

    fn parse_candidate(
        &self,
        parser: &SqlParser,
        text: &str,
        bindings: &HashMap<String, String>,
        location: Location,
        scan: &mut FileScan,
    ) {
        let parsed = match parser.parse(text, Some(&location)) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::debug!(%error, "skipping unparseable SQL candidate");
                scan.skipped_candidates += 1;
                return;
            }
        };

        for statement in &parsed.statements {
            let Some(extracted) = extractor::extract(statement) else {
                continue;
            };

            let tables: Vec<String> = extracted
                .tables
                .into_iter()
                .filter(|t| !self.config.is_table_ignored(t))
                .collect();
            if tables.is_empty() {
                continue;
            }

            let usages = extracted
                .usages
                .into_iter()
                .filter(|u| tables.contains(&u.table))
                .map(|mut usage| {
                    for value in &mut usage.values {
                        if let ValueContext::Parameter { placeholder, binding } = value {
                            *binding = bindings.get(placeholder.as_str()).cloned();
                        }
                    }
                    usage
                })
                .collect();

            scan.statements.push(SqlStatement {
                text: statement.to_string(),
                location: location.clone(),
                kind: extracted.kind,
                target_table: extracted.target_table.filter(|t| tables.contains(t)),
                tables,
                usages,
            });
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a literal's first word is a SQL statement keyword
pub fn is_sql_candidate(text: &str) -> bool {
    let first_word: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    SQL_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(&first_word))
}

/// Rewrite host placeholder styles into PostgreSQL placeholders.
///
/// `%%` becomes `%`; `%s`, `%d` and `?` become `$1..$n`; `%(name)s` and
/// `@name` become `:name`; interpolations become `:__iN`. Returns the rewritten text and
/// the host expression bound to each placeholder.
pub fn normalize_placeholders(literal: &HostLiteral) -> (String, HashMap<String, String>) {
    let args: &CallArguments = &literal.args;
    let chars: Vec<char> = literal.text.chars().collect();
    let mut out = String::with_capacity(literal.text.len());
    let mut bindings = HashMap::new();
    let mut quote: Option<char> = None;
    let mut next_positional = 0usize;
    let mut i = 0;

    let bind_positional = |bindings: &mut HashMap<String, String>, index: usize| {
        let placeholder = format!("${}", index);
        if let Some(expr) = args.positional.get(index - 1) {
            bindings.insert(placeholder.clone(), expr.clone());
        }
        placeholder
    };

    while i < chars.len() {
        let c = chars[i];

        // Interpolation markers are replaced everywhere, quoted or not
        if c == MARKER {
            let digits: String = chars[i + 1..].iter().take_while(|c| c.is_ascii_digit()).collect();
            let close = i + 1 + digits.len();
            if !digits.is_empty() && chars.get(close) == Some(&MARKER) {
                let placeholder = format!("{INTERPOLATION_PLACEHOLDER}{digits}");
                if let Some(expr) = digits.parse::<usize>().ok().and_then(|n| literal.interpolations.get(n)) {
                    bindings.insert(placeholder.clone(), expr.clone());
                }
                out.push_str(&placeholder);
                i = close + 1;
                continue;
            }
        }

        if c == '%' && chars.get(i + 1) == Some(&'%') {
            out.push('%');
            i += 2;
            continue;
        }

        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            out.push(c);
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '%' if matches!(next, Some('s') | Some('d')) => {
                next_positional += 1;
                out.push_str(&bind_positional(&mut bindings, next_positional));
                i += 2;
            }
            '%' if next == Some('(') => {
                let name: String = chars[i + 2..].iter().take_while(|c| **c != ')').collect();
                let end = i + 2 + name.len();
                if chars.get(end) == Some(&')') && matches!(chars.get(end + 1), Some('s') | Some('d')) {
                    let placeholder = format!(":{}", name);
                    if let Some(expr) = args.named.get(&name) {
                        bindings.insert(placeholder.clone(), expr.clone());
                    }
                    out.push_str(&placeholder);
                    i = end + 2;
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            '?' => {
                next_positional += 1;
                out.push_str(&bind_positional(&mut bindings, next_positional));
                i += 1;
            }
            '$' if next.map(|n| n.is_ascii_digit()).unwrap_or(false) => {
                let digits: String = chars[i + 1..].iter().take_while(|c| c.is_ascii_digit()).collect();
                if let Ok(index) = digits.parse::<usize>() {
                    if index > 0 {
                        bind_positional(&mut bindings, index);
                    }
                }
                out.push('$');
                out.push_str(&digits);
                i += 1 + digits.len();
            }
            ':' | '@' if next.map(|n| n.is_alphabetic() || n == '_').unwrap_or(false)
                && (i == 0 || chars[i - 1] != ':') =>
            {
                let name: String = chars[i + 1..]
                    .iter()
                    .take_while(|c| c.is_alphanumeric() || **c == '_')
                    .collect();
                let placeholder = format!(":{}", name);
                if let Some(expr) = args.named.get(&name) {
                    bindings.insert(placeholder.clone(), expr.clone());
                }
                out.push_str(&placeholder);
                i += 1 + name.len();
            }
            ':' if next == Some(':') => {
                out.push_str("::");
                i += 2;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    (out, bindings)
}

/// Split a `.sql` file into statements with their starting lines.
///
/// Semicolons inside quotes, comments and dollar-quoted bodies do not split.
pub fn split_sql_statements(content: &str) -> Vec<(usize, String)> {
    let chars: Vec<char> = content.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut start_line: Option<usize> = None;
    let mut line = 1;
    let mut i = 0;

    let mut flush = |current: &mut String, start_line: &mut Option<usize>| {
        let text = current.trim();
        if let Some(start) = start_line.take() {
            if !text.is_empty() {
                statements.push((start, text.to_string()));
            }
        }
        current.clear();
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if start_line.is_none() && !c.is_whitespace() {
            start_line = Some(line);
        }

        match c {
            '\'' | '"' => {
                let quote = c;
                current.push(c);
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    current.push(c);
                    if c == '\n' {
                        line += 1;
                    }
                    i += 1;
                    if c == quote {
                        break;
                    }
                }
                continue;
            }
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    current.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
                current.push_str("*/");
                i += 2;
                continue;
            }
            '$' => {
                let tag: String = chars[i + 1..]
                    .iter()
                    .take_while(|c| c.is_alphanumeric() || **c == '_')
                    .collect();
                let tag_end = i + 1 + tag.len();
                let opens = chars.get(tag_end) == Some(&'$') && !tag.starts_with(|c: char| c.is_ascii_digit());
                if opens {
                    let delimiter: Vec<char> = chars[i..=tag_end].to_vec();
                    current.extend(delimiter.iter());
                    i = tag_end + 1;
                    while i < chars.len() && !chars[i..].starts_with(&delimiter) {
                        if chars[i] == '\n' {
                            line += 1;
                        }
                        current.push(chars[i]);
                        i += 1;
                    }
                    if i < chars.len() {
                        current.extend(delimiter.iter());
                        i += delimiter.len();
                    }
                    continue;
                }
            }
            ';' => {
                flush(&mut current, &mut start_line);
                i += 1;
                continue;
            }
            '\n' => line += 1,
            _ => {}
        }

        current.push(c);
        i += 1;
    }

    flush(&mut current, &mut start_line);
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{AccessMode, Comparison, StatementKind};
    use pretty_assertions::assert_eq;

    fn scanner() -> SourceScanner {
        SourceScanner::new(ScannerConfig::default(), DialectConfig::Postgres)
    }

    fn literal(text: &str, args: CallArguments) -> HostLiteral {
        HostLiteral {
            text: text.to_string(),
            line: 1,
            interpolations: Vec::new(),
            args,
        }
    }

    #[test]
    fn candidates_are_keyword_anchored() {
        assert!(is_sql_candidate("  SELECT 1"));
        assert!(is_sql_candidate("with x as (select 1) select * from x"));
        assert!(!is_sql_candidate("DELETE FROM users"));
        assert!(!is_sql_candidate("Selected items"));
        assert!(!is_sql_candidate("hello"));
    }

    #[test]
    fn python_placeholders_are_numbered() {
        let args = CallArguments {
            positional: vec!["int(uid)".into(), "name".into()],
            ..Default::default()
        };
        let (text, bindings) = normalize_placeholders(&literal(
            "SELECT * FROM t WHERE a = %s AND b LIKE '%%x' AND c = %s AND d = '%%'",
            args,
        ));

        assert_eq!(text, "SELECT * FROM t WHERE a = $1 AND b LIKE '%x' AND c = $2 AND d = '%'");
        assert_eq!(bindings.get("$1").map(String::as_str), Some("int(uid)"));
        assert_eq!(bindings.get("$2").map(String::as_str), Some("name"));
    }

    #[test]
    fn named_placeholders_keep_names() {
        let mut args = CallArguments::default();
        args.named.insert("uid".into(), "42".into());
        args.named.insert("org".into(), "org_id".into());

        let (text, bindings) = normalize_placeholders(&literal(
            "SELECT * FROM t WHERE a = %(uid)s AND b = @org AND c::text = :uid",
            args,
        ));

        assert_eq!(text, "SELECT * FROM t WHERE a = :uid AND b = :org AND c::text = :uid");
        assert_eq!(bindings.get(":uid").map(String::as_str), Some("42"));
        assert_eq!(bindings.get(":org").map(String::as_str), Some("org_id"));
    }

    #[test]
    fn question_marks_and_interpolations() {
        let literal = HostLiteral {
            text: format!("SELECT * FROM t WHERE a = ? AND b = '{}'", literals::interpolation_marker(0)),
            line: 1,
            interpolations: vec!["user.name".into()],
            args: CallArguments {
                positional: vec!["7".into()],
                ..Default::default()
            },
        };

        let (text, bindings) = normalize_placeholders(&literal);
        assert_eq!(text, "SELECT * FROM t WHERE a = $1 AND b = ':__i0'");
        assert_eq!(bindings.get("$1").map(String::as_str), Some("7"));
        assert_eq!(bindings.get(":__i0").map(String::as_str), Some("user.name"));
    }

    #[test]
    fn scan_python_source_resolves_bindings() {
        let source = r#"
def load(uid):
    cur.execute("SELECT token FROM sessions WHERE user_id = %s", (int(uid),))
    log("Selecting sessions")
"#;
        let scan = scanner().scan_source("app/sessions.py", source);

        assert_eq!(scan.statements.len(), 1);
        let stmt = &scan.statements[0];
        assert_eq!(stmt.kind, StatementKind::Select);
        assert_eq!(stmt.location, Location::with_line("app/sessions.py", 3));

        let usage = stmt.usages.iter().find(|u| u.column == "user_id").unwrap();
        assert_eq!(usage.mode, AccessMode::Filter);
        assert_eq!(usage.comparison, Some(Comparison::Equality));
        assert_eq!(
            usage.values,
            vec![ValueContext::Parameter {
                placeholder: "$1".into(),
                binding: Some("int(uid)".into())
            }]
        );
    }

    #[test]
    fn unparseable_candidates_are_counted() {
        let scan = scanner().scan_source("app/views.py", r#"flash("Update failed: please retry")"#);
        assert!(scan.statements.is_empty());
        assert_eq!(scan.skipped_candidates, 1);
    }

    #[test]
    fn sql_files_are_split() {
        let content = "-- schema; notes\nCREATE TABLE a (id INT);\n\nINSERT INTO a (id) VALUES (1);\nCREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql;\n";
        let statements = split_sql_statements(content);

        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].0, 1);
        assert!(statements[0].1.ends_with("CREATE TABLE a (id INT)"));
        assert_eq!(statements[1], (4, "INSERT INTO a (id) VALUES (1)".to_string()));
        assert!(statements[2].1.contains("SELECT 1; $$"));
    }

    #[test]
    fn ignored_tables_are_dropped() {
        let config = ScannerConfig {
            ignore_tables: vec!["django_*".into()],
            ..Default::default()
        };
        let scanner = SourceScanner::new(config, DialectConfig::Postgres);
        let scan = scanner.scan_source(
            "app/db.py",
            r#"db.run("SELECT * FROM django_session"); db.run("SELECT * FROM users")"#,
        );

        assert_eq!(scan.statements.len(), 1);
        assert_eq!(scan.statements[0].tables, vec!["users".to_string()]);
    }
}
