//! Expected column types from code usage
//!
//! Every value observed against a column is classified into a candidate
//! type. Candidates are merged per column: text is the weakest signal, a
//! specific type supersedes it, and two incompatible specific types mark the
//! column as conflicted. A type is proposed only once enough distinct call
//! sites support it.

use crate::statement::{SqlStatement, ValueContext};
use regex::Regex;
use schemaheal_core::{InferenceConfig, Location, LogicalType, TypeConflict};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// Bounded text columns are never sized below this
pub const MIN_VARCHAR_LENGTH: u32 = 255;

/// Conflicts keep at most this many sample sites
const CONFLICT_SAMPLE_SITES: usize = 5;

static ISO_8601: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?$").ok()
});

static NUMERIC: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").ok());

/// Classifies values and merges them into per-column expectations
#[derive(Debug, Clone)]
pub struct TypeInferencer {
    min_evidence: usize,
}

impl TypeInferencer {
    pub fn new(min_evidence: usize) -> Self {
        Self { min_evidence }
    }

    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::new(config.min_evidence)
    }

    pub fn min_evidence(&self) -> usize {
        self.min_evidence
    }

    /// Build the inferred schema from every statement of a scan
    pub fn infer(&self, statements: &[SqlStatement]) -> InferredSchema {
        let mut schema = InferredSchema::default();

        for statement in statements {
            for table in &statement.tables {
                schema
                    .tables
                    .entry(table.clone())
                    .or_insert_with(|| InferredTable::new(table))
                    .sites
                    .insert(statement.location.clone());
            }

            for usage in &statement.usages {
                let table = schema
                    .tables
                    .entry(usage.table.clone())
                    .or_insert_with(|| InferredTable::new(&usage.table));
                table.sites.insert(statement.location.clone());

                let column = table
                    .columns
                    .entry(usage.column.clone())
                    .or_insert_with(|| InferredColumn::new(&usage.column));
                column.usage_sites.insert(statement.location.clone());
                if usage.is_point_filter() {
                    column.filter_sites.insert(statement.location.clone());
                }

                for value in &usage.values {
                    if let ValueContext::Declared { logical_type } = value {
                        column.declared.get_or_insert_with(|| logical_type.clone());
                    }
                    column.observe(self.classify(value), &statement.location);
                }
            }
        }

        tracing::debug!(
            tables = schema.tables.len(),
            conflicts = schema.conflicts().len(),
            "inferred schema"
        );

        schema
    }

    /// Candidate type for one observed value
    pub fn classify(&self, value: &ValueContext) -> LogicalType {
        match value {
            ValueContext::Number { text } => classify_number(text),
            ValueContext::QuotedString { text } => classify_text(text),
            ValueContext::Boolean => LogicalType::Bool,
            ValueContext::Null => LogicalType::Unknown,
            ValueContext::Parameter { binding, .. } => binding
                .as_deref()
                .map(classify_binding)
                .unwrap_or(LogicalType::Unknown),
            ValueContext::Function { name } => match name.as_str() {
                "NOW" | "CURRENT_TIMESTAMP" | "LOCALTIMESTAMP" | "CLOCK_TIMESTAMP" | "STATEMENT_TIMESTAMP"
                | "TRANSACTION_TIMESTAMP" => LogicalType::Timestamp,
                "CURRENT_DATE" => LogicalType::Date,
                "GEN_RANDOM_UUID" | "UUID_GENERATE_V4" => LogicalType::Uuid,
                _ => LogicalType::Unknown,
            },
            ValueContext::Declared { logical_type } => logical_type.clone(),
        }
    }
}

impl Default for TypeInferencer {
    fn default() -> Self {
        Self::from_config(&InferenceConfig::default())
    }
}

fn classify_number(text: &str) -> LogicalType {
    let digits = text.trim_start_matches(['-', '+']);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        LogicalType::Int
    } else if NUMERIC.as_ref().map(|re| re.is_match(text)).unwrap_or(false) {
        LogicalType::Float
    } else {
        LogicalType::Unknown
    }
}

fn classify_text(text: &str) -> LogicalType {
    let trimmed = text.trim();

    if ISO_8601.as_ref().map(|re| re.is_match(trimmed)).unwrap_or(false) {
        return LogicalType::Timestamp;
    }

    let json_shaped = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if json_shaped && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return LogicalType::Json;
    }

    let length = text.chars().count() as u32;
    if length <= MIN_VARCHAR_LENGTH {
        LogicalType::VarChar {
            length: Some(MIN_VARCHAR_LENGTH),
        }
    } else {
        LogicalType::String
    }
}

/// Candidate type for a host-side bind expression such as `int(user_id)`
fn classify_binding(binding: &str) -> LogicalType {
    let expr = binding.trim();
    let lowered = expr.to_lowercase();

    const INT_CALLS: &[&str] = &["int(", "parseint(", "number(", "integer.parseint(", "long.parselong(", "strconv.atoi("];
    const FLOAT_CALLS: &[&str] = &["float(", "parsefloat(", "double.parsedouble(", "decimal("];
    const TEXT_CALLS: &[&str] = &["str(", "string(", "string.valueof("];
    const BOOL_CALLS: &[&str] = &["bool(", "boolean("];
    const JSON_CALLS: &[&str] = &["json.dumps(", "json.stringify(", "serde_json::to_string(", "json_encode(", "json.marshal("];

    let calls = |prefixes: &[&str]| prefixes.iter().any(|p| lowered.starts_with(p));

    if calls(INT_CALLS) {
        LogicalType::Int
    } else if calls(FLOAT_CALLS) {
        LogicalType::Float
    } else if calls(BOOL_CALLS) {
        LogicalType::Bool
    } else if calls(JSON_CALLS) || expr.starts_with('{') {
        LogicalType::Json
    } else if lowered.contains("datetime") || lowered.starts_with("new date") || lowered.ends_with("now()") {
        LogicalType::Timestamp
    } else if calls(TEXT_CALLS) {
        LogicalType::String
    } else if matches!(expr, "true" | "True" | "false" | "False") {
        LogicalType::Bool
    } else if NUMERIC.as_ref().map(|re| re.is_match(expr)).unwrap_or(false) {
        classify_number(expr)
    } else if let Some(inner) = strip_quotes(expr) {
        classify_text(inner)
    } else {
        LogicalType::Unknown
    }
}

fn strip_quotes(expr: &str) -> Option<&str> {
    ['"', '\'', '`'].iter().find_map(|q| {
        expr.strip_prefix(*q)
            .and_then(|rest| rest.strip_suffix(*q))
    })
}

/// Expectations for one column
#[derive(Debug, Clone, PartialEq)]
pub struct InferredColumn {
    pub name: String,

    /// Best-known type; never regresses from specific to text
    pub best_type: LogicalType,

    /// Distinct call sites supporting `best_type`
    pub evidence_count: usize,

    pub usage_sites: BTreeSet<Location>,

    /// Sites filtering with equality or membership
    pub filter_sites: BTreeSet<Location>,

    pub conflict: bool,

    /// Specific types that disagreed with `best_type`
    pub conflicting: Vec<LogicalType>,

    /// First type stated by a cast or DDL in code
    pub declared: Option<LogicalType>,

    /// Every non-unknown candidate with its site
    pub candidates: Vec<(LogicalType, Location)>,
}

impl InferredColumn {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            best_type: LogicalType::Unknown,
            evidence_count: 0,
            usage_sites: BTreeSet::new(),
            filter_sites: BTreeSet::new(),
            conflict: false,
            conflicting: Vec::new(),
            declared: None,
            candidates: Vec::new(),
        }
    }

    /// Merge one candidate observed at `site`
    pub fn observe(&mut self, candidate: LogicalType, site: &Location) {
        if candidate == LogicalType::Unknown {
            return;
        }
        self.candidates.push((candidate.clone(), site.clone()));

        let best = &self.best_type;
        let merged = if *best == LogicalType::Unknown {
            Some(candidate)
        } else if best.is_text() && candidate.is_text() {
            Some(widen_text(best, &candidate))
        } else if best.is_text() {
            // Specific supersedes text
            Some(candidate)
        } else if candidate.is_text() {
            None
        } else if let Some(widened) = best.widen(&candidate) {
            Some(widened)
        } else if best.is_compatible_with(&candidate) {
            None
        } else {
            if !self.conflicting.contains(&candidate) {
                self.conflicting.push(candidate);
            }
            self.conflict = true;
            None
        };

        if let Some(merged) = merged {
            self.best_type = merged;
        }
        self.evidence_count = self.supporting_sites().len();
    }

    /// Distinct sites whose candidate agrees with `best_type`
    pub fn supporting_sites(&self) -> BTreeSet<&Location> {
        self.candidates
            .iter()
            .filter(|(candidate, _)| {
                if self.best_type.is_text() {
                    candidate.is_text()
                } else {
                    !candidate.is_text() && candidate.is_compatible_with(&self.best_type)
                }
            })
            .map(|(_, site)| site)
            .collect()
    }

    /// Type to propose, once enough sites agree and nothing conflicts
    pub fn proposed_type(&self, min_evidence: usize) -> Option<&LogicalType> {
        let proposable = !self.conflict
            && self.best_type != LogicalType::Unknown
            && self.evidence_count >= min_evidence;
        proposable.then_some(&self.best_type)
    }

    /// Type for a new column: the proposal when there is one, else what code declared
    pub fn declared_type(&self, min_evidence: usize) -> Option<&LogicalType> {
        self.proposed_type(min_evidence).or(self.declared.as_ref())
    }

    /// Equality or membership filters at distinct sites
    pub fn filter_count(&self) -> usize {
        self.filter_sites.len()
    }
}

fn widen_text(a: &LogicalType, b: &LogicalType) -> LogicalType {
    match (a, b) {
        (LogicalType::VarChar { length: Some(x) }, LogicalType::VarChar { length: Some(y) }) => LogicalType::VarChar {
            length: Some((*x).max(*y)),
        },
        _ => LogicalType::String,
    }
}

/// Expectations for one table
#[derive(Debug, Clone, PartialEq)]
pub struct InferredTable {
    pub name: String,

    /// Every site referencing the table
    pub sites: BTreeSet<Location>,

    pub columns: BTreeMap<String, InferredColumn>,
}

impl InferredTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sites: BTreeSet::new(),
            columns: BTreeMap::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&InferredColumn> {
        self.columns.get(name)
    }
}

/// What the application's code expects of the database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferredSchema {
    pub tables: BTreeMap<String, InferredTable>,
}

impl InferredSchema {
    pub fn table(&self, name: &str) -> Option<&InferredTable> {
        self.tables.get(name)
    }

    /// Conflicted columns, for manual review
    pub fn conflicts(&self) -> Vec<TypeConflict> {
        self.tables
            .values()
            .flat_map(|table| {
                table.columns.values().filter(|c| c.conflict).map(move |column| {
                    let mut candidates: Vec<String> = Vec::new();
                    for ty in std::iter::once(&column.best_type).chain(column.conflicting.iter()) {
                        let rendered = ty.to_string();
                        if !candidates.contains(&rendered) {
                            candidates.push(rendered);
                        }
                    }
                    TypeConflict {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        candidates,
                        sites: column.usage_sites.iter().take(CONFLICT_SAMPLE_SITES).cloned().collect(),
                    }
                })
            })
            .collect()
    }
}
