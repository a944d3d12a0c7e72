//! Drift detection between the schema code expects and the live schema
//!
//! The inferred model comes from call sites, the snapshot from the catalog.
//! Every difference the engine knows how to heal becomes an [`Issue`]:
//! - Missing tables: referenced in code, absent from the snapshot
//! - Missing columns: used in code, absent from an existing table
//! - Type mismatches: a proposed specific type against a live text column
//! - Missing indexes: repeated equality filters on an unindexed column

use chrono::{DateTime, Utc};
use schemaheal_core::{
    ColumnSchema, Evidence, ExpectedColumn, InferenceConfig, Issue, IssueType, LogicalType,
    ScannerConfig, SchemaSnapshot, TableSchema,
};
use schemaheal_sql::{InferredColumn, InferredSchema, InferredTable};

/// Compares an inferred schema against a snapshot
#[derive(Debug, Clone)]
pub struct DriftDetector {
    min_evidence: usize,
    ignore: ScannerConfig,
}

impl DriftDetector {
    pub fn new(min_evidence: usize) -> Self {
        Self {
            min_evidence: min_evidence.max(1),
            ignore: ScannerConfig::default(),
        }
    }

    pub fn from_config(inference: &InferenceConfig, scanner: &ScannerConfig) -> Self {
        Self {
            min_evidence: inference.min_evidence.max(1),
            ignore: scanner.clone(),
        }
    }

    pub fn min_evidence(&self) -> usize {
        self.min_evidence
    }

    /// Detect all issues, ordered by table, type and column
    pub fn detect(&self, inferred: &InferredSchema, snapshot: &SchemaSnapshot, now: DateTime<Utc>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for table in inferred.tables.values() {
            if is_system_table(&table.name) || self.ignore.is_table_ignored(&table.name) {
                continue;
            }

            match snapshot.table(&table.name) {
                None => issues.push(self.missing_table(table, now)),
                Some(live) => issues.extend(self.compare_table(table, live, now)),
            }
        }

        issues.sort_by(|a, b| {
            (&a.table, a.issue_type.as_str(), &a.column).cmp(&(&b.table, b.issue_type.as_str(), &b.column))
        });

        tracing::debug!(issues = issues.len(), tables = inferred.tables.len(), "drift detected");
        issues
    }

    fn missing_table(&self, table: &InferredTable, now: DateTime<Utc>) -> Issue {
        // A table's own columns never produce separate MISSING_COLUMN issues
        let expected_columns = table
            .columns
            .values()
            .map(|column| ExpectedColumn {
                name: column.name.clone(),
                logical_type: column.declared_type(self.min_evidence).cloned(),
            })
            .collect();

        let evidence = Evidence::new(
            table.sites.len(),
            table.sites.iter().cloned(),
            format!("referenced by {} statement(s)", table.sites.len()),
        );

        Issue::new(IssueType::MissingTable, &table.name, None, evidence, now)
            .with_comparison("table", "missing")
            .with_expected_columns(expected_columns)
    }

    fn compare_table(&self, table: &InferredTable, live: &TableSchema, now: DateTime<Utc>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for column in table.columns.values() {
            match live.find_column(&column.name) {
                None => issues.push(self.missing_column(table, column, now)),
                Some(live_column) => {
                    if let Some(issue) = self.type_mismatch(table, column, live_column, now) {
                        issues.push(issue);
                    }
                    if let Some(issue) = self.missing_index(table, column, live, now) {
                        issues.push(issue);
                    }
                }
            }
        }

        issues
    }

    fn missing_column(&self, table: &InferredTable, column: &InferredColumn, now: DateTime<Utc>) -> Issue {
        let expected_type = column.declared_type(self.min_evidence).cloned();
        let evidence = Evidence::new(
            column.usage_sites.len(),
            column.usage_sites.iter().cloned(),
            format!("used at {} site(s)", column.usage_sites.len()),
        );

        let mut issue = Issue::new(IssueType::MissingColumn, &table.name, Some(column.name.clone()), evidence, now)
            .with_expected_type(expected_type.clone());
        issue.expected = Some(expected_type.unwrap_or(LogicalType::String).to_string());
        issue
    }

    fn type_mismatch(
        &self,
        table: &InferredTable,
        column: &InferredColumn,
        live: &ColumnSchema,
        now: DateTime<Utc>,
    ) -> Option<Issue> {
        let proposed = column.proposed_type(self.min_evidence)?;

        // Only a specific type against a text-family column is a mismatch we heal
        let mismatch = live.logical_type.is_text()
            && proposed.is_specific()
            && proposed.is_more_specific_than(&live.logical_type)
            && !proposed.is_compatible_with(&live.logical_type);
        if !mismatch {
            return None;
        }

        let sites: Vec<_> = column.supporting_sites().into_iter().cloned().collect();
        let evidence = Evidence::new(
            column.evidence_count,
            sites,
            format!("{} site(s) use {} values", column.evidence_count, proposed),
        );

        Some(
            Issue::new(IssueType::TypeMismatch, &table.name, Some(column.name.clone()), evidence, now)
                .with_comparison(proposed.to_string(), live.logical_type.to_string())
                .with_expected_type(Some(proposed.clone()))
                .with_actual_type(live.logical_type.clone()),
        )
    }

    fn missing_index(
        &self,
        table: &InferredTable,
        column: &InferredColumn,
        live: &TableSchema,
        now: DateTime<Utc>,
    ) -> Option<Issue> {
        let filters = column.filter_count();
        if filters < self.min_evidence || live.has_leading_index(&column.name) {
            return None;
        }

        let evidence = Evidence::new(
            filters,
            column.filter_sites.iter().cloned(),
            format!("filtered by equality at {} site(s)", filters),
        );

        Some(
            Issue::new(IssueType::MissingIndex, &table.name, Some(column.name.clone()), evidence, now)
                .with_comparison("index", "none"),
        )
    }
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(InferenceConfig::default().min_evidence)
    }
}

fn is_system_table(name: &str) -> bool {
    name.starts_with("pg_") || name == "information_schema" || name.starts_with("information_schema.")
}
