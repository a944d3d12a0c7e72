//! Table and column usage extraction
//!
//! Walks a parsed statement with a stack of name scopes:
//! - CTE names shadow tables and are never reported as physical tables
//! - table aliases resolve to the physical table they name
//! - subqueries and derived tables get their own scope
//! - an unqualified column is attributed only when exactly one table is in
//!   the innermost scope
//!
//! System catalogs (`pg_*`, `information_schema`) are skipped.

use crate::statement::{AccessMode, ColumnUsage, Comparison, StatementKind, ValueContext};
use schemaheal_core::LogicalType;
use sqlparser::ast::{
    AlterColumnOperation, AlterTableOperation, AssignmentTarget, BinaryOperator, ColumnDef,
    CreateIndex, CreateTable, Expr, FunctionArg, FunctionArgExpr, FunctionArguments,
    GroupByExpr, Ident, Insert, JoinConstraint, JoinOperator, ObjectName, Query, Select,
    SelectItem, SetExpr, Statement, TableFactor, TableWithJoins, UnaryOperator, Value,
};
use std::collections::HashSet;

/// Prefix of the placeholders the scanner substitutes for interpolations
pub const INTERPOLATION_PLACEHOLDER: &str = ":__i";

/// Tables and usages of one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedStatement {
    pub kind: StatementKind,
    pub target_table: Option<String>,
    pub tables: Vec<String>,
    pub usages: Vec<ColumnUsage>,
}

/// Extract table references and column usages.
///
/// Returns `None` for statement shapes outside SELECT / INSERT / UPDATE /
/// CREATE / ALTER, and for statements that only touch system catalogs.
pub fn extract(statement: &Statement) -> Option<ExtractedStatement> {
    let mut walker = Walker::default();

    let (kind, target_table) = match statement {
        Statement::Query(query) => {
            walker.query(query);
            (StatementKind::Select, None)
        }
        Statement::Insert(insert) => (StatementKind::Insert, Some(walker.insert(insert)?)),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            walker.push_scope();
            walker.register(table);
            let target = walker.single_physical_table()?;

            for assignment in assignments {
                let targets: Vec<&ObjectName> = match &assignment.target {
                    AssignmentTarget::ColumnName(name) => vec![name],
                    AssignmentTarget::Tuple(names) => names.iter().collect(),
                };
                for name in targets {
                    if let Some(column) = name.0.last() {
                        walker.usages.push(
                            ColumnUsage::new(&target, ident_name(column), AccessMode::Write)
                                .with_values(values_of(&assignment.value)),
                        );
                    }
                }
                walker.expr(&assignment.value, AccessMode::Read);
            }

            if let Some(selection) = selection {
                walker.expr(selection, AccessMode::Filter);
            }
            walker.pop_scope();
            (StatementKind::Update, Some(target))
        }
        Statement::CreateTable(create) => (StatementKind::Create, Some(walker.create_table(create)?)),
        Statement::CreateIndex(index) => (StatementKind::Create, Some(walker.create_index(index)?)),
        Statement::AlterTable { name, operations, .. } => {
            let table = table_name(name)?;
            walker.reference(&table);

            for operation in operations {
                match operation {
                    AlterTableOperation::AddColumn { column_def, .. } => {
                        walker.usages.push(declared_usage(&table, column_def));
                    }
                    AlterTableOperation::AlterColumn {
                        column_name,
                        op: AlterColumnOperation::SetDataType { data_type, .. },
                        ..
                    } => {
                        walker.usages.push(
                            ColumnUsage::new(&table, ident_name(column_name), AccessMode::Write)
                                .with_values(vec![declared(&data_type.to_string())]),
                        );
                    }
                    _ => {}
                }
            }
            (StatementKind::Alter, Some(table))
        }
        _ => return None,
    };

    if walker.tables.is_empty() {
        return None;
    }

    Some(ExtractedStatement {
        kind,
        target_table,
        tables: walker.tables,
        usages: walker.usages,
    })
}

/// A name visible in a scope
#[derive(Debug, Clone)]
struct Binding {
    /// Alias, or the table name when unaliased
    name: String,

    /// Physical table; `None` for CTEs, derived tables and system relations
    table: Option<String>,
}

#[derive(Default)]
struct Walker {
    ctes: Vec<HashSet<String>>,
    scopes: Vec<Vec<Binding>>,
    tables: Vec<String>,
    usages: Vec<ColumnUsage>,
}

impl Walker {
    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn reference(&mut self, table: &str) {
        if !self.tables.iter().any(|t| t == table) {
            self.tables.push(table.to_string());
        }
    }

    fn bind(&mut self, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(binding);
        }
    }

    fn is_cte(&self, name: &ObjectName) -> bool {
        match name.0.as_slice() {
            [single] => {
                let name = ident_name(single);
                self.ctes.iter().any(|frame| frame.contains(&name))
            }
            _ => false,
        }
    }

    /// The only binding of the innermost scope, if it is a physical table
    fn single_physical_table(&self) -> Option<String> {
        match self.scopes.last().map(Vec::as_slice) {
            Some([binding]) => binding.table.clone(),
            _ => None,
        }
    }

    fn query(&mut self, query: &Query) {
        let mut frame = HashSet::new();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                frame.insert(ident_name(&cte.alias.name));
            }
        }
        self.ctes.push(frame);

        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.query(&cte.query);
            }
        }
        self.set_expr(&query.body);

        self.ctes.pop();
    }

    fn set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => self.select(select),
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.set_expr(left);
                self.set_expr(right);
            }
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for value in row {
                        self.expr(value, AccessMode::Read);
                    }
                }
            }
            _ => {}
        }
    }

    fn select(&mut self, select: &Select) {
        self.push_scope();

        for from in &select.from {
            self.register(from);
        }
        for from in &select.from {
            self.join_conditions(from);
        }

        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.expr(expr, AccessMode::Read);
                }
                _ => {}
            }
        }

        if let Some(selection) = &select.selection {
            self.expr(selection, AccessMode::Filter);
        }

        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            for expr in exprs {
                self.expr(expr, AccessMode::Read);
            }
        }

        if let Some(having) = &select.having {
            self.expr(having, AccessMode::Read);
        }

        self.pop_scope();
    }

    /// Bind every relation of a FROM item into the current scope
    fn register(&mut self, from: &TableWithJoins) {
        self.register_factor(&from.relation);
        for join in &from.joins {
            self.register_factor(&join.relation);
        }
    }

    fn register_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let alias = alias.as_ref().map(|a| ident_name(&a.name));

                if self.is_cte(name) {
                    let cte = name.0.last().map(ident_name).unwrap_or_default();
                    self.bind(Binding {
                        name: alias.unwrap_or(cte),
                        table: None,
                    });
                    return;
                }

                match table_name(name) {
                    Some(table) => {
                        self.reference(&table);
                        self.bind(Binding {
                            name: alias.unwrap_or_else(|| table.clone()),
                            table: Some(table),
                        });
                    }
                    None => {
                        let raw = name.0.last().map(ident_name).unwrap_or_default();
                        self.bind(Binding {
                            name: alias.unwrap_or(raw),
                            table: None,
                        });
                    }
                }
            }
            TableFactor::Derived { subquery, alias, .. } => {
                self.query(subquery);
                self.bind(Binding {
                    name: alias.as_ref().map(|a| ident_name(&a.name)).unwrap_or_default(),
                    table: None,
                });
            }
            TableFactor::NestedJoin { table_with_joins, .. } => {
                self.register(table_with_joins);
                self.join_conditions(table_with_joins);
            }
            _ => {
                // Table functions and the like still occupy the scope
                self.bind(Binding {
                    name: String::new(),
                    table: None,
                });
            }
        }
    }

    fn join_conditions(&mut self, from: &TableWithJoins) {
        for join in &from.joins {
            if let Some(JoinConstraint::On(condition)) = join_constraint(&join.join_operator) {
                self.expr(condition, AccessMode::Filter);
            }
        }
    }

    fn insert(&mut self, insert: &Insert) -> Option<String> {
        let table = table_name(&insert.table_name)?;
        self.reference(&table);
        let columns: Vec<String> = insert.columns.iter().map(ident_name).collect();

        let values = insert.source.as_deref().and_then(|source| match source.body.as_ref() {
            SetExpr::Values(values) => Some(values),
            _ => None,
        });

        if let Some(values) = values {
            for row in &values.rows {
                for (position, value) in row.iter().enumerate() {
                    if let Some(column) = columns.get(position) {
                        self.usages.push(
                            ColumnUsage::new(&table, column, AccessMode::Write).with_values(values_of(value)),
                        );
                    }
                    self.expr(value, AccessMode::Read);
                }
            }
        } else {
            for column in &columns {
                self.usages.push(ColumnUsage::new(&table, column, AccessMode::Write));
            }
            if let Some(source) = &insert.source {
                self.query(source);
            }
        }

        Some(table)
    }

    fn create_table(&mut self, create: &CreateTable) -> Option<String> {
        let table = table_name(&create.name)?;
        self.reference(&table);
        for column in &create.columns {
            self.usages.push(declared_usage(&table, column));
        }
        Some(table)
    }

    fn create_index(&mut self, index: &CreateIndex) -> Option<String> {
        let table = table_name(&index.table_name)?;
        self.reference(&table);
        for column in &index.columns {
            if let Expr::Identifier(ident) = &column.expr {
                self.usages.push(ColumnUsage::new(&table, ident_name(ident), AccessMode::Read));
            }
        }
        Some(table)
    }

    /// Resolve a column reference to its physical table
    fn resolve(&self, expr: &Expr) -> Option<(String, String)> {
        match expr {
            Expr::Identifier(column) => {
                let table = self.single_physical_table()?;
                Some((table, ident_name(column)))
            }
            Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
                let column = ident_name(&parts[parts.len() - 1]);
                let qualifier = ident_name(&parts[parts.len() - 2]);

                self.scopes
                    .iter()
                    .rev()
                    .find_map(|scope| scope.iter().find(|b| b.name == qualifier))
                    .and_then(|binding| binding.table.clone())
                    .map(|table| (table, column))
            }
            Expr::Nested(inner) => self.resolve(inner),
            _ => None,
        }
    }

    fn record(&mut self, column: &Expr, mode: AccessMode, comparison: Option<Comparison>, values: Vec<ValueContext>) {
        if let Some((table, column)) = self.resolve(column) {
            let mut usage = ColumnUsage::new(table, column, mode).with_values(values);
            usage.comparison = comparison;
            self.usages.push(usage);
        }
    }

    fn expr(&mut self, expr: &Expr, mode: AccessMode) {
        match expr {
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) => self.record(expr, mode, None, Vec::new()),

            Expr::BinaryOp { left, op, right } => {
                let comparison = match op {
                    BinaryOperator::Eq => Some(Comparison::Equality),
                    BinaryOperator::Lt | BinaryOperator::LtEq | BinaryOperator::Gt | BinaryOperator::GtEq => {
                        Some(Comparison::Range)
                    }
                    _ => None,
                };

                let is_comparison = comparison.is_some() || matches!(op, BinaryOperator::NotEq);
                if is_comparison {
                    match (is_column(left), is_column(right)) {
                        (true, false) => {
                            self.record(left, mode, comparison, values_of(right));
                            self.expr(right, AccessMode::Read);
                        }
                        (false, true) => {
                            self.record(right, mode, comparison, values_of(left));
                            self.expr(left, AccessMode::Read);
                        }
                        (true, true) => {
                            self.record(left, mode, comparison, Vec::new());
                            self.record(right, mode, comparison, Vec::new());
                        }
                        (false, false) => {
                            self.expr(left, mode);
                            self.expr(right, mode);
                        }
                    }
                } else {
                    self.expr(left, mode);
                    self.expr(right, mode);
                }
            }

            Expr::InList { expr: column, list, .. } => {
                if is_column(column) {
                    let values = list.iter().flat_map(values_of).collect();
                    self.record(column, mode, Some(Comparison::Membership), values);
                } else {
                    self.expr(column, mode);
                }
                for item in list {
                    self.expr(item, AccessMode::Read);
                }
            }

            Expr::InSubquery { expr: column, subquery, .. } => {
                self.record(column, mode, Some(Comparison::Membership), Vec::new());
                self.query(subquery);
            }

            Expr::AnyOp { left, right, .. } => {
                self.record(left, mode, Some(Comparison::Membership), Vec::new());
                self.expr(right, AccessMode::Read);
            }

            Expr::Between { expr: column, low, high, .. } => {
                let values = values_of(low).into_iter().chain(values_of(high)).collect();
                self.record(column, mode, Some(Comparison::Range), values);
                self.expr(low, AccessMode::Read);
                self.expr(high, AccessMode::Read);
            }

            Expr::Like { expr: column, pattern, .. } | Expr::ILike { expr: column, pattern, .. } => {
                self.record(column, mode, Some(Comparison::Pattern), values_of(pattern));
                self.expr(pattern, AccessMode::Read);
            }

            Expr::IsNull(inner) | Expr::IsNotNull(inner) | Expr::Nested(inner) => self.expr(inner, mode),
            Expr::UnaryOp { expr: inner, .. } => self.expr(inner, mode),
            Expr::Cast { expr: inner, .. } => self.expr(inner, mode),

            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
                ..
            } => {
                if let Some(operand) = operand {
                    self.expr(operand, AccessMode::Read);
                }
                for condition in conditions {
                    self.expr(condition, AccessMode::Read);
                }
                for result in results {
                    self.expr(result, AccessMode::Read);
                }
                if let Some(else_result) = else_result {
                    self.expr(else_result, AccessMode::Read);
                }
            }

            Expr::Function(function) => match &function.args {
                FunctionArguments::List(list) => {
                    for arg in &list.args {
                        if let Some(arg) = function_arg_expr(arg) {
                            self.expr(arg, mode);
                        }
                    }
                }
                FunctionArguments::Subquery(query) => self.query(query),
                FunctionArguments::None => {}
            },

            Expr::Exists { subquery, .. } => self.query(subquery),
            Expr::Subquery(query) => self.query(query),

            Expr::Tuple(items) => {
                for item in items {
                    self.expr(item, mode);
                }
            }

            _ => {}
        }
    }
}

fn join_constraint(operator: &JoinOperator) -> Option<&JoinConstraint> {
    match operator {
        JoinOperator::Inner(constraint)
        | JoinOperator::LeftOuter(constraint)
        | JoinOperator::RightOuter(constraint)
        | JoinOperator::FullOuter(constraint)
        | JoinOperator::LeftSemi(constraint)
        | JoinOperator::RightSemi(constraint)
        | JoinOperator::LeftAnti(constraint)
        | JoinOperator::RightAnti(constraint) => Some(constraint),
        _ => None,
    }
}

fn function_arg_expr(arg: &FunctionArg) -> Option<&Expr> {
    let arg = match arg {
        FunctionArg::Unnamed(arg) => arg,
        FunctionArg::Named { arg, .. } => arg,
        _ => return None,
    };
    match arg {
        FunctionArgExpr::Expr(expr) => Some(expr),
        _ => None,
    }
}

fn is_column(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => true,
        Expr::Nested(inner) => is_column(inner),
        _ => false,
    }
}

/// Unquoted identifiers fold to lower case
fn ident_name(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

/// Physical table named by `name`, or `None` for system catalogs
fn table_name(name: &ObjectName) -> Option<String> {
    let parts = &name.0;
    let table = ident_name(parts.last()?);

    if parts.len() >= 2 {
        let schema = ident_name(&parts[parts.len() - 2]);
        if schema == "pg_catalog" || schema == "information_schema" {
            return None;
        }
    }

    if table.starts_with("pg_") || table == "information_schema" {
        return None;
    }

    Some(table)
}

fn declared(data_type: &str) -> ValueContext {
    ValueContext::Declared {
        logical_type: LogicalType::from_postgres(data_type),
    }
}

fn declared_usage(table: &str, column: &ColumnDef) -> ColumnUsage {
    ColumnUsage::new(table, ident_name(&column.name), AccessMode::Write)
        .with_values(vec![declared(&column.data_type.to_string())])
}

/// Classify the value side of a comparison or assignment
pub fn values_of(expr: &Expr) -> Vec<ValueContext> {
    match expr {
        Expr::Value(value) => match value {
            Value::Number(text, _) => vec![ValueContext::Number { text: text.clone() }],
            Value::SingleQuotedString(text) => vec![quoted(text)],
            Value::DollarQuotedString(dollar) => vec![quoted(&dollar.value)],
            Value::Boolean(_) => vec![ValueContext::Boolean],
            Value::Null => vec![ValueContext::Null],
            Value::Placeholder(placeholder) => vec![ValueContext::Parameter {
                placeholder: placeholder.clone(),
                binding: None,
            }],
            _ => Vec::new(),
        },
        Expr::Cast { expr: inner, data_type, .. } => match LogicalType::from_postgres(&data_type.to_string()) {
            LogicalType::Unknown => values_of(inner),
            logical_type => vec![ValueContext::Declared { logical_type }],
        },
        Expr::TypedString { data_type, .. } => vec![declared(&data_type.to_string())],
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => values_of(inner)
            .into_iter()
            .map(|value| match value {
                ValueContext::Number { text } => ValueContext::Number { text: format!("-{}", text) },
                other => other,
            })
            .collect(),
        Expr::UnaryOp { expr: inner, .. } | Expr::Nested(inner) => values_of(inner),
        Expr::Function(function) => vec![ValueContext::Function {
            name: function.name.to_string().to_uppercase(),
        }],
        _ => Vec::new(),
    }
}

/// A quoted interpolation placeholder is a bound value, not text
fn quoted(text: &str) -> ValueContext {
    let is_placeholder = text
        .strip_prefix(INTERPOLATION_PLACEHOLDER)
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);

    if is_placeholder {
        ValueContext::Parameter {
            placeholder: text.to_string(),
            binding: None,
        }
    } else {
        ValueContext::QuotedString { text: text.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;
    use pretty_assertions::assert_eq;

    fn extract_sql(sql: &str) -> ExtractedStatement {
        let parsed = SqlParser::postgres().parse(sql, None).unwrap();
        extract(parsed.first_statement().unwrap()).unwrap()
    }

    fn usage<'a>(stmt: &'a ExtractedStatement, table: &str, column: &str) -> Vec<&'a ColumnUsage> {
        stmt.usages.iter().filter(|u| u.table == table && u.column == column).collect()
    }

    #[test]
    fn select_with_alias_and_filters() {
        let stmt = extract_sql("SELECT s.token FROM sessions s WHERE s.user_id = $1 AND s.kind IN ('a', 'b')");

        assert_eq!(stmt.kind, StatementKind::Select);
        assert_eq!(stmt.tables, vec!["sessions".to_string()]);

        let user_id = usage(&stmt, "sessions", "user_id");
        assert_eq!(user_id.len(), 1);
        assert_eq!(user_id[0].mode, AccessMode::Filter);
        assert_eq!(user_id[0].comparison, Some(Comparison::Equality));
        assert_eq!(
            user_id[0].values,
            vec![ValueContext::Parameter {
                placeholder: "$1".into(),
                binding: None
            }]
        );

        let kind = usage(&stmt, "sessions", "kind");
        assert_eq!(kind[0].comparison, Some(Comparison::Membership));
        assert_eq!(kind[0].values.len(), 2);

        assert_eq!(usage(&stmt, "sessions", "token")[0].mode, AccessMode::Read);
    }

    #[test]
    fn ctes_are_not_tables() {
        let stmt = extract_sql(
            "WITH recent AS (SELECT id FROM orders WHERE created_at > NOW()) SELECT id FROM recent",
        );

        assert_eq!(stmt.tables, vec!["orders".to_string()]);
        let created = usage(&stmt, "orders", "created_at");
        assert_eq!(created[0].comparison, Some(Comparison::Range));
        assert_eq!(created[0].values, vec![ValueContext::Function { name: "NOW".into() }]);
        assert!(stmt.usages.iter().all(|u| u.table != "recent"));
    }

    #[test]
    fn unqualified_columns_need_a_single_table() {
        let stmt = extract_sql("SELECT name FROM users u JOIN orgs o ON u.org_id = o.id WHERE active = true");

        assert_eq!(stmt.tables, vec!["users".to_string(), "orgs".to_string()]);
        assert!(usage(&stmt, "users", "name").is_empty());
        assert!(usage(&stmt, "users", "active").is_empty());
        assert_eq!(usage(&stmt, "users", "org_id")[0].comparison, Some(Comparison::Equality));
        assert_eq!(usage(&stmt, "orgs", "id")[0].mode, AccessMode::Filter);
    }

    #[test]
    fn subqueries_get_their_own_scope() {
        let stmt = extract_sql(
            "SELECT email FROM users WHERE id IN (SELECT user_id FROM sessions WHERE expires_at < $1)",
        );

        assert_eq!(usage(&stmt, "users", "email").len(), 1);
        assert_eq!(usage(&stmt, "users", "id")[0].comparison, Some(Comparison::Membership));
        assert_eq!(usage(&stmt, "sessions", "user_id").len(), 1);
        assert_eq!(usage(&stmt, "sessions", "expires_at")[0].comparison, Some(Comparison::Range));
    }

    #[test]
    fn nested_case_expressions() {
        let stmt = extract_sql(
            "SELECT CASE WHEN (score > (SELECT AVG(score) FROM results)) THEN 'high' ELSE 'low' END FROM players",
        );
        assert_eq!(stmt.tables, vec!["players".to_string(), "results".to_string()]);
        assert_eq!(usage(&stmt, "players", "score").len(), 1);
        assert_eq!(usage(&stmt, "results", "score").len(), 1);
    }

    #[test]
    fn insert_values_zip_with_columns() {
        let stmt = extract_sql("INSERT INTO audit_log (action, actor_id, payload) VALUES ('login', 42, $1)");

        assert_eq!(stmt.kind, StatementKind::Insert);
        assert_eq!(stmt.target_table.as_deref(), Some("audit_log"));
        assert_eq!(
            usage(&stmt, "audit_log", "action")[0].values,
            vec![ValueContext::QuotedString { text: "login".into() }]
        );
        assert_eq!(
            usage(&stmt, "audit_log", "actor_id")[0].values,
            vec![ValueContext::Number { text: "42".into() }]
        );
        assert_eq!(usage(&stmt, "audit_log", "payload")[0].mode, AccessMode::Write);
    }

    #[test]
    fn update_assignments_and_filter() {
        let stmt = extract_sql("UPDATE users SET last_login = NOW(), visits = visits + 1 WHERE id = $1");

        assert_eq!(stmt.kind, StatementKind::Update);
        let last_login = usage(&stmt, "users", "last_login");
        assert_eq!(last_login[0].mode, AccessMode::Write);
        assert_eq!(last_login[0].values, vec![ValueContext::Function { name: "NOW".into() }]);
        assert!(usage(&stmt, "users", "visits").iter().any(|u| u.mode == AccessMode::Read));
        assert_eq!(usage(&stmt, "users", "id")[0].mode, AccessMode::Filter);
    }

    #[test]
    fn ddl_declares_types() {
        let stmt = extract_sql("CREATE TABLE IF NOT EXISTS events (id BIGSERIAL PRIMARY KEY, body JSONB, occurred_at TIMESTAMPTZ)");
        assert_eq!(stmt.kind, StatementKind::Create);
        assert_eq!(
            usage(&stmt, "events", "body")[0].values,
            vec![ValueContext::Declared { logical_type: LogicalType::Json }]
        );

        let stmt = extract_sql("ALTER TABLE events ADD COLUMN source VARCHAR(64)");
        assert_eq!(stmt.kind, StatementKind::Alter);
        assert_eq!(
            usage(&stmt, "events", "source")[0].values,
            vec![ValueContext::Declared { logical_type: LogicalType::VarChar { length: Some(64) } }]
        );
    }

    #[test]
    fn casts_declare_value_types() {
        let stmt = extract_sql("SELECT * FROM sessions WHERE user_id = $1::integer");
        assert_eq!(
            usage(&stmt, "sessions", "user_id")[0].values,
            vec![ValueContext::Declared { logical_type: LogicalType::Int }]
        );
    }

    #[test]
    fn quoted_interpolation_is_a_parameter() {
        let stmt = extract_sql("SELECT * FROM users WHERE name = ':__i0'");
        assert!(matches!(
            usage(&stmt, "users", "name")[0].values[0],
            ValueContext::Parameter { .. }
        ));
    }

    #[test]
    fn system_catalogs_are_skipped() {
        let parsed = SqlParser::postgres()
            .parse("SELECT relname FROM pg_class WHERE relkind = 'r'", None)
            .unwrap();
        assert!(extract(parsed.first_statement().unwrap()).is_none());

        let parsed = SqlParser::postgres()
            .parse("SELECT table_name FROM information_schema.tables", None)
            .unwrap();
        assert!(extract(parsed.first_statement().unwrap()).is_none());
    }

    #[test]
    fn quoted_identifiers_keep_case() {
        let stmt = extract_sql("SELECT \"userId\" FROM \"Accounts\"");
        assert_eq!(stmt.tables, vec!["Accounts".to_string()]);
        assert_eq!(usage(&stmt, "Accounts", "userId").len(), 1);
    }
}
