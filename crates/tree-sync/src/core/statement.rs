//! Parameterized SQL statements.
//!
//! Only validated identifiers are rendered into the SQL text; every value
//! (prefixes, sentinels, partition bounds) is bound as a `$n` parameter.

use std::fmt;
use tokio_postgres::types::ToSql;

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Int(i32),
    Text(String),
}

impl SqlParam {
    /// Borrow as a `tokio_postgres` parameter.
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::Int(v) => v,
            SqlParam::Text(v) => v,
        }
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Int(v) => write!(f, "{}", v),
            SqlParam::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
        }
    }
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlParam>,
}

impl Statement {
    /// A statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    /// Parameters in the form `tokio_postgres` expects.
    pub fn bind(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(SqlParam::as_sql).collect()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .enumerate()
                .map(|(i, p)| format!("${} = {}", i + 1, p))
                .collect();
            write!(f, "\n-- params: {}", params.join(", "))?;
        }
        Ok(())
    }
}

/// Collects parameters while SQL text is assembled.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    params: Vec<SqlParam>,
}

impl StatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder.
    pub fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    pub fn bind_int(&mut self, value: i32) -> String {
        self.bind(SqlParam::Int(value))
    }

    pub fn bind_text(&mut self, value: impl Into<String>) -> String {
        self.bind(SqlParam::Text(value.into()))
    }

    pub fn finish(self, sql: impl Into<String>) -> Statement {
        Statement {
            sql: sql.into(),
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_numbers_placeholders_in_order() {
        let mut b = StatementBuilder::new();
        assert_eq!(b.bind_int(1990), "$1");
        assert_eq!(b.bind_text("osm_"), "$2");
        let st = b.finish("SELECT $1, $2");
        assert_eq!(
            st.params(),
            &[SqlParam::Int(1990), SqlParam::Text("osm_".into())]
        );
        assert_eq!(st.bind().len(), 2);
    }

    #[test]
    fn test_display_shows_params() {
        let mut b = StatementBuilder::new();
        let p = b.bind_text("it's");
        let st = b.finish(format!("SELECT {}", p));
        assert_eq!(st.to_string(), "SELECT $1\n-- params: $1 = 'it''s'");
        assert_eq!(Statement::new("SELECT 1").to_string(), "SELECT 1");
    }
}
