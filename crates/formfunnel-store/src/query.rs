use formfunnel_core::{FormFunnelError, Slot, TableSchema};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl Operator {
    fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::LtEq => "<=",
            Operator::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    fn as_sql(self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Eq, value)
    }
}

/// Columns to read from the first row matching `condition` and any
/// `extra` conditions, applied left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub columns: Vec<String>,
    pub condition: Condition,
    pub extra: Vec<(Conjunction, Condition)>,
}

impl Selection {
    pub fn new<I, S>(columns: I, condition: Condition) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            condition,
            extra: Vec::new(),
        }
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.extra.push((Conjunction::And, condition));
        self
    }

    pub fn or(mut self, condition: Condition) -> Self {
        self.extra.push((Conjunction::Or, condition));
        self
    }

    pub(crate) fn conditions(&self) -> impl Iterator<Item = &Condition> {
        std::iter::once(&self.condition).chain(self.extra.iter().map(|(_, c)| c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub set: Vec<(String, Value)>,
    pub filter: Condition,
}

impl RowUpdate {
    pub fn new(filter: Condition) -> Self {
        Self {
            set: Vec::new(),
            filter,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRow {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl SelectedRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }
}

/// A value ready to be bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub(crate) fn from_json(value: &Value) -> Result<Self, FormFunnelError> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(SqlValue::Integer(i)),
                None => n.as_f64().map(SqlValue::Real).ok_or_else(|| {
                    FormFunnelError::Storage(format!("number out of range: {n}"))
                }),
            },
            other => Err(FormFunnelError::Storage(format!(
                "cannot store value {other}"
            ))),
        }
    }

    pub(crate) fn from_slot(slot: &Slot) -> Result<Self, FormFunnelError> {
        match slot {
            Slot::Present(value) => Self::from_json(value),
            Slot::Absent => Ok(SqlValue::Null),
        }
    }
}

pub(crate) fn check_identifier(name: &str) -> Result<&str, FormFunnelError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(FormFunnelError::Storage(format!("invalid identifier: {name:?}")))
    }
}

fn check_datatype(datatype: &str) -> Result<&str, FormFunnelError> {
    let valid = !datatype.trim().is_empty()
        && datatype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '(' | ')' | ','));
    if valid {
        Ok(datatype)
    } else {
        Err(FormFunnelError::Storage(format!("invalid datatype: {datatype:?}")))
    }
}

pub(crate) fn create_table_sql(schema: &TableSchema) -> Result<String, FormFunnelError> {
    let mut columns = Vec::with_capacity(schema.columns.len());
    for field in &schema.columns {
        columns.push(format!(
            "{} {}",
            check_identifier(&field.column)?,
            check_datatype(&field.datatype)?
        ));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {}({})",
        check_identifier(&schema.name)?,
        columns.join(", ")
    ))
}

pub(crate) fn insert_sql(table: &str, columns: &[String]) -> Result<String, FormFunnelError> {
    let names = columns
        .iter()
        .map(|c| check_identifier(c))
        .collect::<Result<Vec<_>, _>>()?;
    let placeholders = vec!["?"; names.len()];
    Ok(format!(
        "INSERT INTO {}({}) VALUES ({})",
        check_identifier(table)?,
        names.join(","),
        placeholders.join(",")
    ))
}

pub(crate) fn update_sql(table: &str, update: &RowUpdate) -> Result<String, FormFunnelError> {
    if update.set.is_empty() {
        return Err(FormFunnelError::Storage(format!(
            "update on {table} sets no columns"
        )));
    }
    let sets = update
        .set
        .iter()
        .map(|(column, _)| check_identifier(column).map(|c| format!("{c} = ?")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "UPDATE {} SET {} WHERE {} {} ?",
        check_identifier(table)?,
        sets.join(", "),
        check_identifier(&update.filter.column)?,
        update.filter.operator.as_sql()
    ))
}

pub(crate) fn select_sql(table: &str, selection: &Selection) -> Result<String, FormFunnelError> {
    if selection.columns.is_empty() {
        return Err(FormFunnelError::Storage(format!(
            "select on {table} names no columns"
        )));
    }
    let columns = selection
        .columns
        .iter()
        .map(|c| check_identifier(c))
        .collect::<Result<Vec<_>, _>>()?;
    let mut filter = format!(
        "{} {} ?",
        check_identifier(&selection.condition.column)?,
        selection.condition.operator.as_sql()
    );
    for (conjunction, condition) in &selection.extra {
        filter.push_str(&format!(
            " {} {} {} ?",
            conjunction.as_sql(),
            check_identifier(&condition.column)?,
            condition.operator.as_sql()
        ));
    }
    Ok(format!(
        "SELECT {} FROM {} WHERE {} LIMIT 1",
        columns.join(", "),
        check_identifier(table)?,
        filter
    ))
}
