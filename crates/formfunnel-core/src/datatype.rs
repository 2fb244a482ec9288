use serde_json::Value;

/// The kind of JSON value a column accepts, derived from its declared
/// storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    Text,
    Number,
    Undetermined,
}

impl ExpectedType {
    /// Classifies a SQLite datatype declaration by substring. `TEXT` without
    /// `INTEGER` is text, `INTEGER` without `TEXT` is numeric, anything else
    /// (both or neither) is undetermined. Matching is case-sensitive, so
    /// `text` or `VARCHAR` are undetermined too.
    pub fn from_datatype(datatype: &str) -> Self {
        let text = datatype.contains("TEXT");
        let integer = datatype.contains("INTEGER");
        match (text, integer) {
            (true, false) => ExpectedType::Text,
            (false, true) => ExpectedType::Number,
            _ => ExpectedType::Undetermined,
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            ExpectedType::Text => value.is_string(),
            ExpectedType::Number => value.is_number(),
            ExpectedType::Undetermined => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExpectedType;
    use serde_json::json;

    #[test]
    fn classifies_declarations() {
        assert_eq!(ExpectedType::from_datatype("TEXT"), ExpectedType::Text);
        assert_eq!(ExpectedType::from_datatype("TEXT UNIQUE"), ExpectedType::Text);
        assert_eq!(ExpectedType::from_datatype("INTEGER"), ExpectedType::Number);
        assert_eq!(
            ExpectedType::from_datatype("INTEGER PRIMARY KEY"),
            ExpectedType::Number
        );
        assert_eq!(
            ExpectedType::from_datatype("TEXT INTEGER"),
            ExpectedType::Undetermined
        );
        assert_eq!(ExpectedType::from_datatype("REAL"), ExpectedType::Undetermined);
        assert_eq!(ExpectedType::from_datatype("text"), ExpectedType::Undetermined);
        assert_eq!(ExpectedType::from_datatype(""), ExpectedType::Undetermined);
    }

    #[test]
    fn repeated_marker_still_counts_once() {
        assert_eq!(ExpectedType::from_datatype("TEXT TEXT"), ExpectedType::Text);
    }

    #[test]
    fn json_kinds_against_expected_type() {
        assert!(ExpectedType::Text.matches(&json!("x")));
        assert!(!ExpectedType::Text.matches(&json!(1)));
        assert!(ExpectedType::Number.matches(&json!(1)));
        assert!(ExpectedType::Number.matches(&json!(1.5)));
        assert!(!ExpectedType::Number.matches(&json!("1")));
        assert!(!ExpectedType::Number.matches(&json!(null)));
        assert!(!ExpectedType::Text.matches(&json!(true)));
        assert!(!ExpectedType::Text.matches(&json!(["a"])));
        assert!(!ExpectedType::Undetermined.matches(&json!("x")));
    }
}
