use crate::catalog::TableSchema;
use crate::datatype::ExpectedType;
use crate::types::{ParsedRow, Payload, Slot};

/// Maps an untrusted payload onto the column order of `table`.
///
/// Each column is resolved on its own: protected columns, columns with an
/// undetermined datatype, keys missing from the payload and values of the
/// wrong JSON kind all become [`Slot::Absent`]. Accepted values are copied
/// unmodified. Payload keys that name no column are ignored.
pub fn parse_request_data(payload: &Payload, table: &TableSchema) -> ParsedRow {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|field| field.column.clone())
        .collect();
    let rows = table
        .columns
        .iter()
        .map(|field| {
            if table.is_protected(&field.column) {
                return Slot::Absent;
            }
            let expected = ExpectedType::from_datatype(&field.datatype);
            match payload.get(&field.column) {
                Some(value) if expected.matches(value) => Slot::Present(value.clone()),
                _ => Slot::Absent,
            }
        })
        .collect();
    ParsedRow { columns, rows }
}
