pub mod executor;
pub mod query;

pub use executor::{Database, Store};
pub use query::{Condition, Conjunction, Operator, RowUpdate, SelectedRow, Selection};

#[cfg(test)]
mod tests;
