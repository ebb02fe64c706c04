//! Line-level SQL handling
//!
//! Everything here works on single-line `INSERT INTO <schema>.<table> (...)
//! VALUES (...)` statements. Anything else is treated as opaque text.

pub mod editor;
pub mod filter;
pub mod schema;
pub mod statement;
pub mod tokenizer;

pub use editor::remove_field_from_line;
pub use filter::RowFilter;
pub use schema::normalize_schema;
pub use statement::{is_insert_line, unquote, InsertStatement};
pub use tokenizer::split_sql_list;
