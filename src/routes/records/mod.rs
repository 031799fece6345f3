mod handler;
mod model;

pub use handler::{create_record, delete_record, list_records, summarize_records};
