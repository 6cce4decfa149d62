//! Session files and history export

mod csv_export;
mod session_store;

pub use csv_export::{write_csv, CsvExporter};
pub use session_store::{SessionSnapshot, SessionStore};
