pub mod directory;
pub mod records;

pub use directory::PgDirectory;
pub use records::PgDataStore;
