// HOA Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod import;
pub mod log;
pub mod password;
pub mod repository;
pub mod signup;
pub mod summary;

// Re-export commonly used types
pub use db::{
    Event, NewTransaction, Transaction, TransactionType,
    filter_by_type, new_id,
};
pub use import::{
    RawAmount, RawImportRecord, ImportFormat,
    import_batch, import_batch_at, load_records, normalize_record,
};
pub use password::{
    PasswordRule, PasswordValidationResult, StrengthLabel,
    requirements, strength, validate,
};
pub use repository::{
    MemoryRepository, SqliteRepository, TransactionRepository,
};
pub use signup::{SignupError, SignupForm};
pub use summary::{CategoryTotal, FinancialSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
