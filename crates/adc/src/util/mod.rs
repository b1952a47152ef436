pub mod context;
pub mod format;
