pub mod evaluation;
pub mod ingestion;
pub mod serving;
