pub mod batch_writer;
pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod records;
pub mod scoring;
pub mod slug;
pub mod store;
pub mod validation;
