pub mod import;
pub mod score;
