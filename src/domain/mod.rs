pub mod decoder;
pub mod formula;
pub mod models;
pub mod modifier;
pub mod settings;
