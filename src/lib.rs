pub mod cache;
pub mod calc;
pub mod output;
pub mod pipeline;
pub mod schema;
pub mod settings;
pub mod table;
