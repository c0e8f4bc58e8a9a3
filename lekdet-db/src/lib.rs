pub mod db;
pub mod models;
pub mod slips;

pub use rusqlite;
