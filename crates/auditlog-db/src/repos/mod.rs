pub mod log_entries;
pub mod m2m;
pub mod objects;
