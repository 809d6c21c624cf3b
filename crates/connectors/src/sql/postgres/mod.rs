pub mod fetcher;
pub mod row;
pub mod utils;
