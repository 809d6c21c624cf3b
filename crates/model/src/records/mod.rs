pub mod batch;
pub mod column;
pub mod row;
