pub mod access;
pub mod cursor;
pub mod params;
pub mod stream;
pub mod zone;

pub use cursor::{Cursor, CursorState};
pub use cursor_core::error::{CursorError, FetchError};
