#![allow(dead_code)]

use connectors::memory::MemoryFetcher;
use cursor_client::Cursor;
use cursor_config::settings::CursorSettings;
use std::sync::Arc;

#[cfg(test)]
pub mod scenarios;

/// Opens a cursor over `fetcher`, handing it the first `fetch_size` rows
/// the way a statement result would.
pub fn open_cursor(fetcher: &Arc<MemoryFetcher>, settings: &CursorSettings) -> Cursor {
    let initial = fetcher.initial_batch(settings.effective_fetch_size());
    let columns = fetcher.columns().to_vec();
    Cursor::open(fetcher.clone(), initial, columns, settings)
}

pub fn settings(fetch_size: usize) -> CursorSettings {
    CursorSettings::default().with_fetch_size(fetch_size)
}
