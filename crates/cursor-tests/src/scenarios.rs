use crate::{open_cursor, settings};
use chrono::{NaiveDate, TimeDelta};
use chrono_tz::Etc;
use connectors::memory::MemoryFetcher;
use cursor_client::{Cursor, CursorError, FetchError};
use cursor_config::settings::{CursorMode, CursorSettings};
use model::{
    core::{data_type::DataType, value::Value},
    records::{column::ColumnMeta, row::Row},
};
use std::{io::Write, sync::Arc, time::Duration};
use tracing_test::traced_test;

fn table(total: usize) -> Arc<MemoryFetcher> {
    Arc::new(MemoryFetcher::numbered(total))
}

fn id(cursor: &mut Cursor) -> i64 {
    cursor.get_long(1).unwrap()
}

#[traced_test]
#[tokio::test]
async fn mixed_scroll_reuses_cached_batches() {
    let fetcher = table(60);
    let mut cursor = open_cursor(&fetcher, &settings(10));

    for expected in 1..=45 {
        assert!(cursor.next().await.unwrap());
        assert_eq!(id(&mut cursor), expected);
    }
    for expected in (1..=44).rev() {
        assert!(cursor.previous().await.unwrap());
        assert_eq!(id(&mut cursor), expected);
    }

    assert_eq!(fetcher.forward_requests().await, vec![11, 21, 31, 41]);
    assert_eq!(fetcher.backward_requests().await, vec![20, 10]);

    assert!(cursor.absolute(50).await.unwrap());
    assert_eq!(id(&mut cursor), 50);
    assert_eq!(fetcher.forward_requests().await, vec![11, 21, 31, 41, 50]);
    assert_eq!(fetcher.backward_requests().await, vec![20, 10]);
}

#[tokio::test]
async fn absolute_with_known_last_row_skips_to_target_block() {
    let fetcher = Arc::new(MemoryFetcher::numbered(50).announce_last_row());
    let mut cursor = open_cursor(&fetcher, &settings(10));

    assert!(cursor.absolute(41).await.unwrap());
    assert_eq!(id(&mut cursor), 41);
    assert_eq!(fetcher.forward_requests().await, vec![41]);
}

#[tokio::test]
async fn negative_absolute_resolves_against_known_last_row() {
    let fetcher = Arc::new(MemoryFetcher::numbered(50).announce_last_row());
    let mut cursor = open_cursor(&fetcher, &settings(10));

    assert!(cursor.absolute(-10).await.unwrap());
    assert_eq!(cursor.row(), 41);
    assert_eq!(fetcher.requests().await.len(), 1);
}

#[tokio::test]
async fn negative_absolute_discovers_last_row() {
    let fetcher = table(35);
    let mut cursor = open_cursor(&fetcher, &settings(10));

    assert!(cursor.absolute(-1).await.unwrap());
    assert_eq!(id(&mut cursor), 35);
    assert_eq!(fetcher.forward_requests().await, vec![11, 21, 31]);
    assert!(cursor.is_last().await.unwrap());
}

#[tokio::test]
async fn relative_from_invalid_position_errors() {
    let fetcher = table(20);
    let mut cursor = open_cursor(&fetcher, &settings(10));

    assert!(matches!(
        cursor.relative(2).await,
        Err(CursorError::InvalidCursorPosition)
    ));
    assert!(cursor.is_before_first());
    assert_eq!(cursor.row(), 0);

    cursor.after_last().unwrap();
    assert!(matches!(
        cursor.relative(-2).await,
        Err(CursorError::InvalidCursorPosition)
    ));
    assert!(cursor.is_after_last());
    assert_eq!(cursor.row(), 0);
}

#[tokio::test]
async fn relative_out_of_range_returns_false() {
    let fetcher = table(7);
    let mut cursor = open_cursor(&fetcher, &settings(10));

    assert!(cursor.next().await.unwrap());
    assert!(!cursor.relative(-3).await.unwrap());
    assert_eq!(cursor.row(), 0);

    assert!(cursor.next().await.unwrap());
    assert!(!cursor.relative(7).await.unwrap());
    assert_eq!(cursor.row(), 0);
    assert!(fetcher.requests().await.is_empty());
}

#[tokio::test]
async fn forward_only_cursor_rejects_scrolling() {
    let fetcher = table(20);
    let settings = settings(10).with_mode(CursorMode::ForwardOnly);
    let mut cursor = open_cursor(&fetcher, &settings);

    let unsupported = |err: CursorError| matches!(err, CursorError::UnsupportedForForwardOnly { .. });
    assert!(unsupported(cursor.last().await.unwrap_err()));
    assert!(unsupported(cursor.after_last().unwrap_err()));
    assert!(unsupported(cursor.before_first().unwrap_err()));
    assert!(unsupported(cursor.first().await.unwrap_err()));
    assert!(unsupported(cursor.absolute(5).await.unwrap_err()));

    let fetcher = table(20);
    let mut scrollable = open_cursor(&fetcher, &crate::settings(10));
    assert!(scrollable.last().await.unwrap());
    scrollable.after_last().unwrap();
    scrollable.before_first().unwrap();
    assert!(scrollable.first().await.unwrap());
    assert!(scrollable.absolute(5).await.unwrap());
}

#[tokio::test]
async fn null_reads_track_was_null() {
    let columns = vec![
        ColumnMeta::new("note", DataType::VarChar),
        ColumnMeta::new("qty", DataType::Int),
    ];
    let rows = vec![Row::new(vec![Value::Null, Value::Int(3)])];
    let fetcher = Arc::new(MemoryFetcher::new(rows, columns));
    let mut cursor = open_cursor(&fetcher, &settings(10));
    assert!(cursor.next().await.unwrap());

    assert!(!cursor.get_boolean(1).unwrap());
    assert!(cursor.was_null());
    assert_eq!(cursor.get_short(1).unwrap(), 0);
    assert!(cursor.was_null());
    assert_eq!(cursor.get_int(1).unwrap(), 0);
    assert!(cursor.was_null());
    assert_eq!(cursor.get_long(1).unwrap(), 0);
    assert!(cursor.was_null());
    assert_eq!(cursor.get_float(1).unwrap(), 0.0);
    assert!(cursor.was_null());
    assert_eq!(cursor.get_double(1).unwrap(), 0.0);
    assert!(cursor.was_null());
    assert_eq!(cursor.get_string(1).unwrap(), None);
    assert!(cursor.was_null());

    assert_eq!(cursor.get_int(2).unwrap(), 3);
    assert!(!cursor.was_null());
}

#[tokio::test]
async fn reading_before_first_next_fails() {
    let fetcher = table(5);
    let mut cursor = open_cursor(&fetcher, &settings(10));

    let err = cursor.get_string(1).unwrap_err();
    assert!(matches!(err, CursorError::InvalidCursorPosition));
    assert!(err.to_string().contains("cursor is not on a valid row"));
}

#[tokio::test]
async fn timezone_round_trip() {
    let noon = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let columns = vec![ColumnMeta::new("at", DataType::Timestamp)];
    let rows = vec![Row::new(vec![Value::Timestamp(noon)])];
    let fetcher = Arc::new(MemoryFetcher::new(rows, columns));
    let settings = settings(10).with_time_zones(Etc::GMTPlus5, Etc::GMTPlus6);
    let mut cursor = open_cursor(&fetcher, &settings);
    assert!(cursor.next().await.unwrap());

    let shifted = cursor.get_timestamp(1).unwrap().unwrap();
    assert_eq!(noon - shifted, TimeDelta::hours(1));
    assert_eq!(cursor.get_timestamp_in(1, Etc::GMTPlus5).unwrap(), Some(noon));
}

#[tokio::test]
async fn close_is_idempotent() {
    let fetcher = table(30);
    let mut cursor = open_cursor(&fetcher, &settings(10));
    assert!(cursor.absolute(15).await.unwrap());

    cursor.close();
    cursor.close();
    assert!(cursor.is_closed());
    assert_eq!(cursor.row(), 0);
    assert!(!cursor.is_before_first());
    assert!(!cursor.is_after_last());
    assert!(cursor.cached_ranges().is_empty());
}

#[tokio::test]
async fn fetch_failure_keeps_position_and_can_be_retried() {
    let fetcher = table(30);
    let mut cursor = open_cursor(&fetcher, &settings(10));
    assert!(cursor.absolute(10).await.unwrap());

    fetcher
        .fail_next(FetchError::Server("relation dropped".into()))
        .await;
    let err = cursor.next().await.unwrap_err();
    assert_eq!(
        err.fetch_error(),
        Some(&FetchError::Server("relation dropped".into()))
    );
    assert_eq!(cursor.row(), 10);

    fetcher.fail_next(FetchError::Timeout).await;
    assert!(cursor.has_next().await.is_err());

    assert!(cursor.next().await.unwrap());
    assert_eq!(id(&mut cursor), 11);
}

#[tokio::test]
async fn has_next_fetch_is_reused_by_next() {
    let fetcher = table(30);
    let mut cursor = open_cursor(&fetcher, &settings(10));
    assert!(cursor.absolute(10).await.unwrap());

    assert!(cursor.has_next().await.unwrap());
    assert_eq!(cursor.row(), 10);
    assert!(cursor.next().await.unwrap());
    assert_eq!(fetcher.forward_requests().await, vec![11]);
}

#[traced_test]
#[tokio::test]
async fn query_timeout_cancels_pending_fetch() {
    let fetcher = Arc::new(MemoryFetcher::numbered(30).with_latency(Duration::from_millis(500)));
    let settings = settings(10).with_query_timeout(Duration::from_millis(20));
    let mut cursor = open_cursor(&fetcher, &settings);
    assert!(cursor.absolute(10).await.unwrap());

    let err = cursor.next().await.unwrap_err();
    assert!(matches!(err, CursorError::Cancelled { ref reason } if reason.contains("20ms")));
    assert_eq!(cursor.row(), 10);
    assert_eq!(cursor.cached_ranges(), vec![(1, 10)]);
    assert_eq!(fetcher.cancel_count(), 1);
}

#[tokio::test]
async fn cancel_handle_interrupts_navigation() {
    let fetcher = Arc::new(MemoryFetcher::numbered(30).with_latency(Duration::from_secs(5)));
    let mut cursor = open_cursor(&fetcher, &settings(10));
    assert!(cursor.absolute(10).await.unwrap());

    let handle = cursor.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    });

    assert!(matches!(
        cursor.next().await,
        Err(CursorError::Cancelled { .. })
    ));
    assert_eq!(cursor.row(), 10);
    assert_eq!(cursor.cached_ranges(), vec![(1, 10)]);
}

#[tokio::test]
async fn forward_only_prefetch_overlaps_consumption() {
    let fetcher = table(40);
    let settings = settings(10)
        .with_mode(CursorMode::ForwardOnly)
        .with_prefetch_threshold(3);
    let mut cursor = open_cursor(&fetcher, &settings);

    let mut count = 0;
    while cursor.next().await.unwrap() {
        count += 1;
        assert_eq!(id(&mut cursor), count);
    }
    assert_eq!(count, 40);
    assert_eq!(fetcher.forward_requests().await, vec![11, 21, 31]);
    assert_eq!(cursor.stats().prefetches, 3);
}

#[tokio::test]
async fn settings_file_drives_cursor() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "fetch_size": 4, "saved_batches": 2, "server_time_zone": "Etc/GMT+5" }}"#
    )
    .unwrap();
    let settings = CursorSettings::from_file(file.path()).unwrap();

    let fetcher = table(20);
    let mut cursor = open_cursor(&fetcher, &settings);
    assert_eq!(cursor.fetch_size(), 4);
    assert!(cursor.absolute(9).await.unwrap());
    assert!(cursor.absolute(13).await.unwrap());
    assert!(cursor.absolute(10).await.unwrap());
    assert_eq!(id(&mut cursor), 10);
    assert_eq!(fetcher.forward_requests().await, vec![9, 13]);
    assert_eq!(cursor.stats().evictions, 1);
}

#[tokio::test]
async fn extreme_offsets_land_outside_the_result() {
    let fetcher = table(30);
    let mut cursor = open_cursor(&fetcher, &settings(10));
    assert!(cursor.next().await.unwrap());

    assert!(!cursor.relative(i64::MAX).await.unwrap());
    assert!(cursor.is_after_last());
    assert!(cursor.previous().await.unwrap());
    assert_eq!(id(&mut cursor), 30);

    assert!(!cursor.absolute(i64::MAX).await.unwrap());
    assert!(cursor.is_after_last());
    assert!(cursor.absolute(3).await.unwrap());
    assert!(!cursor.relative(i64::MIN).await.unwrap());
    assert!(cursor.is_before_first());
}

#[tokio::test]
async fn zero_fetch_size_still_reads_every_row() {
    let fetcher = table(30);
    let settings = CursorSettings::default().with_fetch_size(0);
    assert!(settings.validate().is_err());
    let columns = fetcher.columns().to_vec();
    let mut cursor = Cursor::open(fetcher.clone(), fetcher.initial_batch(10), columns, &settings);
    assert_eq!(cursor.fetch_size(), 1);

    let mut count = 0;
    while cursor.next().await.unwrap() {
        count += 1;
        assert_eq!(id(&mut cursor), count);
    }
    assert_eq!(count, 30);
    assert!(fetcher.requests().await.iter().all(|r| r.fetch_size == 1));
}

#[tokio::test]
async fn discovery_skips_rows_already_seen() {
    let fetcher = table(60);
    let mut cursor = open_cursor(&fetcher, &settings(10));
    for _ in 0..45 {
        assert!(cursor.next().await.unwrap());
    }
    for _ in 0..30 {
        assert!(cursor.previous().await.unwrap());
    }
    assert_eq!(id(&mut cursor), 15);

    assert!(cursor.absolute(-1).await.unwrap());
    assert_eq!(id(&mut cursor), 60);
    assert_eq!(fetcher.forward_requests().await, vec![11, 21, 31, 41, 51]);
}
