//! Activity Log Transform and Fact Assembly.
//!
//! From the raw activity log this produces the `users` and `time` dimension
//! tables and, joined against the song catalog, the `songplays` fact table.
//!
//! Only `page == "NextSong"` events represent actual plays; they are the sole
//! population for all three tables. Events that match no catalog entry cannot
//! be attributed to a song and silently drop out of the fact table.

use tonelake_core::Storage;
use tonelake_parquet::write_table;
use tonelake_tabular::{ops, Column, ColumnBatch, FieldInfo, FieldType};
use tracing::info;

use crate::error::Result;
use crate::event_time;
use crate::source;
use crate::tables::{LOG_DATA_GLOB, SONGPLAYS, TIME, USERS};

/// The play event page type.
const NEXT_SONG: &str = "NextSong";

/// Keep only play events.
pub fn filter_next_song(logs: &ColumnBatch) -> Result<ColumnBatch> {
    Ok(ops::filter_eq_str(logs, "page", NEXT_SONG)?)
}

/// `users` dimension: one row per `user_id`, last-seen attributes winning.
///
/// The dedup key is narrower than the row: a listener's `level` changes
/// between sessions, and only the final value survives.
pub fn build_users(plays: &ColumnBatch) -> Result<ColumnBatch> {
    let users = plays.select_as(&[
        ("userId", "user_id"),
        ("firstName", "first_name"),
        ("lastName", "last_name"),
        ("gender", "gender"),
        ("level", "level"),
    ])?;
    Ok(ops::dedup_by_keys(&users, &["user_id"])?)
}

/// Append the `timestamp` column: `ts` epoch milliseconds as an absolute
/// instant. Out-of-range values become nulls.
pub fn with_event_time(plays: &ColumnBatch) -> Result<ColumnBatch> {
    let ts = plays.require_column("ts")?;
    let values: Vec<Option<i64>> = plays
        .row_indices()
        .map(|i| ts.get_i64(i).filter(|&ms| event_time::from_epoch_ms(ms).is_some()))
        .collect();

    Ok(plays.append_column(
        FieldInfo::nullable("timestamp", FieldType::Timestamp),
        Column::Timestamp(values),
    )?)
}

/// `time` dimension: the distinct event instants decomposed into calendar
/// fields.
pub fn build_time(plays: &ColumnBatch) -> Result<ColumnBatch> {
    let ts = plays.require_column("timestamp")?;
    let n = plays.num_rows;

    let mut start_time = Vec::with_capacity(n);
    let mut hour = Vec::with_capacity(n);
    let mut day = Vec::with_capacity(n);
    let mut week = Vec::with_capacity(n);
    let mut month = Vec::with_capacity(n);
    let mut year = Vec::with_capacity(n);
    let mut weekday = Vec::with_capacity(n);

    for i in 0..n {
        let parts = ts.get_timestamp(i).and_then(event_time::decompose);
        start_time.push(ts.get_timestamp(i));
        hour.push(parts.map(|p| p.hour));
        day.push(parts.map(|p| p.day));
        week.push(parts.map(|p| p.week));
        month.push(parts.map(|p| p.month));
        year.push(parts.map(|p| p.year));
        weekday.push(parts.map(|p| p.weekday));
    }

    let schema = std::sync::Arc::new(tonelake_tabular::BatchSchema::new(vec![
        FieldInfo::nullable("start_time", FieldType::Timestamp),
        FieldInfo::nullable("hour", FieldType::Int64),
        FieldInfo::nullable("day", FieldType::Int64),
        FieldInfo::nullable("week", FieldType::Int64),
        FieldInfo::nullable("month", FieldType::Int64),
        FieldInfo::nullable("year", FieldType::Int64),
        FieldInfo::nullable("weekday", FieldType::Int64),
    ]));
    let batch = ColumnBatch::new(
        schema,
        vec![
            Column::Timestamp(start_time),
            Column::Int64(hour),
            Column::Int64(day),
            Column::Int64(week),
            Column::Int64(month),
            Column::Int64(year),
            Column::Int64(weekday),
        ],
    )?;

    Ok(ops::dedup(&batch))
}

/// Fact Assembly: join plays to the catalog, order chronologically, assign
/// the surrogate key, and shape the final column set.
pub fn build_songplays(plays: &ColumnBatch, catalog: &ColumnBatch) -> Result<ColumnBatch> {
    // Key and payload columns only; keeps join output free of name clashes
    let song_side = catalog.project(&["artist_name", "title", "duration", "song_id", "artist_id"])?;

    let joined = ops::inner_join(
        plays,
        &song_side,
        &[
            ("artist", "artist_name"),
            ("song", "title"),
            ("length", "duration"),
        ],
    )?;

    // Global chronological order, then 1-based numbering. The sort is stable,
    // so equal-ts rows keep their source order and re-runs agree.
    let ordered = ops::sort_by_i64(&joined, "ts")?;
    let numbered = ops::with_row_numbers(&ordered, "songplay_id")?;

    // Partition columns derive from the event instant, not the song's year
    let ts = numbered.require_column("timestamp")?;
    let mut year = Vec::with_capacity(numbered.num_rows);
    let mut month = Vec::with_capacity(numbered.num_rows);
    for i in numbered.row_indices() {
        let parts = ts.get_timestamp(i).and_then(event_time::decompose);
        year.push(parts.map(|p| p.year));
        month.push(parts.map(|p| p.month));
    }
    let numbered = numbered
        .append_column(FieldInfo::nullable("year", FieldType::Int64), Column::Int64(year))?
        .append_column(FieldInfo::nullable("month", FieldType::Int64), Column::Int64(month))?;

    Ok(numbered.select_as(&[
        ("songplay_id", "songplay_id"),
        ("timestamp", "start_time"),
        ("userId", "user_id"),
        ("level", "level"),
        ("song_id", "song_id"),
        ("artist_id", "artist_id"),
        ("sessionId", "session_id"),
        ("location", "location"),
        ("userAgent", "user_agent"),
        ("year", "year"),
        ("month", "month"),
    ])?)
}

/// Run the transform: read the log, write `users`, `time`, and `songplays`.
pub async fn run(input: &dyn Storage, output: &dyn Storage, catalog: &ColumnBatch) -> Result<()> {
    let logs = source::read_json_batch(input, LOG_DATA_GLOB).await?;
    let plays = filter_next_song(&logs)?;
    info!(
        records = logs.num_rows,
        plays = plays.num_rows,
        "Loaded activity log"
    );

    let users = build_users(&plays)?;
    write_table(output, USERS.path, &users, USERS.partition_by).await?;

    let plays = with_event_time(&plays)?;

    let time = build_time(&plays)?;
    write_table(output, TIME.path, &time, TIME.partition_by).await?;

    let songplays = build_songplays(&plays, catalog)?;
    info!(rows = songplays.num_rows, "Assembled songplays");
    write_table(output, SONGPLAYS.path, &songplays, SONGPLAYS.partition_by).await?;

    Ok(())
}
