//! Song Catalog Transform.
//!
//! Reads the song-metadata tree and produces the `songs` and `artists`
//! dimension tables. Both are column projections of the raw catalog with
//! exact-duplicate rows removed; a record missing a projected field carries
//! nulls through.

use tonelake_core::Storage;
use tonelake_parquet::write_table;
use tonelake_tabular::{ops, ColumnBatch};
use tracing::info;

use crate::error::Result;
use crate::source;
use crate::tables::{ARTISTS, SONGS, SONG_DATA_GLOB};

/// `songs` dimension: one row per distinct (song_id, title, artist_id, year,
/// duration) tuple.
pub fn build_songs(catalog: &ColumnBatch) -> Result<ColumnBatch> {
    let projected = catalog.project(&["song_id", "title", "artist_id", "year", "duration"])?;
    Ok(ops::dedup(&projected))
}

/// `artists` dimension: one row per distinct artist attribute tuple.
pub fn build_artists(catalog: &ColumnBatch) -> Result<ColumnBatch> {
    let projected = catalog.project(&[
        "artist_id",
        "artist_name",
        "artist_location",
        "artist_latitude",
        "artist_longitude",
    ])?;
    Ok(ops::dedup(&projected))
}

/// Run the transform: read the catalog, write `songs` and `artists`.
///
/// Returns the raw catalog batch; fact assembly joins against it.
pub async fn run(input: &dyn Storage, output: &dyn Storage) -> Result<ColumnBatch> {
    let catalog = source::read_json_batch(input, SONG_DATA_GLOB).await?;
    info!(records = catalog.num_rows, "Loaded song catalog");

    let songs = build_songs(&catalog)?;
    write_table(output, SONGS.path, &songs, SONGS.partition_by).await?;

    let artists = build_artists(&catalog)?;
    write_table(output, ARTISTS.path, &artists, ARTISTS.partition_by).await?;

    Ok(catalog)
}
