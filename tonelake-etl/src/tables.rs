//! The output table contract.
//!
//! Five tables under the output root; partition columns become hive-style
//! path segments and the path suffixes match the layout downstream readers
//! expect.

/// One output table: name, path under the output root, partition columns.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub path: &'static str,
    pub partition_by: &'static [&'static str],
}

pub const SONGS: TableSpec = TableSpec {
    name: "songs",
    path: "songs/songs_table.parquet",
    partition_by: &["year", "artist_id"],
};

pub const ARTISTS: TableSpec = TableSpec {
    name: "artists",
    path: "artists/artists_table.parquet",
    partition_by: &[],
};

pub const USERS: TableSpec = TableSpec {
    name: "users",
    path: "users/users_table.parquet",
    partition_by: &[],
};

pub const TIME: TableSpec = TableSpec {
    name: "time",
    path: "time/time_table.parquet",
    partition_by: &["year", "month"],
};

pub const SONGPLAYS: TableSpec = TableSpec {
    name: "songplays",
    path: "songplays/songplays_table.parquet",
    partition_by: &["year", "month"],
};

/// Song catalog discovery pattern: three directory levels then the track file.
pub const SONG_DATA_GLOB: &str = "song_data/*/*/*/*.json";

/// Activity log discovery pattern, fixed to the configured year/month
/// partition of the feed.
pub const LOG_DATA_GLOB: &str = "log_data/2018/11/*.json";
