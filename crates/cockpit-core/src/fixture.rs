//! Producer schema fixture
//!
//! Builds the table layout the tracker's persistence framework creates, from
//! the same catalogue the core reads with. The core never runs this against a
//! real store; it exists for tests and for bootstrapping a scratch database.

use rusqlite::{Connection, params};

use crate::schema::{
    ENT_COLUMN, EntityKind, ID_COLUMN, OPT_COLUMN, PK_COLUMN, PRIMARY_KEY_TABLE, TIMESTAMP_COLUMN,
};

/// Tag the fixture registers for each kind. Deliberately not 1..=6 so tests
/// cannot pass by assuming positional tags.
pub fn entity_tag(kind: EntityKind) -> i64 {
    match kind {
        EntityKind::Activity => 3,
        EntityKind::ContextSnapshot => 5,
        EntityKind::Decision => 6,
        EntityKind::Insight => 8,
        EntityKind::AiInteraction => 2,
        EntityKind::ContentIndex => 4,
    }
}

/// Create `Z_PRIMARYKEY` plus every producer table, registering each kind.
pub fn create_primary_schema(conn: &Connection) -> rusqlite::Result<()> {
    create_metadata_table(conn)?;
    for kind in EntityKind::ALL {
        create_table(conn, kind)?;
        register_entity(conn, kind, entity_tag(kind))?;
    }
    Ok(())
}

pub fn create_metadata_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            Z_ENT INTEGER PRIMARY KEY,
            Z_NAME VARCHAR,
            Z_SUPER INTEGER,
            Z_MAX INTEGER
        );",
        PRIMARY_KEY_TABLE
    ))
}

/// Create one producer table with its housekeeping and mapped columns.
pub fn create_table(conn: &Connection, kind: EntityKind) -> rusqlite::Result<()> {
    let spec = kind.spec();
    let mut columns = vec![
        format!("{} INTEGER PRIMARY KEY", PK_COLUMN),
        format!("{} INTEGER", ENT_COLUMN),
        format!("{} INTEGER", OPT_COLUMN),
        format!("{} VARCHAR", ID_COLUMN),
        format!("{} TIMESTAMP", TIMESTAMP_COLUMN),
    ];
    columns.extend(
        spec.columns
            .iter()
            .map(|c| format!("{} {}", c.column, c.ty.sql_type())),
    );

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} ({columns});
         CREATE INDEX IF NOT EXISTS {table}_ZID_INDEX ON {table} ({id});
         CREATE INDEX IF NOT EXISTS {table}_ZTIMESTAMP_INDEX ON {table} ({ts});",
        table = spec.table,
        columns = columns.join(", "),
        id = ID_COLUMN,
        ts = TIMESTAMP_COLUMN,
    ))
}

pub fn register_entity(conn: &Connection, kind: EntityKind, tag: i64) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {} (Z_ENT, Z_NAME, Z_SUPER, Z_MAX) VALUES (?1, ?2, 0, 0)",
            PRIMARY_KEY_TABLE
        ),
        params![tag, kind.entity_name()],
    )?;
    Ok(())
}

pub fn unregister_entity(conn: &Connection, kind: EntityKind) -> rusqlite::Result<()> {
    conn.execute(
        &format!("DELETE FROM {} WHERE Z_NAME = ?1", PRIMARY_KEY_TABLE),
        params![kind.entity_name()],
    )?;
    Ok(())
}

pub fn drop_table(conn: &Connection, kind: EntityKind) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", kind.spec().table))
}
