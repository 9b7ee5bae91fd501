use tracing::debug;

use crate::Database;
use crate::config::{BackendKind, DbConfig};
use crate::driver::{Driver, MysqlDriver, SqliteDriver};
use crate::error::DbError;

/// Build an unconnected [`Database`] for `db_type`.
///
/// `"sql"` (any case) selects MySQL; any other value selects SQLite.
pub fn select_backend(db_type: &str, config: &DbConfig) -> Result<Database, DbError> {
    let kind = BackendKind::from_designator(db_type);
    let driver: Box<dyn Driver> = match kind {
        BackendKind::Networked => Box::new(MysqlDriver::from_config(config)?),
        BackendKind::Embedded => Box::new(SqliteDriver::from_config(config)?),
    };

    debug!("Selected {} backend for {:?}", kind, config);
    Ok(Database::new(driver))
}
