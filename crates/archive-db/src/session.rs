//! Scoped acquisition: connect on entry, commit and close on every exit.

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::Database;
use crate::error::DbError;

/// A connected [`Database`]. Dropping it commits and closes; call
/// [`Session::finish`] instead to see a commit or close error.
pub struct Session<'a> {
    db: &'a mut Database,
    open: bool,
}

impl Session<'_> {
    pub fn finish(mut self) -> Result<(), DbError> {
        self.open = false;
        self.db.close()
    }
}

impl Deref for Session<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        self.db
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.db.close() {
                warn!("Failed to close database session: {}", e);
            }
        }
    }
}

impl Database {
    pub fn session(&mut self) -> Result<Session<'_>, DbError> {
        self.connect()?;
        Ok(Session { db: self, open: true })
    }

    /// Connect, run `f`, then close no matter how `f` ended.
    /// An error from `f` takes precedence over one from closing.
    pub fn with_session<F, T, E>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Database) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut session = self.session()?;
        let result = f(&mut *session);
        let closed = session.finish();

        let value = result?;
        closed?;
        Ok(value)
    }
}
