use archive_db::{BackendKind, Database, DbConfig, DbError, NO_ARGS, select_backend};
use archive_types::{Channel, Member, Message, User};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Database {
    let path = dir.path().join("slack.sqlite");
    let db = select_backend("sqlite", &DbConfig::sqlite(path.to_string_lossy())).unwrap();
    assert_eq!(db.backend(), BackendKind::Embedded);
    db
}

fn count(db: &mut Database, sql: &str) -> i64 {
    db.query(sql, NO_ARGS).unwrap();
    db.fetch_one().unwrap().unwrap().get(0).unwrap()
}

fn user(id: &str, name: &str, avatar: &str) -> User {
    User {
        id: id.into(),
        name: name.into(),
        avatar: avatar.into(),
    }
}

fn member(channel: &str, user: &str) -> Member {
    Member {
        channel: channel.into(),
        user: user.into(),
    }
}

fn message(channel: &str, timestamp: &str, user: &str, text: &str) -> Message {
    Message {
        message: text.into(),
        user: user.into(),
        channel: channel.into(),
        timestamp: timestamp.into(),
    }
}

#[test]
fn migration_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    db.with_session(|db| {
        db.migrate_schema()?;
        db.migrate_schema()
    })
    .unwrap();

    db.with_session(|db| {
        db.migrate_schema()?;
        assert_eq!(db.table_columns("channels")?, ["name", "id", "is_private"]);
        assert_eq!(db.table_columns("users")?, ["name", "id", "avatar"]);
        assert_eq!(db.table_columns("members")?, ["channel", "user"]);
        assert_eq!(
            db.table_columns("messages")?,
            ["message", "user", "channel", "timestamp"]
        );
        let tables = count(
            db,
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('messages', 'users', 'channels', 'members')",
        );
        assert_eq!(tables, 4);
        Ok::<_, DbError>(())
    })
    .unwrap();
}

#[test]
fn users_are_replaced_by_id() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    let mut session = db.session().unwrap();
    session.migrate_schema().unwrap();

    session.insert_users(&[user("U1", "Alice", "a.png")]).unwrap();
    session.insert_users(&[user("U1", "Alicia", "b.png")]).unwrap();

    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM users WHERE id = 'U1'"), 1);
    session
        .query("SELECT name, avatar FROM users WHERE id = ?", ["U1"])
        .unwrap();
    let row = session.fetch_one().unwrap().unwrap();
    assert_eq!(row.get::<String>(0).unwrap(), "Alicia");
    assert_eq!(row.get::<String>(1).unwrap(), "b.png");
    session.finish().unwrap();
}

#[test]
fn messages_are_replaced_by_channel_and_timestamp() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    let mut session = db.session().unwrap();
    session.migrate_schema().unwrap();

    session
        .insert_messages(&[message("C1", "1700000000.000100", "U1", "first")])
        .unwrap();
    session
        .insert_messages(&[message("C1", "1700000000.000100", "U2", "second")])
        .unwrap();
    // Same timestamp in another channel is a different message.
    session
        .insert_messages(&[message("C2", "1700000000.000100", "U1", "elsewhere")])
        .unwrap();

    assert_eq!(
        count(
            &mut session,
            "SELECT COUNT(*) FROM messages WHERE channel = 'C1' AND timestamp = '1700000000.000100'"
        ),
        1
    );
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM messages"), 2);

    session
        .query("SELECT message, user FROM messages WHERE channel = ?", ["C1"])
        .unwrap();
    let row = session.fetch_one().unwrap().unwrap();
    assert_eq!(row.get::<String>(0).unwrap(), "second");
    assert_eq!(row.get::<String>(1).unwrap(), "U2");
}

#[test]
fn duplicate_members_are_kept() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    let mut session = db.session().unwrap();
    session.migrate_schema().unwrap();

    session
        .insert_members(&[member("C1", "U1"), member("C1", "U1")])
        .unwrap();
    assert_eq!(
        count(&mut session, "SELECT COUNT(*) FROM members WHERE channel = 'C1' AND user = 'U1'"),
        2
    );
}

#[test]
fn closed_session_rejects_operations_and_keeps_writes() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    db.with_session(|db| {
        db.migrate_schema()?;
        db.insert_channel("C1", "general", false)
    })
    .unwrap();

    assert!(!db.is_connected());
    assert!(matches!(
        db.insert_channel("C2", "random", false),
        Err(DbError::NotConnected)
    ));
    assert!(matches!(db.query("SELECT 1", NO_ARGS), Err(DbError::NotConnected)));
    assert!(matches!(db.fetch_many(1), Err(DbError::NotConnected)));

    // Committed on close, so a fresh session sees it.
    let mut reopened = open(&dir);
    let mut session = reopened.session().unwrap();
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM channels"), 1);
}

#[test]
fn failed_session_still_closes() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    let result = db.with_session(|db| {
        db.migrate_schema()?;
        db.execute("INSERT INTO no_such_table VALUES (1)", NO_ARGS)
    });
    assert!(matches!(result, Err(DbError::Sqlite(_))));
    assert!(!db.is_connected());
    assert!(matches!(db.fetch_one(), Err(DbError::NotConnected)));
}

#[test]
fn end_to_end_general_channel() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    let rows = db
        .with_session(|db| {
            db.migrate_schema()?;
            db.insert_channel("C1", "general", false)?;
            db.insert_members(&[member("C1", "U1"), member("C1", "U2")])?;
            db.insert_users(&[user("U1", "Alice", "a.png")])?;
            db.query("SELECT * FROM members WHERE channel = 'C1'", NO_ARGS)?;
            db.fetch_all()
        })
        .unwrap();

    assert_eq!(rows.len(), 2);
    let users: Vec<String> = rows.iter().map(|r| r.get_named("user").unwrap()).collect();
    assert_eq!(users, ["U1", "U2"]);
}

#[test]
fn legacy_channels_table_gains_is_private() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slack.sqlite");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE channels (name text, id text, UNIQUE(id) ON CONFLICT REPLACE);
             INSERT INTO channels (name, id) VALUES ('general', 'C1'), ('random', 'C2');",
        )
        .unwrap();
    }

    let mut db = open(&dir);
    db.with_session(|db| {
        db.migrate_schema()?;
        assert_eq!(db.table_columns("channels")?, ["name", "id", "is_private"]);
        db.query("SELECT is_private FROM channels ORDER BY id", NO_ARGS)?;
        let flags: Vec<bool> = db
            .fetch_all()?
            .iter()
            .map(|r| r.get(0))
            .collect::<Result<Vec<bool>, DbError>>()?;
        assert_eq!(flags, [true, true]);
        // A second run hits the duplicate column and stays quiet.
        db.migrate_schema()
    })
    .unwrap();
}

#[test]
fn migration_surfaces_other_alter_failures() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slack.sqlite");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE VIEW channels AS SELECT 'general' AS name, 'C1' AS id;")
            .unwrap();
    }

    let mut db = open(&dir);
    let result = db.with_session(|db| db.migrate_schema());
    match result {
        Err(e) => assert!(!e.is_duplicate_column(), "unexpected error: {e}"),
        Ok(()) => panic!("adding a column to a view should fail"),
    }
}

#[test]
fn channels_and_members_roll_back_together() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    let mut session = db.session().unwrap();
    session.migrate_schema().unwrap();
    session.execute("DROP TABLE members", NO_ARGS).unwrap();

    let channels = [Channel {
        id: "C1".into(),
        name: "general".into(),
        is_private: false,
    }];
    let result = session.insert_channels_and_members(&channels, &[member("C1", "U1")]);
    assert!(matches!(result, Err(DbError::Sqlite(_))));
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM channels"), 0);

    // The session is still usable after the rollback.
    session.insert_channel("C9", "ops", true).unwrap();
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM channels"), 1);
}

#[test]
fn channels_and_members_commit_together() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    db.with_session(|db| {
        db.migrate_schema()?;
        db.insert_channels_and_members(
            &[
                Channel {
                    id: "C1".into(),
                    name: "general".into(),
                    is_private: false,
                },
                Channel {
                    id: "C2".into(),
                    name: "secret".into(),
                    is_private: true,
                },
            ],
            &[member("C2", "U1")],
        )
    })
    .unwrap();

    let mut session = db.session().unwrap();
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM channels"), 2);
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM members"), 1);
}

#[test]
fn referenced_rows_can_be_stored_again() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slack.sqlite");
    let config = DbConfig::sqlite(path.to_string_lossy()).with("foreign_keys", "on");
    let mut db = select_backend("sqlite", &config).unwrap();

    let general = |name: &str| Channel {
        id: "C1".into(),
        name: name.into(),
        is_private: false,
    };

    db.with_session(|db| {
        db.migrate_schema()?;
        db.insert_users(&[user("U1", "Alice", "a.png")])?;
        db.insert_channels_and_members(&[general("general")], &[member("C1", "U1")])?;
        db.insert_users(&[user("U1", "Alicia", "b.png")])?;
        db.insert_channels_and_members(&[general("lobby")], &[])
    })
    .unwrap();

    let mut session = db.session().unwrap();
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM members"), 1);
    assert_eq!(session.user_id_by_name("alicia").unwrap().as_deref(), Some("U1"));
    assert_eq!(session.channel_id_by_name("lobby").unwrap().as_deref(), Some("C1"));
}

#[test]
fn commit_inside_transaction_is_kept() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    db.with_session(|db| {
        db.migrate_schema()?;
        db.transaction(|db| {
            db.insert_channel("C1", "general", false)?;
            db.commit()
        })?;
        db.insert_channel("C2", "random", false)
    })
    .unwrap();

    let mut session = db.session().unwrap();
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM channels"), 2);
}

#[test]
fn rollback_discards_pending_writes() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    let mut session = db.session().unwrap();
    session.migrate_schema().unwrap();
    session.commit().unwrap();

    session.insert_users(&[user("U1", "Alice", "a.png")]).unwrap();
    session.rollback().unwrap();
    assert_eq!(count(&mut session, "SELECT COUNT(*) FROM users"), 0);
}

#[test]
fn renames_update_by_id() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    let mut session = db.session().unwrap();
    session.migrate_schema().unwrap();
    session.insert_users(&[user("U1", "Alice", "a.png")]).unwrap();
    session.insert_channel("C1", "general", false).unwrap();

    assert_eq!(session.rename_user("U1", "alice.w").unwrap(), 1);
    assert_eq!(session.rename_channel("C1", "lobby").unwrap(), 1);
    assert_eq!(session.rename_channel("C404", "void").unwrap(), 0);

    assert_eq!(session.user_id_by_name("ALICE.W").unwrap().as_deref(), Some("U1"));
    assert_eq!(session.channel_id_by_name("lobby").unwrap().as_deref(), Some("C1"));
    assert_eq!(session.channel_id_by_name("general").unwrap(), None);
}

#[test]
fn fetch_many_pages_through_results() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    let mut session = db.session().unwrap();
    session.migrate_schema().unwrap();
    let users: Vec<User> = (0..5)
        .map(|i| user(&format!("U{i}"), &format!("user{i}"), ""))
        .collect();
    session.insert_users(&users).unwrap();

    assert_eq!(
        session.query("SELECT id FROM users ORDER BY id", NO_ARGS).unwrap(),
        5
    );
    assert_eq!(session.fetch_many(2).unwrap().len(), 2);
    assert_eq!(session.fetch_many(2).unwrap().len(), 2);
    let last = session.fetch_many(2).unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].get::<String>(0).unwrap(), "U4");
    assert!(session.fetch_one().unwrap().is_none());
}
