use std::sync::Arc;

use argon2::Params;
use chrono::Duration;

use natter_db::Database;

use crate::auth::{AppState, AppStateInner};
use crate::password::{Argon2Hasher, PasswordHasher};

/// In-memory store with the given accounts already present.
pub(crate) fn db_with_users(usernames: &[&str]) -> Arc<Database> {
    let db = Database::open_in_memory().unwrap();
    for username in usernames {
        db.insert_user(username, "unused-hash").unwrap();
    }
    Arc::new(db)
}

/// Argon2id with minimal cost so tests stay fast.
pub(crate) fn cheap_hasher() -> Arc<dyn PasswordHasher> {
    Arc::new(Argon2Hasher::with_params(Params::new(1024, 1, 1, None).unwrap()))
}

pub(crate) fn test_state() -> AppState {
    test_state_with_db().0
}

/// App state plus a handle on its store, for seeding fixtures.
pub(crate) fn test_state_with_db() -> (AppState, Arc<Database>) {
    let db = db_with_users(&[]);
    let state = AppStateInner::new(db.clone(), cheap_hasher(), Duration::hours(1), false);
    (state, db)
}
