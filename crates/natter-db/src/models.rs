/// Database row types. These map directly to SQLite rows and are kept apart
/// from the natter-types models so the store stays independent of the API.

pub struct UserRow {
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct SessionRow {
    pub token: String,
    pub state: String,
    pub username: Option<String>,
    pub created_at: i64,
    pub last_touched: i64,
    pub expires_at: i64,
}

pub struct MessageRow {
    pub id: i64,
    pub author: String,
    pub body: String,
    pub client_time: Option<String>,
    pub created_at: String,
}

pub struct CityRow {
    pub id: i64,
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub district: Option<String>,
    pub population: Option<i64>,
}

/// Result of an insert guarded by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}
