const CREATE_MEMBER_TABLE: &str = "CREATE TABLE IF NOT EXISTS member (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  trip_id TEXT NOT NULL,
  user_id TEXT NOT NULL,
  name TEXT NOT NULL,
  UNIQUE(trip_id, user_id)
)";

const CREATE_EXPENSE_TABLE: &str = "CREATE TABLE IF NOT EXISTS expense (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  trip_id TEXT NOT NULL,
  title TEXT NOT NULL,
  amount INTEGER NOT NULL,
  payer TEXT NOT NULL,
  split_type TEXT NOT NULL,
  date DATETIME NOT NULL,
  created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
  updated_at DATETIME,
  deleted_at DATETIME
)";

const CREATE_EXPENSE_TRIP_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS expense_trip_id ON expense (trip_id)";

const CREATE_EXPENSE_SPLIT_TABLE: &str = "CREATE TABLE IF NOT EXISTS expense_split (
  expense_id INTEGER NOT NULL,
  position INTEGER NOT NULL,
  user_id TEXT NOT NULL,
  weight TEXT,
  amount INTEGER NOT NULL,
  UNIQUE(expense_id, position)
)";

pub fn create_all_tables(connection: &rusqlite::Connection) -> anyhow::Result<()> {
    connection.execute(CREATE_MEMBER_TABLE, ())?;
    connection.execute(CREATE_EXPENSE_TABLE, ())?;
    connection.execute(CREATE_EXPENSE_TRIP_INDEX, ())?;
    connection.execute(CREATE_EXPENSE_SPLIT_TABLE, ())?;
    Ok(())
}
