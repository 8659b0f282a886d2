mod row;

pub use row::{EMAIL_SIZE, ROW_SIZE, Row, RowError, USERNAME_SIZE};
