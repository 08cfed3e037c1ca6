pub mod error;
pub mod models;
pub mod schema;
pub mod state;
pub mod storage;
#[cfg(test)]
pub mod test_utils;
pub mod utils;

pub use error::HelpdeskError;
pub use utils::{create_conn, run_migrations, DbPool};
