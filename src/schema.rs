//! Target schema verification.
//!
//! The content schema belongs to the CMS; this crate only checks that the
//! tables it writes are present and refuses to start otherwise.

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::store::{Store, REQUIRED_TABLES};

pub async fn verify_schema(store: &dyn Store) -> Result<()> {
    let missing = store.missing_tables(&REQUIRED_TABLES).await?;
    if !missing.is_empty() {
        return Err(MigrateError::Schema { missing });
    }
    debug!(tables = REQUIRED_TABLES.len(), "schema verified");
    Ok(())
}
