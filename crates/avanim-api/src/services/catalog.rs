//! Expression catalog records.

use std::sync::Arc;

use tracing::{info, warn};

use avanim_media::ExpressionCatalog;
use avanim_models::Expression;
use avanim_store::Store;

use crate::error::ApiResult;

/// Upsert one record per catalog entry. Returns the number written.
pub async fn seed_expressions(store: &Arc<dyn Store>, catalog: &ExpressionCatalog) -> ApiResult<usize> {
    let missing = catalog.missing_files();
    if !missing.is_empty() {
        warn!(expressions = ?missing, "Driving videos missing for some expressions");
    }

    let records = catalog.records();
    for expression in &records {
        store.upsert_expression(expression).await?;
    }
    info!(count = records.len(), backend = store.backend(), "Expression catalog seeded");
    Ok(records.len())
}

/// Catalog records ordered by name.
pub async fn list_expressions(store: &Arc<dyn Store>) -> ApiResult<Vec<Expression>> {
    Ok(store.list_expressions().await?)
}
