use crate::types::BinId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: BinId },

    #[error("Validation failed: {0}")]
    Validation(String),
}
