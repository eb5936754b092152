use henkan_core::converter::ConstraintError;
use henkan_core::store::StoreError;

/// Why a session operation failed.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}
