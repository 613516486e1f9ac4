//! Shared Diesel error mapping for the experiment repositories.
//!
//! Each repository supplies constructors for its own port error; this module
//! decides which one a given Diesel or pool failure becomes.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::models::RowConversionError;
use super::pool::PoolError;

/// Constructors for one repository's port error.
pub(crate) struct ErrorConstructors<E> {
    pub connection: fn(String) -> E,
    pub query: fn(String) -> E,
    pub duplicate: fn(String) -> E,
}

impl<E> ErrorConstructors<E> {
    /// Pool failures are always connection failures.
    pub(crate) fn pool(&self, error: PoolError) -> E {
        (self.connection)(error.into_message())
    }

    /// A stored row failed domain validation.
    pub(crate) fn row(&self, error: RowConversionError) -> E {
        debug!(%error, "stored row rejected");
        (self.query)(error.to_string())
    }

    /// Map a Diesel failure, keeping unique violations distinct.
    pub(crate) fn diesel(&self, error: DieselError) -> E {
        match &error {
            DieselError::DatabaseError(kind, info) => {
                debug!(?kind, message = info.message(), "diesel operation failed");
            }
            _ => debug!(
                error_type = %std::any::type_name_of_val(&error),
                "diesel operation failed"
            ),
        }

        match error {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let constraint = info.constraint_name().unwrap_or("unique constraint");
                (self.duplicate)(constraint.to_owned())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
                (self.connection)("database connection error".to_owned())
            }
            DieselError::NotFound => (self.query)("record not found".to_owned()),
            DieselError::QueryBuilderError(_) => (self.query)("database query error".to_owned()),
            _ => (self.query)("database error".to_owned()),
        }
    }
}
