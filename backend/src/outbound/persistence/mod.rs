//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the repository ports backed by PostgreSQL via
//! `diesel-async` and a `bb8` pool.
//!
//! - Row structs (`models.rs`) and table definitions (`schema.rs`) stay inside
//!   this module; the domain only ever sees its own types.
//! - Rows read back from the database are re-validated on conversion.
//! - Unique-constraint violations surface as `DuplicateKey` port errors.
//!
//! # Example
//!
//! ```ignore
//! use experiments::outbound::persistence::{DbPool, PoolConfig, DieselUserRepository};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/experiments")).await?;
//! let users = DieselUserRepository::new(pool);
//! ```

mod diesel_error_mapping;
mod diesel_experiment_data_repository;
mod diesel_experiment_key_value_repository;
mod diesel_user_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_experiment_data_repository::DieselExperimentDataRepository;
pub use diesel_experiment_key_value_repository::DieselExperimentKeyValueRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use migrations::{MIGRATIONS, MigrationError, migrate, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
