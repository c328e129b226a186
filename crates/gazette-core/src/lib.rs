//! Shared vocabulary of the Gazette persistence layer: the [`Article`]
//! record and its engine models, keyed fields, predicates, the
//! [`DatabaseCoordinator`] trait, errors and the observable event channels.
//!
//! Both storage engines (`gazette-objectstore`, `gazette-store-sqlite`)
//! implement [`DatabaseCoordinator`]; the services in `gazette-app` see
//! nothing else. No storage crate is a dependency here.

pub mod article;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod events;
pub mod field;
pub mod models;
pub mod observable;
pub mod predicate;

pub use article::{Article, ArticleModel, Feed};
pub use coordinator::DatabaseCoordinator;
pub use entity::Entity;
pub use error::{Error, MigrationError, Result};
pub use field::{FieldKind, FieldSpec, FieldValue, KeyedFields};
pub use predicate::Predicate;
