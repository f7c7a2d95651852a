//! Book catalog core: a filter compiler over SQLite and an undo/redo
//! transaction log.
//!
//! # Examples
//!
//! Compiling a filter:
//! ```
//! use libris::{
//!     db::tables::BOOKS,
//!     filter::{Column, DateLocale, Filter, FilterField, Predicate, compile},
//! };
//!
//! let filter = Filter::new(
//!     vec![],
//!     vec![FilterField::new(Column::PageCount, Predicate::Gt, ["300"])],
//! );
//! let compiled = compile(&filter, &BOOKS, &DateLocale::en_us());
//! assert!(compiled.command.contains("( page_count > ? )"));
//! assert_eq!(compiled.args.len(), 1);
//! ```
//!
//! Undoable catalog edits:
//! ```
//! use libris::{
//!     catalog::{Catalog, model::BookDraft},
//!     config::CatalogConfig,
//! };
//!
//! let mut catalog = Catalog::open_in_memory(&CatalogConfig::default()).expect("open");
//! let id = catalog
//!     .add_book(&BookDraft::titled("Dune").by("Frank Herbert").tagged("fiction"), |_| false)
//!     .expect("add");
//! assert!(catalog.get_book(id).expect("get").is_some());
//!
//! assert!(catalog.undo().expect("undo"));
//! assert!(catalog.get_book(id).expect("get").is_none());
//! assert!(catalog.redo().expect("redo"));
//! assert!(catalog.get_book(id).expect("get").is_some());
//! ```
//!
//! Runtime usage with a file database:
//! ```no_run
//! use libris::{
//!     catalog::{Catalog, model::BookDraft},
//!     config::CatalogConfig,
//!     runtime::handle::spawn_catalog,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = CatalogConfig::default();
//! let catalog = Catalog::open("libris.db", &config).expect("open sqlite");
//! let handle = spawn_catalog(catalog, config.runtime.clone());
//! let _id = handle.add_book(BookDraft::titled("Dune"), false).await.expect("add");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Catalog data access with undo recording.
pub mod catalog;
/// Catalog configuration.
pub mod config;
/// SQLite store and table descriptions.
pub mod db;
/// Filter model and SQL compiler.
pub mod filter;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
/// Undo/redo transaction log.
pub mod undo;
