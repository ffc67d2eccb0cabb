//! CairnDB storage layer: tables, catalog, cursors, and the B+ tree index.
//!
//! A table owns its schema, pagination metadata, and the indexes defined on
//! its columns; the catalog owns every live table. Cursors iterate rows in
//! physical order through the buffer manager. Indexes never hold a back
//! reference to their table; every index operation takes the pertinent
//! table metadata by reference from the caller.

pub mod btree;
pub mod catalog;
pub mod cursor;
pub mod table;

pub use btree::BTree;
pub use catalog::Catalog;
pub use cursor::Cursor;
pub use table::Table;
