//! Backend-neutral result model.
//!
//! # Responsibility
//! - Define the dynamic value and row-set shapes returned by every backend.
//!
//! # Invariants
//! - Column names are never retained; rows are positional.
//! - Every row of one `RowSet` has the same column count.

pub mod value;
