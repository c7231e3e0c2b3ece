//! Month-by-month activity counts for time-bounded internship records.
//!
//! Records flow through [`dates`] normalization, are bucketed by [`months`],
//! tested with the single [`overlap`] predicate, narrowed by [`filter`] and
//! counted by [`aggregate`]. [`import`] and [`report`] sit at the edges.

pub mod aggregate;
pub mod dates;
pub mod filter;
pub mod import;
pub mod levels;
pub mod models;
pub mod months;
pub mod overlap;
pub mod report;
