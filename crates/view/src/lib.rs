//! Tabula views: pure card/table/detail projections plus the stateful list
//! and detail views that drive fetching and expose display states.

#![forbid(unsafe_code)]

pub mod detail;
pub mod detailview;
pub mod list;
pub mod listview;
pub mod model;

pub use detail::DetailRenderer;
pub use detailview::{DetailStatus, DetailView};
pub use list::{render_cards, render_table};
pub use listview::{ListStatus, ListView};
pub use model::*;
