//! Tabula query layer: the list-view state machine (draft vs. applied
//! filters, pagination, view mode) and the binding between search item
//! configuration and draft values.

#![forbid(unsafe_code)]

pub mod controller;
pub mod controls;

pub use controller::{ListQueryController, QueryState, ViewMode, PAGE_SIZE_CHOICES};
pub use controls::{control_value, normalize_date, Choice, ControlError, ControlInput, ControlValue, SearchPanel};
