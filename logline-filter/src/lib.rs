#![deny(missing_debug_implementations)]

pub mod attach_guard;
pub mod collection;
pub mod engine;
pub mod interval_filter;
pub mod item_filter;
pub mod overview;
pub mod signal;
pub mod text_filter;
pub mod view;

pub use attach_guard::{AttachGuard, AttachSlot};
pub use collection::{ChangeEvent, Collection, PruneError};
pub use engine::{FilterChanged, FilterEngine};
pub use interval_filter::IntervalFilter;
pub use item_filter::{ItemSubFilter, Ordinal, SelectableItem};
pub use overview::{Overview, OverviewEvent};
pub use signal::Signal;
pub use text_filter::TextFilter;
pub use view::{CursorError, FilterCursor, FilteredView, ViewChangeEvent};
