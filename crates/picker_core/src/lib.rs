//! Picker core: pure selection state machine and view-model helpers.
mod effect;
mod media;
mod msg;
mod registry;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Rejection};
pub use media::{Candidate, ElementLocator, MediaDescriptor, MediaId, MediaKind, ParseMediaIdError};
pub use msg::{Msg, ScanOrigin};
pub use registry::{DetectedSet, SelectedMedia, SelectedSet};
pub use state::{AppState, SelectionMode};
pub use update::update;
pub use view_model::{Affordance, SelectedView, StateSnapshot};
