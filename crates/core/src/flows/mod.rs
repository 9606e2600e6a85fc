pub mod engine;
pub mod policy;
pub mod progress;
pub mod states;

pub use engine::{StatusTransitionError, StatusUpdateEngine};
pub use policy::{allowed_statuses, is_permitted};
pub use progress::{
    render_progress, render_progress_raw, OrderProgress, ProgressStage, StageState, StageView,
};
pub use states::{Actor, ActorRole, ChangeKind, StatusChange};
