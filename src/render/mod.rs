pub mod context;
pub mod file;
pub mod walker;

pub use context::{build_context, build_render_context, seed_context};
pub use walker::{execute_plan, plan_render, GeneratedProject, GenerationPlan, PlannedFile};
