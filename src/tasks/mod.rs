//! @ai:module:intent Evaluation tasks: prompt builders for every test family
//! @ai:module:layer application
//! @ai:module:public_api verification, step_cloze, freeform, IGNORE_DOCTRINES

pub mod freeform;
pub mod step_cloze;
pub mod verification;

/// Instruction appended to verification prompts
pub const IGNORE_DOCTRINES: &str = "Do **NOT** consider the application of any tax-law judicial doctrines like substance-over-form, the sham-transaction doctrine, or economic substance.";

pub use freeform::{
    draft_transcript, generation_item, generation_prompt, load_graded, GradedFreeform,
};
pub use step_cloze::{
    clean_answer, grading_items, step_cloze_items, step_cloze_prompt, step_from, ClozeExample,
    NShot, EXCLUDED_STRATEGIES,
};
pub use verification::{analysis_verification_items, goal_verification_items, GoalVariant, Standard};
