// src/detection/mod.rs
pub mod locator;
pub mod wizard;

pub use locator::{DetectedForm, FormLocator, FORM_KEYWORDS};
pub use wizard::{WizardDetector, WizardState};
