//! Pixel (OS automation) backend
//!
//! No DOM exists here: state is a screen raster plus OCR text, and targets
//! are natural-language descriptions resolved through template matching.

pub mod controller;
pub mod locate;
pub mod screen;

pub use controller::OsController;
pub use locate::{find_template, template_key, FrameSource, TargetResolver, TemplateMatch};
