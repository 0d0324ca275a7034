//! Step runner implementations.
//!
//! Each step drives one external collaborator:
//! - `VideoStep`: frame extractor
//! - `ConvertStep`: HEIC to JPG converter
//! - `DescribeStep`: image describer (once per image directory)
//! - `HtmlStep`: descriptions to HTML renderer

mod convert;
mod describe;
mod html;
mod video;

pub use convert::ConvertStep;
pub use describe::{DescribeStep, DESCRIPTION_FILE_NAME};
pub use html::{HtmlStep, HTML_FILE_NAME};
pub use video::VideoStep;
