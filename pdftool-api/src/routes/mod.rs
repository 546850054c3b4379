//! Route handlers

pub mod ocr;
pub mod system;
pub mod transform;
