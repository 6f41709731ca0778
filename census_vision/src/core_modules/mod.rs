pub mod background_model;
pub mod blob;
pub mod census;
pub mod classifier;
pub mod contour_extractor;
pub mod frame;
pub mod image_sequence;
pub mod morphology;
pub mod preprocess;
pub mod render;
