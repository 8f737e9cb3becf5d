pub mod bbox;
pub mod correlation;
pub mod fields;
pub mod height;
pub mod layers;
pub mod pipeline;
pub mod rename;
pub mod shaft_lines;
