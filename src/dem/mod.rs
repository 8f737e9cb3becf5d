pub mod gdal_programs;
pub mod grid;
pub mod pipeline;
