pub mod e57_file;
pub mod las_file;
pub mod pipeline;
