pub mod response;
pub mod temp_file;
pub mod upload;
