pub mod csv_file;
pub mod retry;
pub mod yahoo;
