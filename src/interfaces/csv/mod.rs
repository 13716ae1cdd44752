pub mod corridor_reader;
pub mod report_writer;
