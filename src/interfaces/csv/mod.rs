pub mod carrier_writer;
pub mod catalog_reader;
