pub mod extractor;
pub mod options;
pub mod session;
pub mod source;
pub mod writer;
