pub mod page_extractor;
pub mod signals;
