pub mod currency_converter;
pub mod gold_equivalent;
pub mod listing;
pub mod name_matching;
pub mod reading_assembly;
pub mod reconciliation;
