pub mod currency;
pub mod fact_key;
pub mod reading;
