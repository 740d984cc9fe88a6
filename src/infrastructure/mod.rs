pub mod alpha_vantage_client;
pub mod csv_loader;
pub mod exchange_rates;
pub mod fmp_client;
pub mod http;
pub mod manual_source;
pub mod presentation_source;
pub mod retrying_source;
pub mod scrapers;
pub mod source_factory;
pub mod yahoo_client;
