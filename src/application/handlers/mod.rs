pub mod companies_handler;
