pub mod company;
pub mod exchange;
pub mod source;
