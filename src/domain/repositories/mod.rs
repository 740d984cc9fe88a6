pub mod company_repository;
pub mod provenance_log;
pub mod source_fetcher;

pub use company_repository::CompanyRepository;
pub use provenance_log::ProvenanceLog;
pub use source_fetcher::SourceFetcher;
