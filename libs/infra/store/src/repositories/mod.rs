pub mod audit;
pub mod embedding;
pub mod employee;

pub use audit::AuditRepository;
pub use embedding::EmbeddingRepository;
pub use employee::EmployeeRepository;
