// Document Submission Service: validate -> credit-check -> debit -> pipeline -> {completed, failed}.

pub mod handlers;
pub mod request;
pub mod service;

pub use service::SubmissionService;
