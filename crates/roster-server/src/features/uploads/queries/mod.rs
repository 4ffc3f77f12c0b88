pub mod get_job;
pub mod list_errors;
pub mod list_jobs;

pub use get_job::{GetUploadJobError, GetUploadJobQuery, UploadJobDetails};
pub use list_errors::{ListUploadErrorsError, ListUploadErrorsQuery};
pub use list_jobs::{ListUploadJobsError, ListUploadJobsQuery};
