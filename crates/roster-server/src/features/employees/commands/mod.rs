pub mod bulk_update;
pub mod create;
pub mod delete;
pub mod update;

pub use bulk_update::{
    BulkUpdateEmployeesCommand, BulkUpdateEmployeesError, BulkUpdateEmployeesResponse,
    BulkUpdateItem,
};
pub use create::{CreateEmployeeCommand, CreateEmployeeError};
pub use delete::{DeleteEmployeeCommand, DeleteEmployeeError, DeleteEmployeeResponse};
pub use update::{UpdateEmployeeCommand, UpdateEmployeeError};
