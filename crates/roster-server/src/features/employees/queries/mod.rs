pub mod countries;
pub mod get;
pub mod list;

pub use countries::{ListCountriesError, ListCountriesQuery, ListCountriesResponse};
pub use get::{GetEmployeeError, GetEmployeeQuery};
pub use list::{ListEmployeesError, ListEmployeesQuery, ListEmployeesResponse};
