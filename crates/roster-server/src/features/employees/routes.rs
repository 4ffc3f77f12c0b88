//! Employee API routes
//!
//! - `POST /api/v1/employees` - Create an employee
//! - `GET /api/v1/employees` - Cursor-paginated listing with filters
//! - `GET /api/v1/employees/countries` - Distinct countries for filters
//! - `GET /api/v1/employees/:id` - Get one employee
//! - `PUT /api/v1/employees/:id` - Partial update
//! - `DELETE /api/v1/employees/:id` - Delete
//! - `POST /api/v1/employees/bulk-update` - Batch partial updates

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;

use crate::api::response::{ApiResponse, CursorMeta, ErrorResponse};
use crate::features::FeatureState;

use super::commands::{
    BulkUpdateEmployeesCommand, BulkUpdateEmployeesError, CreateEmployeeCommand,
    CreateEmployeeError, DeleteEmployeeCommand, DeleteEmployeeError, UpdateEmployeeCommand,
    UpdateEmployeeError,
};
use super::queries::{
    GetEmployeeError, GetEmployeeQuery, ListCountriesError, ListCountriesQuery,
    ListEmployeesError, ListEmployeesQuery,
};

pub fn employees_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(create_employee))
        .route("/", get(list_employees))
        .route("/countries", get(list_countries))
        .route("/bulk-update", post(bulk_update_employees))
        .route("/:id", get(get_employee))
        .route("/:id", put(update_employee))
        .route("/:id", delete(delete_employee))
}

#[tracing::instrument(skip(state, command))]
async fn create_employee(
    State(state): State<FeatureState>,
    Json(command): Json<CreateEmployeeCommand>,
) -> Result<Response, EmployeesApiError> {
    let employee = super::commands::create::handle(state.db, state.cache, command).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(employee))).into_response())
}

#[tracing::instrument(skip(state, query))]
async fn list_employees(
    State(state): State<FeatureState>,
    Query(query): Query<ListEmployeesQuery>,
) -> Result<Response, EmployeesApiError> {
    let response = super::queries::list::handle(state.db, state.cache, query).await?;

    let meta = json!(CursorMeta::new(
        response.next_cursor,
        response.has_next,
        response.items.len(),
        response.cached,
    ));

    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(response.items, meta)))
        .into_response())
}

#[tracing::instrument(skip(state))]
async fn list_countries(
    State(state): State<FeatureState>,
) -> Result<Response, EmployeesApiError> {
    let response =
        super::queries::countries::handle(state.db, state.cache, ListCountriesQuery::default())
            .await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response.countries))).into_response())
}

#[tracing::instrument(skip(state), fields(employee_id = id))]
async fn get_employee(
    State(state): State<FeatureState>,
    Path(id): Path<i32>,
) -> Result<Response, EmployeesApiError> {
    let employee = super::queries::get::handle(state.db, GetEmployeeQuery { id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(employee))).into_response())
}

#[tracing::instrument(skip(state, command), fields(employee_id = id))]
async fn update_employee(
    State(state): State<FeatureState>,
    Path(id): Path<i32>,
    Json(mut command): Json<UpdateEmployeeCommand>,
) -> Result<Response, EmployeesApiError> {
    command.id = id;
    let employee = super::commands::update::handle(state.db, state.cache, command).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(employee))).into_response())
}

#[tracing::instrument(skip(state), fields(employee_id = id))]
async fn delete_employee(
    State(state): State<FeatureState>,
    Path(id): Path<i32>,
) -> Result<Response, EmployeesApiError> {
    let response =
        super::commands::delete::handle(state.db, state.cache, DeleteEmployeeCommand { id })
            .await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state, command), fields(batch = command.updates.len()))]
async fn bulk_update_employees(
    State(state): State<FeatureState>,
    Json(command): Json<BulkUpdateEmployeesCommand>,
) -> Result<Response, EmployeesApiError> {
    let response = super::commands::bulk_update::handle(state.db, state.cache, command).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Unified error type for employee API endpoints
#[derive(Debug)]
enum EmployeesApiError {
    Create(CreateEmployeeError),
    Update(UpdateEmployeeError),
    Delete(DeleteEmployeeError),
    BulkUpdate(BulkUpdateEmployeesError),
    Get(GetEmployeeError),
    List(ListEmployeesError),
    Countries(ListCountriesError),
}

impl From<CreateEmployeeError> for EmployeesApiError {
    fn from(err: CreateEmployeeError) -> Self {
        Self::Create(err)
    }
}

impl From<UpdateEmployeeError> for EmployeesApiError {
    fn from(err: UpdateEmployeeError) -> Self {
        Self::Update(err)
    }
}

impl From<DeleteEmployeeError> for EmployeesApiError {
    fn from(err: DeleteEmployeeError) -> Self {
        Self::Delete(err)
    }
}

impl From<BulkUpdateEmployeesError> for EmployeesApiError {
    fn from(err: BulkUpdateEmployeesError) -> Self {
        Self::BulkUpdate(err)
    }
}

impl From<GetEmployeeError> for EmployeesApiError {
    fn from(err: GetEmployeeError) -> Self {
        Self::Get(err)
    }
}

impl From<ListEmployeesError> for EmployeesApiError {
    fn from(err: ListEmployeesError) -> Self {
        Self::List(err)
    }
}

impl From<ListCountriesError> for EmployeesApiError {
    fn from(err: ListCountriesError) -> Self {
        Self::Countries(err)
    }
}

impl EmployeesApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            EmployeesApiError::Create(CreateEmployeeError::Validation(_))
            | EmployeesApiError::Update(UpdateEmployeeError::Validation(_))
            | EmployeesApiError::Update(UpdateEmployeeError::NoFieldsToUpdate)
            | EmployeesApiError::BulkUpdate(BulkUpdateEmployeesError::EmptyBatch)
            | EmployeesApiError::BulkUpdate(BulkUpdateEmployeesError::BatchTooLarge)
            | EmployeesApiError::BulkUpdate(BulkUpdateEmployeesError::EmptyItem { .. })
            | EmployeesApiError::BulkUpdate(BulkUpdateEmployeesError::Validation { .. }) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            },

            EmployeesApiError::Update(UpdateEmployeeError::NotFound(_))
            | EmployeesApiError::Delete(DeleteEmployeeError::NotFound(_))
            | EmployeesApiError::Get(GetEmployeeError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            },

            EmployeesApiError::Create(CreateEmployeeError::Database(_))
            | EmployeesApiError::Update(UpdateEmployeeError::Database(_))
            | EmployeesApiError::Delete(DeleteEmployeeError::Database(_))
            | EmployeesApiError::BulkUpdate(BulkUpdateEmployeesError::Database(_))
            | EmployeesApiError::Get(GetEmployeeError::Database(_))
            | EmployeesApiError::List(ListEmployeesError::Database(_))
            | EmployeesApiError::Countries(ListCountriesError::Database(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            },
        }
    }
}

impl IntoResponse for EmployeesApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Employee API error: {}", self);
            "A database error occurred".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

impl std::fmt::Display for EmployeesApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(e) => write!(f, "{}", e),
            Self::Update(e) => write!(f, "{}", e),
            Self::Delete(e) => write!(f, "{}", e),
            Self::BulkUpdate(e) => write!(f, "{}", e),
            Self::Get(e) => write!(f, "{}", e),
            Self::List(e) => write!(f, "{}", e),
            Self::Countries(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = EmployeesApiError::Get(GetEmployeeError::NotFound(12));
        assert_eq!(err.classify().0, StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_validation_maps_to_400() {
        let err = EmployeesApiError::Update(UpdateEmployeeError::NoFieldsToUpdate);
        assert_eq!(err.classify(), (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"));
    }

    #[test]
    fn test_routes_structure() {
        let router = employees_routes();
        assert!(format!("{:?}", router).contains("Router"));
    }
}
