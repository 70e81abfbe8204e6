use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use keystone_customers::{CUSTOMER_VIEWS, Customer, CustomerId, CustomerView};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_customer))
        .route(
            "/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/:id/view", get(get_customer_view))
}

pub async fn create_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateCustomerRequest>,
) -> axum::response::Response {
    let customer = match Customer::register(CustomerId::new(), &body.name, &body.email, Utc::now())
    {
        Ok(c) => Arc::new(c),
        Err(e) => return errors::domain_error_to_response(e),
    };

    let mut repo = services.customer_repository();
    repo.add(Arc::clone(&customer));
    if let Err(e) = repo.unit_of_work_mut().commit().await {
        return errors::store_error_to_response(e);
    }
    repo.dispose();

    // The customer exists from here on; a failed projection is repaired by the next write.
    if let Err(resp) = project(&services, &customer).await {
        tracing::warn!(
            customer_id = %customer.id(),
            status = %resp.status(),
            "customer view not written"
        );
    }

    tracing::info!(customer_id = %customer.id(), "customer registered");
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": customer.id().to_string() })),
    )
        .into_response()
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let mut repo = services.customer_repository();
    let customer = match repo.get_by_id(&id).await {
        Ok(Some(c)) => c,
        Ok(None) => return not_found(),
        Err(e) => return errors::store_error_to_response(e),
    };

    match to_view(&services, &customer) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateCustomerRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let mut repo = services.customer_repository();
    let current = match repo.get_by_id(&id).await {
        Ok(Some(c)) => c,
        Ok(None) => return not_found(),
        Err(e) => return errors::store_error_to_response(e),
    };

    let now = Utc::now();
    let mut customer = Customer::clone(&current);
    if let Some(name) = body.name.as_deref() {
        if let Err(e) = customer.rename(name, now) {
            return errors::domain_error_to_response(e);
        }
    }
    if let Some(email) = body.email.as_deref() {
        if let Err(e) = customer.change_email(email, now) {
            return errors::domain_error_to_response(e);
        }
    }

    let customer = Arc::new(customer);
    repo.update(Arc::clone(&customer));
    if let Err(e) = repo.unit_of_work_mut().commit().await {
        return errors::store_error_to_response(e);
    }
    repo.dispose();

    match project(&services, &customer).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn delete_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let mut repo = services.customer_repository();
    let customer = match repo.get_by_id(&id).await {
        Ok(Some(c)) => c,
        // A view left behind by an earlier delete still has to go.
        Ok(None) => return remove_orphaned_view(&services, id).await,
        Err(e) => return errors::store_error_to_response(e),
    };

    repo.remove(customer);
    if let Err(e) = repo.unit_of_work_mut().commit().await {
        return errors::store_error_to_response(e);
    }
    repo.dispose();

    if let Err(e) = services
        .read_store
        .delete_document(CUSTOMER_VIEWS, &id.to_string())
        .await
    {
        return errors::store_error_to_response(e);
    }

    tracing::info!(customer_id = %id, "customer removed");
    StatusCode::NO_CONTENT.into_response()
}

async fn remove_orphaned_view(services: &AppServices, id: CustomerId) -> axum::response::Response {
    match services
        .read_store
        .delete_document(CUSTOMER_VIEWS, &id.to_string())
        .await
    {
        Ok(true) => {
            tracing::info!(customer_id = %id, "orphaned customer view removed");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => not_found(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_customer_view(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .read_store
        .get_document(CUSTOMER_VIEWS, &id.to_string())
        .await
    {
        Ok(Some(doc)) => (StatusCode::OK, Json(doc)).into_response(),
        Ok(None) => not_found(),
        Err(e) => errors::store_error_to_response(e),
    }
}

fn parse_id(raw: &str) -> Result<CustomerId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "customer not found")
}

fn to_view(services: &AppServices, customer: &Customer) -> Result<CustomerView, axum::response::Response> {
    services
        .mappings
        .mapper()
        .map::<Customer, CustomerView>(customer)
        .map_err(errors::mapping_error_to_response)
}

/// Write the customer's view into the read store.
async fn project(
    services: &AppServices,
    customer: &Customer,
) -> Result<CustomerView, axum::response::Response> {
    let view = to_view(services, customer)?;
    let body = serde_json::to_value(&view).map_err(|e| {
        errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "serialization_error",
            e.to_string(),
        )
    })?;

    services
        .read_store
        .put_document(CUSTOMER_VIEWS, &view.id, body)
        .await
        .map_err(errors::store_error_to_response)?;

    Ok(view)
}
