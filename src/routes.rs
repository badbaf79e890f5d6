//! HTTP surface of the service.
//!
//! Handlers only extract the request and shape the response: everything else
//! happens in `endpoints`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{debug, error};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::{
    database::sqlite::SqliteDatabase,
    endpoints::{
        handle_add_members, handle_balance, handle_balance_csv, handle_create_expense,
        handle_delete_expense, handle_get_expense, handle_list_expenses, handle_list_members,
        handle_update_expense,
    },
    error::{DatabaseError, DatabaseErrorKind, InputError, SplitError},
    formatter::{format_expense, format_list_expenses, BalanceReport, ExpenseView},
    notifier::ExpenseNotifier,
    types::{ExpenseId, ExpenseInput, Member, TripId},
};

#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Mutex<SqliteDatabase>>,
    pub notifier: Arc<dyn ExpenseNotifier>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/trips/{trip_id}/members",
            get(list_members).post(add_members),
        )
        .route(
            "/trips/{trip_id}/expenses",
            get(list_expenses).post(create_expense),
        )
        .route(
            "/trips/{trip_id}/expenses/{expense_id}",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route("/trips/{trip_id}/balances", get(balance))
        .route("/trips/{trip_id}/balances/csv", get(balance_csv))
        .with_state(state)
}

/// Any failure of an operation. Invalid input is reported to the client,
/// everything else is logged and hidden behind a generic message.
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self.0);
            "internal error".to_string()
        } else {
            debug!("Rejected request: {}", self.0);
            self.0.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

fn status_of(e: &anyhow::Error) -> StatusCode {
    if e.is::<SplitError>() || e.is::<InputError>() {
        StatusCode::BAD_REQUEST
    } else {
        match e.downcast_ref::<DatabaseError>().map(DatabaseError::kind) {
            Some(DatabaseErrorKind::NotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct BalanceParams {
    #[serde(default)]
    simplify: bool,
}

async fn add_members(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(members): Json<Vec<Member>>,
) -> ApiResult<(StatusCode, Json<Vec<Member>>)> {
    handle_add_members(&trip_id, &members, &state.database).await?;
    let members = handle_list_members(&trip_id, &state.database).await?;
    Ok((StatusCode::CREATED, Json(members)))
}

async fn list_members(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> ApiResult<Json<Vec<Member>>> {
    let members = handle_list_members(&trip_id, &state.database).await?;
    Ok(Json(members))
}

async fn create_expense(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Json(input): Json<ExpenseInput>,
) -> ApiResult<(StatusCode, Json<ExpenseView>)> {
    let expense =
        handle_create_expense(&trip_id, &input, &state.database, state.notifier.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(format_expense(&expense))))
}

async fn list_expenses(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> ApiResult<Json<Vec<ExpenseView>>> {
    let expenses = handle_list_expenses(&trip_id, &state.database).await?;
    Ok(Json(format_list_expenses(&expenses)))
}

async fn get_expense(
    State(state): State<AppState>,
    Path((trip_id, expense_id)): Path<(TripId, ExpenseId)>,
) -> ApiResult<Json<ExpenseView>> {
    let expense = handle_get_expense(&trip_id, expense_id, &state.database).await?;
    Ok(Json(format_expense(&expense)))
}

async fn update_expense(
    State(state): State<AppState>,
    Path((trip_id, expense_id)): Path<(TripId, ExpenseId)>,
    Json(input): Json<ExpenseInput>,
) -> ApiResult<Json<ExpenseView>> {
    let expense = handle_update_expense(
        &trip_id,
        expense_id,
        &input,
        &state.database,
        state.notifier.as_ref(),
    )
    .await?;
    Ok(Json(format_expense(&expense)))
}

async fn delete_expense(
    State(state): State<AppState>,
    Path((trip_id, expense_id)): Path<(TripId, ExpenseId)>,
) -> ApiResult<StatusCode> {
    handle_delete_expense(
        &trip_id,
        expense_id,
        &state.database,
        state.notifier.as_ref(),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn balance(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    Query(params): Query<BalanceParams>,
) -> ApiResult<Json<BalanceReport>> {
    let report = handle_balance(&trip_id, params.simplify, &state.database).await?;
    Ok(Json(report))
}

async fn balance_csv(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> ApiResult<impl IntoResponse> {
    let csv = handle_balance_csv(&trip_id, &state.database).await?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::notifier::BroadcastNotifier;

    use super::*;

    fn make_router() -> anyhow::Result<(Router, Arc<BroadcastNotifier>)> {
        let notifier = Arc::new(BroadcastNotifier::new(16));
        let state = AppState {
            database: Arc::new(Mutex::new(SqliteDatabase::new(":memory:")?)),
            notifier: notifier.clone(),
        };
        Ok((router(state), notifier))
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Vec<u8>)> {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => request.body(Body::empty())?,
        };

        let response = router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, bytes.to_vec()))
    }

    async fn send_json(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let (status, bytes) = send(router, method, uri, body).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn register_members(router: &Router) -> anyhow::Result<()> {
        let members = json!([
            {"id": "u1", "name": "Alice"},
            {"id": "u2", "name": "Bob"},
            {"id": "u3", "name": "Carol"},
        ]);
        let (status, body) = send_json(router, "POST", "/trips/t1/members", Some(members)).await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.as_array().map(Vec::len), Some(3));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_expense_lifecycle() -> anyhow::Result<()> {
        let (router, notifier) = make_router()?;
        let mut events = notifier.subscribe();
        register_members(&router).await?;

        let expense = json!({
            "title": "Dinner",
            "amount": 90,
            "payer": "u1",
            "splitType": "even",
            "splitWith": [{"user": "u1"}, {"user": "u2"}, {"user": "u3"}],
        });
        let (status, body) =
            send_json(&router, "POST", "/trips/t1/expenses", Some(expense)).await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["splitType"], "even");
        assert_abs_diff_eq!(body["splitWith"][2]["amount"].as_f64().unwrap_or_default(), 30.0);
        let id = body["id"].as_i64().unwrap_or_default();
        assert!(events.try_recv().is_ok());

        let (status, body) = send_json(&router, "GET", "/trips/t1/balances", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balances"][0]["user"]["name"], "Alice");
        assert_abs_diff_eq!(body["balances"][0]["amount"].as_f64().unwrap_or_default(), 60.0);
        assert_eq!(body["summary"][0]["from"], "Bob");
        assert_eq!(body["summary"][0]["to"], "Alice");
        assert_abs_diff_eq!(body["summary"][0]["amount"].as_f64().unwrap_or_default(), 30.0);

        let (status, bytes) = send(&router, "GET", "/trips/t1/balances/csv", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            String::from_utf8(bytes)?,
            "name,amount\nAlice,60.00\nBob,-30.00\nCarol,-30.00\n"
        );

        let uri = format!("/trips/t1/expenses/{id}");
        let (status, _) = send_json(&router, "DELETE", &uri, None).await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send_json(&router, "GET", &uri, None).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].is_string());

        let (status, body) = send_json(&router, "GET", "/trips/t1/expenses", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_split_is_bad_request() -> anyhow::Result<()> {
        let (router, _) = make_router()?;
        register_members(&router).await?;

        let expense = json!({
            "title": "Dinner",
            "amount": 100,
            "payer": "u1",
            "splitType": "byAmount",
            "splitWith": [{"user": "u1", "amount": 40}, {"user": "u2", "amount": 50}],
        });
        let (status, body) =
            send_json(&router, "POST", "/trips/t1/expenses", Some(expense)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "split amounts add up to 90.00, which differs from the expense amount 100.00 by 10.00"
        );

        let expense = json!({"title": "Dinner", "amount": 10, "payer": "u1", "splitType": "halves"});
        let (status, _) = send_json(&router, "POST", "/trips/t1/expenses", Some(expense)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send_json(&router, "PUT", "/trips/t1/expenses/42", Some(json!({
                "title": "Dinner", "amount": 10, "payer": "u1"
            })))
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_simplified_balance() -> anyhow::Result<()> {
        let (router, _) = make_router()?;
        register_members(&router).await?;

        for (payer, user) in [("u1", "u2"), ("u2", "u3")] {
            let expense = json!({
                "title": "Taxi", "amount": "20.00", "payer": payer,
                "splitType": "byAmount", "splitWith": [{"user": user, "amount": "20"}],
            });
            let (status, _) =
                send_json(&router, "POST", "/trips/t1/expenses", Some(expense)).await?;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = send_json(&router, "GET", "/trips/t1/balances", None).await?;
        assert_eq!(body["summary"].as_array().map(Vec::len), Some(2));

        let (_, body) = send_json(&router, "GET", "/trips/t1/balances?simplify=true", None).await?;
        assert_eq!(body["summary"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["summary"][0]["from"], "Carol");
        Ok(())
    }
}
