//! In-process stub of the books API for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// `Authorization` value for `user:password`.
pub const READER_AUTH: &str = "Basic dXNlcjpwYXNzd29yZA==";
/// `Authorization` value for `admin:password`.
pub const ADMIN_AUTH: &str = "Basic YWRtaW46cGFzc3dvcmQ=";

#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub id: u64,
    pub name: String,
    pub author: String,
    pub price: f64,
}

impl Book {
    pub fn new(id: u64, name: &str, author: &str, price: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            author: author.to_string(),
            price,
        }
    }
}

pub fn seed_books() -> Vec<Book> {
    vec![
        Book::new(1, "A to the Bodhisattva Way of Life", "Santideva", 15.41),
        Book::new(2, "Design Patterns", "Erich Gamma", 45.0),
        Book::new(3, "Refactoring", "Martin Fowler", 35.5),
    ]
}

/// A request as the stub saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub route: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Clone)]
struct StubState {
    books: Arc<Mutex<Vec<Book>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl StubState {
    fn record(&self, route: &str, headers: &HeaderMap) {
        let text = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(Recorded {
            route: route.to_string(),
            authorization: text(header::AUTHORIZATION),
            content_type: text(header::CONTENT_TYPE),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Reader,
    Admin,
}

fn role(headers: &HeaderMap) -> Option<Role> {
    match headers.get(header::AUTHORIZATION)?.to_str().ok()? {
        READER_AUTH => Some(Role::Reader),
        ADMIN_AUTH => Some(Role::Admin),
        _ => None,
    }
}

/// Handle to a running stub; the server stops when this is dropped.
pub struct BooksStub {
    base_url: String,
    state: StubState,
    task: JoinHandle<()>,
}

impl BooksStub {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for BooksStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_books_stub(seed: Vec<Book>) -> BooksStub {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind books stub");
    let addr = listener.local_addr().expect("books stub address");

    let state = StubState {
        books: Arc::new(Mutex::new(seed)),
        requests: Arc::new(Mutex::new(Vec::new())),
        in_flight: Arc::new(AtomicUsize::new(0)),
        max_in_flight: Arc::new(AtomicUsize::new(0)),
    };
    let app = Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/{id}", get(get_book).put(update_book))
        .route("/broken", get(broken))
        .route("/slow", get(slow))
        .with_state(state.clone());

    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    BooksStub {
        base_url: format!("http://{addr}"),
        state,
        task,
    }
}

/// A base URL nothing is listening on.
pub async fn unused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind unused port");
    let addr = listener.local_addr().expect("local address");
    drop(listener);
    format!("http://{addr}")
}

async fn list_books(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record("GET /books", &headers);
    if role(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut books = state.books.lock().unwrap().clone();
    let number = |key: &str| params.get(key).and_then(|v| v.parse::<f64>().ok());
    if let Some(author) = params.get("author") {
        books.retain(|b| &b.author == author);
    }
    if let Some(min) = number("minPrice") {
        books.retain(|b| b.price >= min);
    }
    if let Some(max) = number("maxPrice") {
        books.retain(|b| b.price <= max);
    }
    if params.get("sort").map(String::as_str) == Some("name") {
        books.sort_by(|a, b| a.name.cmp(&b.name));
        if params.get("order").map(String::as_str) == Some("desc") {
            books.reverse();
        }
    }
    if let (Some(page), Some(limit)) = (number("page"), number("limit")) {
        let (page, limit) = (page as usize, limit as usize);
        books = books
            .into_iter()
            .skip(page.saturating_sub(1) * limit)
            .take(limit)
            .collect();
    }

    Json(json!({ "books": books })).into_response()
}

async fn get_book(State(state): State<StubState>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    state.record("GET /books/{id}", &headers);
    if role(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let books = state.books.lock().unwrap();
    match books.iter().find(|b| b.id == id) {
        Some(book) => Json(book.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "book not found" }))).into_response(),
    }
}

fn parse_book(body: &Bytes) -> Result<(String, String, f64), Response> {
    let bad_request = |message: &str| (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
    let payload: Value = serde_json::from_slice(body).map_err(|_| bad_request("malformed JSON"))?;
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| bad_request("name is required"))?;
    let author = payload.get("author").and_then(Value::as_str).unwrap_or_default();
    let price = payload
        .get("price")
        .and_then(Value::as_f64)
        .filter(|p| *p >= 0.0)
        .ok_or_else(|| bad_request("price must be non-negative"))?;
    Ok((name.to_string(), author.to_string(), price))
}

async fn create_book(State(state): State<StubState>, headers: HeaderMap, body: Bytes) -> Response {
    state.record("POST /books", &headers);
    match role(&headers) {
        Some(Role::Admin) => {}
        Some(Role::Reader) => return StatusCode::FORBIDDEN.into_response(),
        None => return StatusCode::UNAUTHORIZED.into_response(),
    }
    let (name, author, price) = match parse_book(&body) {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let mut books = state.books.lock().unwrap();
    let id = books.iter().map(|b| b.id).max().unwrap_or(0) + 1;
    let book = Book {
        id,
        name,
        author,
        price,
    };
    books.push(book.clone());
    (StatusCode::CREATED, Json(book)).into_response()
}

async fn update_book(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    body: Bytes,
) -> Response {
    state.record("PUT /books/{id}", &headers);
    if role(&headers) != Some(Role::Admin) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let (name, author, price) = match parse_book(&body) {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let mut books = state.books.lock().unwrap();
    match books.iter_mut().find(|b| b.id == id) {
        Some(book) => {
            book.name = name;
            book.author = author;
            book.price = price;
            Json(book.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn broken(State(state): State<StubState>, headers: HeaderMap) -> Response {
    state.record("GET /broken", &headers);
    (StatusCode::OK, "<html>not json</html>").into_response()
}

async fn slow(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record("GET /slow", &headers);
    let ms = params.get("ms").and_then(|v| v.parse().ok()).unwrap_or(2_000);

    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    Json(json!({ "sleptMs": ms })).into_response()
}
