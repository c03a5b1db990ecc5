use futures::{
    future::{self, Future, FutureResult},
    Stream,
};
use hyper::{
    header::{ContentLength, ContentType},
    server::{Request, Response, Service},
    Chunk, Method, StatusCode,
};
use maud::html;
use serde::Serialize;

use crate::models::Message;
use crate::payload::{parse_new_message, parse_update_message, PayloadError};
use crate::store::{Store, StoreError};

pub const DELETED: &str = "Message deleted successfully";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read request body: {0}")]
    Body(#[from] hyper::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Payload(_) => StatusCode::BadRequest,
            ApiError::Store(StoreError::Validation(_)) => StatusCode::BadRequest,
            ApiError::Store(StoreError::NotFound) => StatusCode::NotFound,
            ApiError::Store(_) | ApiError::Body(_) | ApiError::Encode(_) => {
                StatusCode::InternalServerError
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Route {
    Index,
    Messages,
    Message(i32),
    Unknown,
}

impl Route {
    fn parse(path: &str) -> Route {
        match path.trim_end_matches('/') {
            "" => Route::Index,
            "/messages" => Route::Messages,
            path => path
                .strip_prefix("/messages/")
                .filter(|id| id.bytes().all(|byte| byte.is_ascii_digit()))
                .and_then(|id| id.parse().ok())
                .map_or(Route::Unknown, Route::Message),
        }
    }
}

#[derive(Serialize)]
struct Deleted {
    message: &'static str,
}

pub struct MessageService {
    store: Store,
}

impl MessageService {
    pub fn new(store: Store) -> MessageService {
        MessageService { store }
    }
}

impl Service for MessageService {
    type Request = Request;
    type Response = Response;
    type Error = hyper::Error;
    type Future = Box<dyn Future<Item = Self::Response, Error = Self::Error>>;

    fn call(&self, req: Request) -> Self::Future {
        info!("Received {} {}", req.method(), req.path());
        let method = req.method().clone();
        match (method, Route::parse(req.path())) {
            (Method::Get, Route::Index) => Box::new(future::ok(make_index_response())),
            (Method::Get, Route::Messages) => {
                let result = self.store.list_all().map_err(ApiError::from);
                Box::new(make_json_response(result, StatusCode::Ok))
            }
            (Method::Post, Route::Messages) => {
                let store = self.store.clone();
                let future = req
                    .body()
                    .concat2()
                    .then(move |chunk| create_message(&store, chunk))
                    .then(|result| make_json_response(result, StatusCode::Created));
                Box::new(future)
            }
            (Method::Patch, Route::Message(id)) => {
                let store = self.store.clone();
                let future = req
                    .body()
                    .concat2()
                    .then(move |chunk| update_message(&store, id, chunk))
                    .then(|result| make_json_response(result, StatusCode::Ok));
                Box::new(future)
            }
            (Method::Delete, Route::Message(id)) => {
                let result = self
                    .store
                    .delete(id)
                    .map(|()| Deleted { message: DELETED })
                    .map_err(ApiError::from);
                Box::new(make_json_response(result, StatusCode::Ok))
            }
            (_, Route::Unknown) => {
                Box::new(make_error_response("Not found", StatusCode::NotFound))
            }
            _ => Box::new(make_error_response(
                "Method not allowed",
                StatusCode::MethodNotAllowed,
            )),
        }
    }
}

fn create_message(store: &Store, chunk: Result<Chunk, hyper::Error>) -> Result<Message, ApiError> {
    let payload = parse_new_message(&chunk?)?;
    Ok(store.create(&payload.body, &payload.username)?)
}

fn update_message(
    store: &Store,
    id: i32,
    chunk: Result<Chunk, hyper::Error>,
) -> Result<Message, ApiError> {
    // An unknown id answers 404 whatever the payload looks like.
    store.find(id)?;
    let payload = parse_update_message(&chunk?)?;
    Ok(store.update(id, &payload.body)?)
}

fn make_index_response() -> Response {
    let page = html! {
        h1 { "Chatterbox API" }
    };
    let payload = page.into_string();
    Response::new()
        .with_header(ContentLength(payload.len() as u64))
        .with_header(ContentType::html())
        .with_body(payload)
}

fn make_json_response<T: Serialize>(
    result: Result<T, ApiError>,
    status_code: StatusCode,
) -> FutureResult<Response, hyper::Error> {
    let payload = result.and_then(|value| Ok(serde_json::to_string_pretty(&value)?));
    match payload {
        Ok(payload) => {
            debug!("{}", payload);
            future::ok(
                Response::new()
                    .with_status(status_code)
                    .with_header(ContentLength(payload.len() as u64))
                    .with_header(ContentType::json())
                    .with_body(payload),
            )
        }
        Err(error) => {
            let status_code = error.status();
            if status_code == StatusCode::InternalServerError {
                error!("Request failed: {}", error);
            } else {
                warn!("Rejected request: {}", error);
            }
            make_error_response(&error.to_string(), status_code)
        }
    }
}

fn make_error_response(
    error_message: &str,
    status_code: StatusCode,
) -> FutureResult<Response, hyper::Error> {
    let payload = format!("{:#}", serde_json::json!({ "error": error_message }));
    debug!("{}", payload);
    let response = Response::new()
        .with_status(status_code)
        .with_header(ContentLength(payload.len() as u64))
        .with_header(ContentType::json())
        .with_body(payload);
    future::ok(response)
}
