//! HTTP-style adapter over the instance registry
//!
//! Routes a verb and a path onto [`Procs`] and wraps the outcome in a
//! [`RestResponse`] envelope. Transport is left to the caller.
//!
//! | Route                | GET      | POST   | PUT      | DELETE |
//! |----------------------|----------|--------|----------|--------|
//! | `/<prefix>.json`     | list     | create |          |        |
//! | `/<prefix>/<id>.json`| snapshot |        | update   | remove |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::registry::{PostResponse, Procs, ProcsFilter, PROC_NAME_KEY};
use crate::settings::Settings;

/// Request verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read a collection or an item
    Get,
    /// Create an item
    Post,
    /// Update an item
    Put,
    /// Remove an item
    Delete,
}

impl Method {
    /// Upper-case verb
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::invalid(format!("unsupported method {other}"))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response envelope: `{"code":..,"status":..,"message":..,"data":..}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestResponse {
    /// HTTP status code
    pub code: u16,
    /// Reason phrase of `code`
    pub status: &'static str,
    /// Error description, or the reason phrase on success
    pub message: String,
    /// Payload, `null` when there is none
    pub data: Option<Value>,
}

impl RestResponse {
    fn new(method: Method, result: Result<Value>) -> Self {
        let code = status_code(method, &result);
        let status = reason_phrase(code);
        match result {
            Ok(data) => Self {
                code,
                status,
                message: status.to_string(),
                data: (!data.is_null()).then_some(data),
            },
            Err(e) => Self {
                code,
                status,
                message: e.to_string(),
                data: None,
            },
        }
    }

    /// Serialize to a JSON string
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Failed(format!("serialize response: {e}")))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Collection { query: &'a str },
    Item(usize),
}

/// Maps requests onto a registry
#[derive(Debug, Clone)]
pub struct RestAdapter {
    procs: Arc<Procs>,
}

impl RestAdapter {
    /// Adapter over a shared registry
    pub fn new(procs: Arc<Procs>) -> Self {
        Self { procs }
    }

    /// Handle one request; `body` is a settings blob (JSON or query string)
    pub fn handle(&self, method: Method, path: &str, body: &str) -> RestResponse {
        let result = self.route(method, path, body);
        let response = RestResponse::new(method, result);

        if response.code >= 500 {
            tracing::warn!(method = %method, path = %path, code = response.code, message = %response.message, "Request failed");
        } else {
            tracing::debug!(method = %method, path = %path, code = response.code, "Request handled");
        }
        response
    }

    fn route(&self, method: Method, path: &str, body: &str) -> Result<Value> {
        let route = parse_route(&self.procs.config().prefix, path)?;
        match (method, route) {
            (Method::Get, Route::Collection { query }) => {
                let filter = ProcsFilter::from_settings(&Settings::parse(query)?)?;
                to_value(&self.procs.list(&filter)?)
            }
            (Method::Post, Route::Collection { .. }) => {
                let proc_name = Settings::parse(body)?
                    .get_str(PROC_NAME_KEY)
                    .ok_or_else(|| Error::invalid(format!("'{PROC_NAME_KEY}' is required")))?;
                let proc_id = self.procs.post(&proc_name, body)?;
                to_value(&PostResponse { proc_id })
            }
            (Method::Get, Route::Item(id)) => self.procs.get(id).map(Value::Object),
            (Method::Put, Route::Item(id)) => self.procs.put(id, body).map(|()| Value::Null),
            (Method::Delete, Route::Item(id)) => self.procs.delete(id).map(|()| Value::Null),
            (method, _) => Err(Error::invalid(format!("{method} not allowed on {path}"))),
        }
    }
}

fn parse_route<'a>(prefix: &str, path: &'a str) -> Result<Route<'a>> {
    let (path, query) = path.split_once('?').unwrap_or((path, ""));
    let trimmed = path.trim_start_matches('/');
    let stem = trimmed
        .strip_suffix(".json")
        .ok_or_else(|| Error::not_found(format!("no resource at {path}")))?;

    if stem == prefix {
        return Ok(Route::Collection { query });
    }
    stem.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .and_then(|id| id.parse().ok())
        .map(Route::Item)
        .ok_or_else(|| Error::not_found(format!("no resource at {path}")))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Failed(format!("serialize reply: {e}")))
}

/// Status code for the outcome of `method`
pub fn status_code<T>(method: Method, result: &Result<T>) -> u16 {
    match (result, method) {
        (Ok(_), Method::Post) => 201,
        (Ok(_), _) => 200,
        (Err(Error::NotFound(_)), Method::Delete) => 204,
        (Err(Error::NotFound(_)), _) => 404,
        (Err(Error::NotModified | Error::WouldBlock), Method::Get) => 304,
        (Err(Error::NotModified | Error::WouldBlock), Method::Post | Method::Put) => 409,
        (Err(Error::NotModified | Error::WouldBlock), Method::Delete) => 204,
        (Err(Error::Conflict(_)), _) => 409,
        (Err(Error::InvalidArgument(_)), _) => 400,
        (Err(_), _) => 500,
    }
}

fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        _ => "Internal Server Error",
    }
}
