//! Response construction.
//!
//! # Responsibilities
//! - Map [`ServiceError`] to status codes
//! - Attach profile headers and matching custom headers
//! - Mark rule-engine documents as downloads
//!
//! # Design Decisions
//! - Error bodies are short fixed phrases; details stay in the logs
//! - Header rules are compiled once at startup

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use regex::Regex;
use thiserror::Error;

use crate::config::{CustomHeaderConfig, HttpConfig};
use crate::service::{Format, RenderedConfig, ServiceError};

pub const PROFILE_UPDATE_INTERVAL: HeaderName = HeaderName::from_static("profile-update-interval");
pub const PROFILE_TITLE: HeaderName = HeaderName::from_static("profile-title");
pub const ATTACHMENT: &str = "attachment; filename=\"sub\"";

/// A [`ServiceError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::UnknownFormat(_) => StatusCode::BAD_REQUEST,
            ServiceError::NoAccessibleServers => StatusCode::FORBIDDEN,
            ServiceError::ExhaustedSpace(_) | ServiceError::BuildFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::ServersUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = status.canonical_reason().unwrap_or("Error");
        (status, body).into_response()
    }
}

#[derive(Debug, Error)]
pub enum HeaderRuleError {
    #[error("invalid header name {0:?}")]
    Name(String),

    #[error("invalid value for header {0:?}")]
    Value(String),

    #[error("user agent pattern for {name:?}: {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// One compiled custom header.
#[derive(Debug, Clone)]
struct HeaderRule {
    name: HeaderName,
    value: HeaderValue,
    user_agent: Option<Regex>,
}

impl HeaderRule {
    fn compile(config: &CustomHeaderConfig) -> Result<Self, HeaderRuleError> {
        let name = HeaderName::from_bytes(config.name.as_bytes())
            .map_err(|_| HeaderRuleError::Name(config.name.clone()))?;
        let value = HeaderValue::from_str(&config.value)
            .map_err(|_| HeaderRuleError::Value(config.name.clone()))?;
        let user_agent = config
            .user_agent
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|source| HeaderRuleError::Pattern {
                name: config.name.clone(),
                source,
            })?;
        Ok(Self {
            name,
            value,
            user_agent,
        })
    }

    fn applies_to(&self, user_agent: &str) -> bool {
        self.user_agent
            .as_ref()
            .map_or(true, |pattern| pattern.find(user_agent).is_some_and(|m| m.start() == 0))
    }
}

/// Headers added to every successful response.
#[derive(Debug, Clone)]
pub struct ResponseHeaders {
    update_interval: HeaderValue,
    title: HeaderValue,
    rules: Vec<HeaderRule>,
}

impl ResponseHeaders {
    pub fn from_config(config: &HttpConfig) -> Result<Self, HeaderRuleError> {
        let update_interval = HeaderValue::from_str(&config.profile_update_interval)
            .map_err(|_| HeaderRuleError::Value(PROFILE_UPDATE_INTERVAL.to_string()))?;
        let title = HeaderValue::from_str(&config.profile_title)
            .map_err(|_| HeaderRuleError::Value(PROFILE_TITLE.to_string()))?;
        let rules = config
            .custom_headers
            .iter()
            .map(HeaderRule::compile)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            update_interval,
            title,
            rules,
        })
    }

    /// Turn a rendered config into the response for a client identifying
    /// itself as `user_agent`.
    pub fn respond(&self, rendered: RenderedConfig, user_agent: &str) -> Response {
        let mut response = Response::new(Body::from(rendered.body));
        let headers = response.headers_mut();

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(rendered.content_type),
        );
        headers.insert(PROFILE_UPDATE_INTERVAL, self.update_interval.clone());
        headers.insert(PROFILE_TITLE, self.title.clone());
        if rendered.format == Format::RuleEngine {
            headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static(ATTACHMENT));
        }

        for rule in self.rules.iter().filter(|r| r.applies_to(user_agent)) {
            headers.append(rule.name.clone(), rule.value.clone());
        }

        response
    }
}
