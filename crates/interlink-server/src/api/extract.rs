//! Request extractors whose rejections render as `{"error": msg}` like every
//! other API failure.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ChatError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ChatError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ChatError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ChatError))]
pub struct ApiQuery<T>(pub T);
