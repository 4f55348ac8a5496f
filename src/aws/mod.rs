pub mod client;
pub mod credentials;
pub mod http;
pub mod sts;

pub use client::{format_aws_error, AwsClients};
pub use http::ApiError;
pub use sts::{CommonColumns, CommonColumnsSource};
