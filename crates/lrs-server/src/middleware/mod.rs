//! HTTP middleware.

pub(crate) mod inject;
pub(crate) mod request_log;
