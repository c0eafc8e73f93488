/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Server-Sent Events relay of engine notifications.
pub mod sse_service;
/// Remote store connection supervisor.
pub mod storage_supervisor;
/// Live game operations exposed over HTTP.
pub mod tracking_service;
