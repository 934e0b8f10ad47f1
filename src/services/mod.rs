/// OpenAPI documentation generation.
pub mod documentation;
/// Client for the text generation backend.
pub mod generation_service;
/// Health check service.
pub mod health_service;
/// Idle session retention sweep.
pub mod retention;
/// Core session logic and offline queue replay.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor.
pub mod storage_supervisor;
