/// Serial link supervision and firmware frame decoding.
pub mod dartboard;
/// OpenAPI documentation generation.
pub mod documentation;
/// Match engine actor and its handle.
pub mod engine;
/// Health check service.
pub mod health_service;
/// Snapshot loading and the background writer.
pub mod storage_supervisor;
/// Viewer WebSocket connection handling.
pub mod websocket_service;
