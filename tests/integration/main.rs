//! End-to-end tests for the errand pricing pipeline and HTTP service.

mod mock_model;
mod pipeline;
mod service;
