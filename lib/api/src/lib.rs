//! # basketx API
//!
//! actix-web REST layer over a shared [`ModelRegistry`](basketx_core::ModelRegistry).
//!
//! | Method | Path | Answer |
//! |--------|------|--------|
//! | GET | `/recommend/{product_id}?n=10` | most similar products |
//! | POST | `/recommend` | association-rule recommendations for several products |
//! | GET | `/health` | liveness and whether models are loaded |
//! | GET | `/models` | metadata of the served models |
//! | POST | `/models/reload` | reload models from the artifact store |

pub mod rest;

pub use rest::{ApiError, ApiState, RestApi};
