// Résumé Loop: key-point extraction, generation, evaluation, rewrite routing.
// All model calls go through llm_client::CompletionBackend; nothing here talks HTTP to a model.

pub mod evaluator;
pub mod generator;
pub mod handlers;
pub mod key_points;
pub mod pipeline;
pub mod schema;
pub mod stage;
