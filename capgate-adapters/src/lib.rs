//! Model access for capgate classifiers.
//!
//! One chat-completion client and one embeddings client, both speaking the
//! OpenAI wire shape against any compatible endpoint (OpenAI, Groq, a local
//! Ollama daemon, ...). The classifiers in `capgate-classify` consume these
//! through the [`traits::ChatModel`] and [`traits::EmbeddingModel`] traits
//! so tests can substitute canned models.

#![warn(missing_docs, clippy::pedantic)]

mod http_client;

pub mod embeddings;
pub mod openai;
pub mod traits;
