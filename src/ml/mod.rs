pub mod embedder;

pub use embedder::{cosine_similarity, Embedder, RemoteEmbedder, EMBEDDING_DIM};
