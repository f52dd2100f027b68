// LanceDB vector database module
// Persistent chunk storage and similarity search


pub mod vector_store;

pub use vector_store::VectorStore;

/// Name of the table holding every indexed chunk
pub const CHUNKS_TABLE: &str = "chunks";

/// Equality filter on the `source_url` column
#[inline]
pub fn source_url_predicate(source_url: &str) -> String {
    equality_predicate("source_url", source_url)
}

/// Equality filter on the `document_path` column
#[inline]
pub fn document_path_predicate(document_path: &str) -> String {
    equality_predicate("document_path", document_path)
}

/// Single quotes are doubled so values cannot terminate the SQL literal.
fn equality_predicate(column: &str, value: &str) -> String {
    format!("{} = '{}'", column, value.replace('\'', "''"))
}
