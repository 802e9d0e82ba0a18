pub mod in_memory;
pub mod repository;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use repository::SessionRepository;
pub use sqlite::SqliteStore;

#[cfg(test)]
mod tests;
