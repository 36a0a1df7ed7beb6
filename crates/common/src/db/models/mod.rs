//! SeaORM entity models
//!
//! Database entities for docchat

mod chunk;

pub use chunk::{
    format_vector, to_db_time,
    Column as ChunkColumn,
    Entity as ChunkEntity,
};
