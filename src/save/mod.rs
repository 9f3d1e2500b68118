// ============================================
// Save System - Система сохранения мира
// ============================================
// Заголовок + поля чанков (bincode) с ZSTD сжатием

mod header;
mod world_file;

pub use header::{SaveHeader, HEADER_SIZE, MAGIC_NUMBER, SAVE_VERSION};
pub use world_file::{LoadedWorld, SaveError, WorldFile};
