pub mod testing;
pub mod text;
