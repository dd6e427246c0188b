pub mod admin;
pub mod keygen;
