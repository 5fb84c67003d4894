pub mod chirp;
