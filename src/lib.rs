pub mod cli;
pub mod codepage;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod recfm;
pub mod textunit;
pub mod unload;
