pub mod annotator;
pub mod dto;
pub mod export;
pub mod glyphs;
pub mod ledger;
pub mod ports;
pub mod processor;
pub mod services;
