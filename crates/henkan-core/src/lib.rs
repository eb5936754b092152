//! Kana-kanji conversion core: dictionary store, lattice search, learning
//! memory and neural-assist prompts.

pub mod converter;
pub mod dict;
pub mod learning;
pub mod neural;
pub mod settings;
pub mod store;
pub mod top_k;
pub mod unicode;

#[cfg(test)]
mod testutil;
