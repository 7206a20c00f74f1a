// src/config/mod.rs
pub mod providers;
pub mod run;
pub mod sources;

pub use providers::{build_providers, ChatFlavor, ProviderSpec};
pub use run::RunConfig;
pub use sources::{default_sources, load_sources_default, load_sources_from, CATEGORIES};
