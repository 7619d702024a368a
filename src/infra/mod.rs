pub(crate) mod browser;
pub(crate) mod ci;
pub(crate) mod config;
