pub mod animation;
pub mod app;
pub mod artwork;
pub mod config;
pub mod config_store;
pub mod error;
pub mod frame_cache;
pub mod kitty;
pub mod media;
pub mod palette;
pub mod playback;
pub mod terminal;
pub mod theme;
pub mod view;
pub mod vinyl;
