mod config;
mod graph_source;
mod ws_probe;
