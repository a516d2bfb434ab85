//! Compile-time defaults, generated by build.rs (see `FL_CONFIG_RS`)

include!(concat!(env!("OUT_DIR"), "/fl_merged_config.rs"));
