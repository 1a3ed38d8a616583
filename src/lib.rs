// clippy
#![cfg_attr(
    feature = "cargo-clippy",
    allow(
        clippy::many_single_char_names,
        clippy::too_many_arguments,
        clippy::float_cmp,
        clippy::new_ret_no_self
    )
)]

pub mod core;
pub mod renderers;
pub mod procedurals;
