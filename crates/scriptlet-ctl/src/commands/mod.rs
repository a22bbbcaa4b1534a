//! Command handlers for `scriptlet-ctl`.

mod check;
mod render;

pub(crate) use check::handle_check_command;
pub(crate) use render::handle_render_command;
