pub mod api;
mod draft_writer;
