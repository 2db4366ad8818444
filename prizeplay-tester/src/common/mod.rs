pub mod util;

pub use util::{split_csv, unique_temp_path};
