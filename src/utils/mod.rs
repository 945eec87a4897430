pub use stop_flag::*;

mod stop_flag;
