pub mod consts;
pub mod error;
pub mod fit;
pub mod frame;
pub mod histogram;
pub mod io;
pub mod map;
pub mod pipeline;
pub mod window;
